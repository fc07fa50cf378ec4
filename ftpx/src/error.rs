//! Error types for ftpx operations.

/// Alias for `Result<T, ftpx::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by client and server operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The server reported that the requested file does not exist.
    #[error("file {0:?} not found on the server")]
    NotFound(String),

    /// The file to upload does not exist in the local store.
    #[error("file {0:?} does not exist locally")]
    LocalNotFound(String),

    /// Framing, command, or reply error from the wire protocol.
    #[error(transparent)]
    Protocol(#[from] ftpx_proto::Error),

    /// An I/O error from a socket or the file store.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
