//! Error types for framing and command parsing.

use std::io;

/// Alias for `Result<T, ftpx_proto::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while framing or parsing protocol messages.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The 10-byte length header was not ten ASCII digits.
    #[error("malformed frame header {0:?}")]
    Framing(String),

    /// The length header announced more than [`MAX_SIZE`](crate::MAX_SIZE) bytes.
    #[error("frame of {0} bytes exceeds the protocol limit")]
    Oversized(u64),

    /// The peer closed the stream before a whole frame arrived.
    #[error("connection closed after {received} of {expected} bytes")]
    ConnectionClosed {
        /// Bytes the current read was waiting for.
        expected: usize,
        /// Bytes actually received before EOF.
        received: usize,
    },

    /// The command tag matched no known command.
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    /// A known command arrived with missing, extra, or unparseable fields.
    #[error("malformed `{tag}` command: {reason}")]
    MalformedCommand {
        /// Tag of the offending command.
        tag: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A file name containing the field delimiter cannot be sent.
    #[error("file name {0:?} contains the `|` delimiter")]
    InvalidFileName(String),

    /// A status or port reply was not a valid decimal value.
    #[error("unexpected reply {0:?}")]
    BadReply(String),

    /// Any other transport failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns `true` if the peer hung up, which ends a session cleanly.
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed { .. })
    }
}
