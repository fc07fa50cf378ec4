//! Control-channel commands and replies.

use std::fmt;

use crate::{Error, Result};

/// Field separator inside a command payload.
const DELIMITER: char = '|';

/// Command sent from requester to responder on the control channel.
///
/// The data channel role for each command is fixed: whoever receives the
/// payload listens, whoever sends it dials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the responder's files; the listing is delivered to `reply_port`
    /// on the requester.
    List {
        /// Requester's ephemeral data port.
        reply_port: u16,
    },
    /// Store a file on the responder. The responder answers with the port
    /// it listens on for the content.
    Upload {
        /// Name of the file to store.
        file_name: String,
    },
    /// Fetch a file from the responder, delivered to `reply_port`.
    Download {
        /// Name of the file to fetch.
        file_name: String,
        /// Requester's ephemeral data port.
        reply_port: u16,
    },
    /// End the session.
    Quit,
}

impl Command {
    /// Wire tag of this command.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::List { .. } => "ls",
            Self::Upload { .. } => "put",
            Self::Download { .. } => "get",
            Self::Quit => "quit",
        }
    }

    /// Renders the command as a frame payload.
    ///
    /// Fails with [`Error::InvalidFileName`] when a file name contains the
    /// field delimiter, since the receiver could not split it back out.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        if let Self::Upload { file_name } | Self::Download { file_name, .. } = self
            && file_name.contains(DELIMITER)
        {
            return Err(Error::InvalidFileName(file_name.clone()));
        }
        Ok(self.to_string().into_bytes())
    }

    /// Parses a frame payload into a command.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| Error::UnknownCommand(String::from_utf8_lossy(payload).into_owned()))?;
        let mut fields = text.split(DELIMITER);
        let tag = fields.next().unwrap_or_default();
        let args: Vec<&str> = fields.collect();

        let malformed = |reason: &str| Error::MalformedCommand {
            tag: tag.to_owned(),
            reason: reason.to_owned(),
        };
        let port = |field: &str| {
            field
                .parse::<u16>()
                .map_err(|_| malformed(&format!("invalid port {field:?}")))
        };

        match (tag, args.as_slice()) {
            ("ls", [p]) => Ok(Self::List {
                reply_port: port(*p)?,
            }),
            ("put", [name]) => Ok(Self::Upload {
                file_name: (*name).to_owned(),
            }),
            ("get", [name, p]) => Ok(Self::Download {
                file_name: (*name).to_owned(),
                reply_port: port(*p)?,
            }),
            ("quit", []) => Ok(Self::Quit),
            ("ls" | "put" | "get" | "quit", _) => Err(malformed(&format!(
                "unexpected field count {}",
                args.len()
            ))),
            _ => Err(Error::UnknownCommand(tag.to_owned())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List { reply_port } => write!(f, "ls|{reply_port}"),
            Self::Upload { file_name } => write!(f, "put|{file_name}"),
            Self::Download {
                file_name,
                reply_port,
            } => write!(f, "get|{file_name}|{reply_port}"),
            Self::Quit => f.write_str("quit"),
        }
    }
}

/// Found/not-found reply to a download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The file exists; its content follows on the data channel.
    Found,
    /// The file does not exist; no data channel is opened.
    Missing,
}

impl Status {
    /// Reply payload: `"1"` or `"0"`.
    pub const fn as_payload(self) -> &'static [u8] {
        match self {
            Self::Found => b"1",
            Self::Missing => b"0",
        }
    }

    /// Parses a status reply payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        match payload {
            b"1" => Ok(Self::Found),
            b"0" => Ok(Self::Missing),
            other => Err(Error::BadReply(String::from_utf8_lossy(other).into_owned())),
        }
    }
}

/// Payload announcing a data channel port.
pub fn port_payload(port: u16) -> Vec<u8> {
    port.to_string().into_bytes()
}

/// Parses a port announcement payload.
pub fn parse_port(payload: &[u8]) -> Result<u16> {
    std::str::from_utf8(payload)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::BadReply(String::from_utf8_lossy(payload).into_owned()))
}
