//! Wire protocol for ftpx control and data channels.
//!
//! Every message is a frame: a 10-digit zero-padded ASCII decimal length
//! followed by that many payload bytes. Commands travel as `|`-delimited text
//! frames on the control channel; file contents and listings travel as a
//! single opaque frame on a one-shot data channel.

mod codec;
mod error;
mod message;

pub use codec::{HEADER_LEN, MAX_SIZE, decode, encode, send};
pub use error::{Error, Result};
pub use message::{Command, Status, parse_port, port_payload};
