//! Minimal FTP-style file transfer over TCP.
//!
//! A persistent control channel carries `|`-delimited commands and small
//! replies. Each listing, upload, or download moves its payload over a
//! dedicated one-shot data channel: the receiving side binds an ephemeral
//! port, announces it on the control channel, and the sending side dials in.
//!
//! # Example
//!
//! ```no_run
//! use ftpx::{Client, DirStore};
//!
//! let store = DirStore::open(".")?;
//! let mut client = Client::connect("127.0.0.1:2121", store)?;
//! for name in client.list()? {
//!     println!("{name}");
//! }
//! client.download("notes.txt")?;
//! client.quit()?;
//! # Ok::<(), ftpx::Error>(())
//! ```

mod client;
mod data;
mod error;
mod server;
mod store;

pub use client::Client;
pub use data::{DataListener, dial_and_send};
pub use error::{Error, Result};
pub use ftpx_proto::{Command, MAX_SIZE, Status};
pub use server::{Server, Session, SessionState};
pub use store::{DirStore, FileStore, MemoryStore};
