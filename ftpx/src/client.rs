//! Requester side: one control connection, one synchronous exchange per call.

use std::io;
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use ftpx_proto::{Command, Status};

use crate::data::{self, DataListener};
use crate::store::FileStore;
use crate::{Error, Result};

/// A client connection to an ftpx server.
///
/// Uploads are read from, and downloads written to, the client's own
/// [`FileStore`].
#[derive(Debug)]
pub struct Client<S> {
    /// Control channel.
    stream: TcpStream,
    /// Server address; data channels are dialed on the same host.
    peer: SocketAddr,
    /// Local control address; data listeners bind here.
    local: IpAddr,
    /// Local files.
    store: S,
    /// Per-socket I/O timeout.
    timeout: Option<Duration>,
}

impl<S: FileStore> Client<S> {
    /// Opens the control channel to a server.
    pub fn connect(addr: impl ToSocketAddrs, store: S) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let peer = stream.peer_addr()?;
        let local = stream.local_addr()?.ip();
        tracing::info!(%peer, "connected");
        Ok(Self {
            stream,
            peer,
            local,
            store,
            timeout: None,
        })
    }

    /// Applies an I/O timeout to the control channel and every data channel.
    ///
    /// `None` (the default) blocks indefinitely.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Result<Self> {
        self.stream.set_read_timeout(timeout)?;
        self.stream.set_write_timeout(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// The local store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Fetches the names of the files stored on the server.
    pub fn list(&mut self) -> Result<Vec<String>> {
        let listener = self.listen()?;
        self.send(&Command::List {
            reply_port: listener.port(),
        })?;
        let listing = listener.receive()?;
        Ok(String::from_utf8_lossy(&listing)
            .lines()
            .map(str::to_owned)
            .collect())
    }

    /// Sends the local file `name` to the server.
    ///
    /// Returns the number of bytes transferred, which is capped at
    /// [`MAX_SIZE`](ftpx_proto::MAX_SIZE). Success means the content was
    /// sent, not that the server stored it: the protocol has no reply after
    /// the data channel closes, so a failed write on the server side is only
    /// logged there.
    pub fn upload(&mut self, name: &str) -> Result<usize> {
        let content = match self.store.read_all(name) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::LocalNotFound(name.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };

        self.send(&Command::Upload {
            file_name: name.to_owned(),
        })?;
        let port = ftpx_proto::parse_port(&ftpx_proto::decode(&mut self.stream)?)?;
        let sent = data::dial_and_send(SocketAddr::new(self.peer.ip(), port), &content, self.timeout)?;
        tracing::info!(name, len = sent, "uploaded");
        Ok(sent)
    }

    /// Fetches `name` from the server into the local store.
    ///
    /// Fails with [`Error::NotFound`] if the server does not have it.
    pub fn download(&mut self, name: &str) -> Result<usize> {
        let listener = self.listen()?;
        self.send(&Command::Download {
            file_name: name.to_owned(),
            reply_port: listener.port(),
        })?;

        match Status::parse(&ftpx_proto::decode(&mut self.stream)?)? {
            Status::Missing => Err(Error::NotFound(name.to_owned())),
            Status::Found => {
                let content = listener.receive()?;
                self.store.write_all(name, &content)?;
                tracing::info!(name, len = content.len(), "downloaded");
                Ok(content.len())
            }
        }
    }

    /// Tells the server the session is over and closes the control channel.
    pub fn quit(mut self) -> Result<()> {
        self.send(&Command::Quit)?;
        // The server may already have hung up; either way we are done.
        let _ = self.stream.shutdown(Shutdown::Both);
        Ok(())
    }

    /// Sends one command frame on the control channel.
    fn send(&mut self, cmd: &Command) -> Result<()> {
        let payload = cmd.to_payload()?;
        ftpx_proto::send(&mut self.stream, &payload)?;
        tracing::debug!(command = %cmd, "sent");
        Ok(())
    }

    /// Binds a data listener next to the control channel.
    fn listen(&self) -> Result<DataListener> {
        Ok(DataListener::bind(self.local)?.with_io_timeout(self.timeout))
    }
}
