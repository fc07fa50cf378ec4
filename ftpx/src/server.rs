//! Responder side: control-channel listener and per-connection sessions.
//!
//! Connections are served strictly one at a time. Each accepted control
//! connection becomes a [`Session`] that reads command frames until the peer
//! quits or hangs up.

use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use ftpx_proto::{Command, Status};

use crate::data::{self, DataListener};
use crate::store::FileStore;
use crate::Result;

/// An ftpx server bound to a control port.
#[derive(Debug)]
pub struct Server<S> {
    /// Control-channel listener.
    listener: TcpListener,
    /// Files served and stored.
    store: S,
    /// Per-socket I/O timeout.
    timeout: Option<Duration>,
}

impl<S: FileStore> Server<S> {
    /// Binds the control-channel listener.
    pub fn bind(addr: impl ToSocketAddrs, store: S) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            store,
            timeout: None,
        })
    }

    /// Applies an I/O timeout to control and data connections.
    ///
    /// `None` (the default) blocks indefinitely.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Address the control listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The store this server serves from.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Accepts connections forever, one session at a time.
    ///
    /// Session failures are logged and do not stop the server; only a failing
    /// `accept` returns.
    pub fn serve(&self) -> Result<()> {
        tracing::info!(addr = %self.listener.local_addr()?, "ready to accept connections");
        loop {
            let (stream, peer) = self.listener.accept()?;
            if let Err(e) = self.session(stream).and_then(Session::run) {
                tracing::warn!(%peer, error = %e, "session ended with error");
            }
        }
    }

    /// Accepts a single connection and drives its session to completion.
    pub fn serve_one(&self) -> Result<()> {
        let (stream, _) = self.listener.accept()?;
        self.session(stream)?.run()
    }

    /// Wraps an accepted control connection in a session.
    fn session(&self, stream: TcpStream) -> Result<Session<'_, S>> {
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        Session::new(stream, &self.store, self.timeout)
    }
}

/// Where a [`Session`] is in its command cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Between commands.
    Idle,
    /// Blocked reading the next command frame.
    AwaitingCommand,
    /// The peer quit or hung up; no further reads happen.
    Terminated,
}

/// One control connection on the server.
#[derive(Debug)]
pub struct Session<'a, S> {
    /// Control channel.
    stream: TcpStream,
    /// Client address; data channels are dialed on the same host.
    peer: SocketAddr,
    /// Local control address; data listeners bind here.
    local: IpAddr,
    /// Shared file store.
    store: &'a S,
    /// Per-socket I/O timeout for data channels.
    timeout: Option<Duration>,
    /// Position in the command cycle.
    state: SessionState,
}

impl<'a, S: FileStore> Session<'a, S> {
    /// Starts a session on an accepted control connection.
    pub fn new(stream: TcpStream, store: &'a S, timeout: Option<Duration>) -> Result<Self> {
        let peer = stream.peer_addr()?;
        let local = stream.local_addr()?.ip();
        tracing::info!(%peer, "session started");
        Ok(Self {
            stream,
            peer,
            local,
            store,
            timeout,
            state: SessionState::Idle,
        })
    }

    /// Current state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Runs command cycles until the session terminates.
    ///
    /// A peer hanging up counts as a quit. Malformed headers and other
    /// control-channel I/O failures end the session with an error, since the
    /// stream cannot be resynchronised.
    pub fn run(mut self) -> Result<()> {
        while self.step()? != SessionState::Terminated {}
        Ok(())
    }

    /// Reads and handles one command frame, returning the next state.
    ///
    /// Unknown or malformed commands, and failures inside a single
    /// command's data exchange, are logged and leave the session alive.
    pub fn step(&mut self) -> Result<SessionState> {
        if self.state == SessionState::Terminated {
            return Ok(self.state);
        }
        self.state = SessionState::AwaitingCommand;

        let frame = match ftpx_proto::decode(&mut self.stream) {
            Ok(frame) => frame,
            Err(e) if e.is_closed() => {
                tracing::info!(peer = %self.peer, "peer closed control channel");
                return Ok(self.terminate());
            }
            Err(e) => {
                self.terminate();
                return Err(e.into());
            }
        };

        let cmd = match Command::parse(&frame) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!(peer = %self.peer, error = %e, "ignoring command");
                self.state = SessionState::Idle;
                return Ok(self.state);
            }
        };
        tracing::debug!(peer = %self.peer, command = %cmd, "dispatch");

        let result = match &cmd {
            Command::Quit => {
                tracing::info!(peer = %self.peer, "peer quit");
                return Ok(self.terminate());
            }
            Command::List { reply_port } => self.list(*reply_port),
            Command::Upload { file_name } => self.upload(file_name),
            Command::Download {
                file_name,
                reply_port,
            } => self.download(file_name, *reply_port),
        };
        if let Err(e) = result {
            tracing::warn!(peer = %self.peer, command = cmd.tag(), error = %e, "command failed");
        }

        self.state = SessionState::Idle;
        Ok(self.state)
    }

    /// Marks the session over.
    fn terminate(&mut self) -> SessionState {
        self.state = SessionState::Terminated;
        self.state
    }

    /// Dials the client and sends the store's names, one per line.
    fn list(&self, reply_port: u16) -> Result<()> {
        // The client is already waiting on its listener, so a store failure
        // still has to answer with something.
        let names = self.store.list_names().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "cannot list store");
            Vec::new()
        });
        let listing: String = names.iter().map(|n| format!("{n}\n")).collect();
        data::dial_and_send(self.data_addr(reply_port), listing.as_bytes(), self.timeout)?;
        Ok(())
    }

    /// Announces a data port, receives the content, and stores it.
    fn upload(&mut self, name: &str) -> Result<()> {
        let listener = DataListener::bind(self.local)?.with_io_timeout(self.timeout);
        ftpx_proto::send(&mut self.stream, &ftpx_proto::port_payload(listener.port()))?;

        let content = listener.receive()?;
        self.store.write_all(name, &content)?;
        tracing::info!(name, len = content.len(), "stored upload");
        Ok(())
    }

    /// Replies with a found/missing status and, if found, dials the client
    /// with the content.
    fn download(&mut self, name: &str, reply_port: u16) -> Result<()> {
        let content = if self.store.exists(name) {
            match self.store.read_all(name) {
                Ok(content) => Some(content),
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => {
                    tracing::warn!(name, error = %e, "cannot read file");
                    None
                }
            }
        } else {
            None
        };

        let Some(content) = content else {
            tracing::info!(name, "file not found");
            ftpx_proto::send(&mut self.stream, Status::Missing.as_payload())?;
            return Ok(());
        };

        ftpx_proto::send(&mut self.stream, Status::Found.as_payload())?;
        let sent = data::dial_and_send(self.data_addr(reply_port), &content, self.timeout)?;
        tracing::info!(name, len = sent, "sent download");
        Ok(())
    }

    /// Client-side data channel address for `port`.
    fn data_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.peer.ip(), port)
    }
}
