//! One-shot data channel rendezvous.
//!
//! The side that receives a payload binds a [`DataListener`] on an ephemeral
//! port and announces that port over the control channel; the side that sends
//! the payload dials it with [`dial_and_send`]. Exactly one frame crosses each
//! data channel, after which both sockets are closed.

use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use crate::Result;

/// How often a deadline-bounded accept checks for a pending connection.
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Listening half of a data channel, good for exactly one transfer.
#[derive(Debug)]
pub struct DataListener {
    /// Socket bound to an OS-assigned port.
    listener: TcpListener,
    /// The assigned port, cached at bind time.
    port: u16,
    /// Bound on waiting for the peer to dial in, and on reads after that.
    timeout: Option<Duration>,
}

impl DataListener {
    /// Binds an ephemeral port on `ip`.
    ///
    /// Callers pass the local address of their control channel, which the
    /// peer is known to be able to reach.
    pub fn bind(ip: IpAddr) -> Result<Self> {
        let listener = TcpListener::bind((ip, 0))?;
        let port = listener.local_addr()?.port();
        tracing::debug!(%ip, port, "data channel listening");
        Ok(Self {
            listener,
            port,
            timeout: None,
        })
    }

    /// Bounds both the wait for the peer to dial in and the reads that follow.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Port to announce to the peer.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Accepts one connection, reads one frame, and closes both sockets.
    ///
    /// Without a timeout this blocks until the peer dials in; with one, a peer
    /// that never dials fails the transfer with [`io::ErrorKind::TimedOut`].
    pub fn receive(self) -> Result<Vec<u8>> {
        let Self {
            listener,
            port,
            timeout,
        } = self;
        let (mut stream, peer) = accept(&listener, timeout)?;
        drop(listener);
        stream.set_read_timeout(timeout)?;

        let payload = ftpx_proto::decode(&mut stream)?;
        tracing::debug!(port, %peer, len = payload.len(), "data channel received");
        Ok(payload)
    }
}

/// Accepts one connection, giving up once `timeout` has elapsed.
fn accept(listener: &TcpListener, timeout: Option<Duration>) -> io::Result<(TcpStream, SocketAddr)> {
    let Some(timeout) = timeout else {
        return listener.accept();
    };
    let deadline = Instant::now() + timeout;
    listener.set_nonblocking(true)?;
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                // Some platforms hand out accepted sockets in the listener's mode.
                stream.set_nonblocking(false)?;
                return Ok((stream, peer));
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "peer did not open the data channel in time",
                    ));
                }
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

/// Connects to a peer's data listener, sends `payload` as one frame, and
/// closes the connection.
///
/// Returns the number of payload bytes sent after truncation.
pub fn dial_and_send(addr: SocketAddr, payload: &[u8], timeout: Option<Duration>) -> Result<usize> {
    let mut stream = match timeout {
        Some(t) => TcpStream::connect_timeout(&addr, t)?,
        None => TcpStream::connect(addr)?,
    };
    stream.set_write_timeout(timeout)?;

    let sent = ftpx_proto::send(&mut stream, payload)?;
    tracing::debug!(%addr, len = sent, "data channel sent");
    Ok(sent)
}
