use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use crate::error::TermError;

/// A KISS TNC reachable as a byte stream.
///
/// TNCs must be cloneable so one handle can be read from and one written to
/// on different threads, via a working implementation of `try_clone()`. We do
/// not require `Clone` directly as `TcpStream` could not fulfil it.
pub trait Tnc: Read + Write + Sized + Send + 'static {
    /// Return a second handle to this TNC.
    ///
    /// The session uses one handle on its reader thread and the other on the
    /// dispatcher thread. Neither handle is read from or written to
    /// concurrently with itself.
    fn try_clone(&mut self) -> Result<Self, TermError>;

    /// Shut down I/O; the session will not restart it.
    fn shutdown(&mut self) -> Result<(), TermError>;
}

impl Tnc for TcpStream {
    fn try_clone(&mut self) -> Result<Self, TermError> {
        TcpStream::try_clone(self).map_err(|_| TermError::TransportDown)
    }

    fn shutdown(&mut self) -> Result<(), TermError> {
        TcpStream::shutdown(self, Shutdown::Both).map_err(|_| TermError::TransportDown)
    }
}

/// Open a TCP connection to a network-attached TNC (or software modem such
/// as Direwolf listening on its KISS port).
pub fn connect_tcp(host: &str, port: u16) -> Result<TcpStream, TermError> {
    let stream = (host, port)
        .to_socket_addrs()
        .and_then(|mut addrs| {
            addrs.next().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
            })
        })
        .and_then(TcpStream::connect)
        .map_err(|e| TermError::ConnectFailed {
            addr: format!("{}:{}", host, port),
            cause: e.to_string(),
        })?;
    // interactive traffic; do not batch small frames
    let _ = stream.set_nodelay(true);
    Ok(stream)
}
