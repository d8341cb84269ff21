use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

/// A byte stream a [`Connection`](crate::connection::Connection) can drive.
///
/// Reading and writing come from tokio's I/O traits, the protocol-aware
/// shutdown is `AsyncWriteExt::shutdown` and closing is dropping the value.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// The peer's address, when the transport has a meaningful one.
    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl Transport for TcpStream {
    fn remote_addr(&self) -> Option<SocketAddr> {
        self.peer_addr().ok()
    }
}

impl<T: Transport> Transport for TlsStream<T> {
    fn remote_addr(&self) -> Option<SocketAddr> {
        self.get_ref().0.remote_addr()
    }
}

#[cfg(unix)]
impl Transport for tokio::net::UnixStream {}

/// In-memory pipe, for embedding a connection without a socket.
impl Transport for DuplexStream {}
