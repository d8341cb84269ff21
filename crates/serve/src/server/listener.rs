use std::future;
use std::io;
use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::codec::HttpCodec;
use crate::connection::{Connection, ConnectionConfig, Transport, WireProtocol};
use crate::fastcgi::FcgiCodec;
use crate::handler::Handler;
use crate::server::config::{Endpoint, WireKind};
use crate::server::{ServerBuilder, ServerError};

/// A configured, not yet bound server.
#[derive(Debug)]
pub struct Server {
    pub(crate) endpoint: Endpoint,
    pub(crate) protocol: WireKind,
    pub(crate) config: ConnectionConfig,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Binds the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] when the socket can't be bound.
    pub async fn bind(self) -> Result<Listener, ServerError> {
        let acceptor = match &self.endpoint {
            Endpoint::Tcp(addresses) => {
                let listener =
                    TcpListener::bind(addresses.as_slice()).await.map_err(|e| ServerError::bind(&self.endpoint, e))?;
                Acceptor::Tcp(listener)
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => Acceptor::Unix(unix::UnixAcceptor::bind(path).map_err(|e| ServerError::bind(&self.endpoint, e))?),
            #[cfg(unix)]
            Endpoint::Stdio => Acceptor::Unix(unix::UnixAcceptor::inherit_stdin().map_err(|e| ServerError::bind(&self.endpoint, e))?),
        };

        info!(endpoint = %self.endpoint, protocol = ?self.protocol, "start listening");
        Ok(Listener { acceptor, protocol: self.protocol, config: self.config, connections: JoinSet::new() })
    }
}

#[derive(Debug)]
enum Acceptor {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(unix::UnixAcceptor),
}

/// A bound server, accepting connections once [`serve`](Self::serve) runs.
///
/// Every accepted transport is driven by its own [`Connection`] task. The
/// tasks are owned by the listener and aborted when it stops.
#[derive(Debug)]
pub struct Listener {
    acceptor: Acceptor,
    protocol: WireKind,
    config: ConnectionConfig,
    connections: JoinSet<()>,
}

impl Listener {
    /// The bound TCP address, `None` for Unix sockets.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.acceptor {
            Acceptor::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Acceptor::Unix(_) => None,
        }
    }

    /// Accepts connections forever.
    ///
    /// # Errors
    ///
    /// Only fails when accepting can't go on; per-connection failures are logged.
    pub async fn serve<H>(self, handler: H) -> Result<(), ServerError>
    where
        H: Handler + 'static,
    {
        self.serve_with_shutdown(handler, future::pending()).await
    }

    /// Accepts connections until `signal` completes, then aborts the
    /// connections still open.
    ///
    /// # Errors
    ///
    /// Only fails when accepting can't go on; per-connection failures are logged.
    pub async fn serve_with_shutdown<H, S>(mut self, handler: H, signal: S) -> Result<(), ServerError>
    where
        H: Handler + 'static,
        S: Future<Output = ()>,
    {
        let handler = Arc::new(handler);
        let mut signal = pin!(signal);

        loop {
            tokio::select! {
                () = &mut signal => {
                    info!(open_connections = self.connections.len(), "shutdown signal received, stop listening");
                    break;
                }

                accepted = self.acceptor.accept() => match accepted {
                    Ok(Accepted::Tcp(stream)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(cause = %e, "can't set TCP_NODELAY");
                        }
                        self.spawn(stream, Arc::clone(&handler));
                    }
                    #[cfg(unix)]
                    Ok(Accepted::Unix(stream)) => self.spawn(stream, Arc::clone(&handler)),
                    Err(e) if is_fatal_accept_error(&e) => {
                        error!(cause = %e, "accept failed, stop listening");
                        self.connections.shutdown().await;
                        return Err(e.into());
                    }
                    Err(e) => warn!(cause = %e, "failed to accept"),
                },

                Some(joined) = self.connections.join_next(), if !self.connections.is_empty() => {
                    if let Err(e) = joined
                        && e.is_panic()
                    {
                        error!(cause = %e, "connection task panicked");
                    }
                }
            }
        }

        self.connections.shutdown().await;
        Ok(())
    }

    fn spawn<T, H>(&mut self, transport: T, handler: Arc<H>)
    where
        T: Transport,
        H: Handler + 'static,
    {
        let config = self.config;
        match &self.protocol {
            WireKind::Http { tls: None } => {
                self.connections.spawn(drive(transport, HttpCodec::new(config.limits), config, handler));
            }
            WireKind::Http { tls: Some(acceptor) } => {
                let acceptor = acceptor.clone();
                self.connections.spawn(async move {
                    let remote_addr = transport.remote_addr();
                    match acceptor.accept(transport).await {
                        Ok(stream) => drive(stream, HttpCodec::new(config.limits), config, handler).await,
                        Err(e) => debug!(cause = %e, ?remote_addr, "tls handshake failed"),
                    }
                });
            }
            WireKind::FastCgi => {
                self.connections.spawn(drive(transport, FcgiCodec::new(config.limits), config, handler));
            }
        }
    }
}

async fn drive<T, P, H>(transport: T, protocol: P, config: ConnectionConfig, handler: Arc<H>)
where
    T: Transport,
    P: WireProtocol,
    H: Handler + ?Sized,
{
    let remote_addr = transport.remote_addr();
    let connection = Connection::new(transport, protocol, &config);

    match connection.process(handler).await {
        Ok(()) => debug!(?remote_addr, "finished process, connection shutdown"),
        Err(e) if e.is_benign() => debug!(cause = %e, ?remote_addr, "connection cancelled"),
        Err(e) => warn!(cause = %e, ?remote_addr, "connection closed with error"),
    }
}

/// Errors that keep happening on every further accept.
fn is_fatal_accept_error(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::InvalidInput | io::ErrorKind::NotConnected)
}

enum Accepted {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(tokio::net::UnixStream),
}

impl Acceptor {
    async fn accept(&self) -> io::Result<Accepted> {
        match self {
            Acceptor::Tcp(listener) => listener.accept().await.map(|(stream, _remote_addr)| Accepted::Tcp(stream)),
            #[cfg(unix)]
            Acceptor::Unix(acceptor) => acceptor.listener.accept().await.map(|(stream, _remote_addr)| Accepted::Unix(stream)),
        }
    }
}

#[cfg(unix)]
mod unix {
    use std::fs;
    use std::io;
    use std::os::fd::FromRawFd;
    use std::os::unix::net::UnixListener as StdUnixListener;
    use std::path::{Path, PathBuf};

    use tokio::net::UnixListener;
    use tracing::debug;

    /// A Unix listening socket; a socket file it created is removed on drop.
    #[derive(Debug)]
    pub(super) struct UnixAcceptor {
        pub(super) listener: UnixListener,
        path: Option<PathBuf>,
    }

    impl UnixAcceptor {
        pub(super) fn bind(path: &Path) -> io::Result<Self> {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed stale socket file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }

            let listener = UnixListener::bind(path)?;
            Ok(Self { listener, path: Some(path.to_path_buf()) })
        }

        /// Takes over the listening socket a web server passes as stdin.
        pub(super) fn inherit_stdin() -> io::Result<Self> {
            // SAFETY: fd 0 is owned by this process for its whole lifetime and
            // nothing else in the library reads from stdin.
            let listener = unsafe { StdUnixListener::from_raw_fd(0) };
            listener.set_nonblocking(true)?;
            Ok(Self { listener: UnixListener::from_std(listener)?, path: None })
        }
    }

    impl Drop for UnixAcceptor {
        fn drop(&mut self) {
            if let Some(path) = &self.path
                && let Err(e) = fs::remove_file(path)
            {
                debug!(cause = %e, path = %path.display(), "can't remove socket file");
            }
        }
    }
}
