use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
#[cfg(unix)]
use std::path::PathBuf;
use std::time::Duration;

use tokio_rustls::TlsAcceptor;

use crate::codec::Limits;
use crate::connection::ConnectionConfig;
use crate::ensure;
use crate::server::{Server, ServerBuildError};

/// Where a server accepts its connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Tcp(Vec<SocketAddr>),
    #[cfg(unix)]
    Unix(PathBuf),
    /// A listening socket inherited as file descriptor 0, the way web
    /// servers spawn FastCGI applications.
    #[cfg(unix)]
    Stdio,
}

impl Endpoint {
    fn name(&self) -> &'static str {
        match self {
            Endpoint::Tcp(_) => "tcp",
            #[cfg(unix)]
            Endpoint::Unix(_) => "unix socket",
            #[cfg(unix)]
            Endpoint::Stdio => "stdio",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addresses) => match addresses.as_slice() {
                [address] => write!(f, "{address}"),
                addresses => write!(f, "{addresses:?}"),
            },
            #[cfg(unix)]
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
            #[cfg(unix)]
            Endpoint::Stdio => f.write_str("stdin"),
        }
    }
}

/// The wire protocol a server speaks on every accepted transport.
#[derive(Clone)]
pub(crate) enum WireKind {
    Http { tls: Option<TlsAcceptor> },
    FastCgi,
}

impl fmt::Debug for WireKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireKind::Http { tls } => f.debug_struct("Http").field("tls", &tls.is_some()).finish(),
            WireKind::FastCgi => f.write_str("FastCgi"),
        }
    }
}

/// Configures a [`Server`].
///
/// HTTP is spoken unless [`fastcgi`](Self::fastcgi) is called. Exactly one
/// endpoint is used: the last of `bind`, `unix` and `stdio` wins.
///
/// ```
/// use std::time::Duration;
/// use micro_serve::server::Server;
///
/// let server = Server::builder()
///     .bind("127.0.0.1:0")
///     .read_timeout(Duration::from_secs(30))
///     .build()
///     .unwrap();
/// # let _ = server;
/// ```
pub struct ServerBuilder {
    endpoint: Option<Endpoint>,
    address_error: Option<io::Error>,
    fastcgi: bool,
    tls: Option<TlsAcceptor>,
    config: ConnectionConfig,
}

impl ServerBuilder {
    pub(crate) fn new() -> Self {
        Self { endpoint: None, address_error: None, fastcgi: false, tls: None, config: ConnectionConfig::default() }
    }

    /// Listens on TCP. The address is resolved right away, a failure is
    /// reported by [`build`](Self::build).
    pub fn bind<A: ToSocketAddrs>(mut self, address: A) -> Self {
        match address.to_socket_addrs() {
            Ok(addresses) => {
                self.endpoint = Some(Endpoint::Tcp(addresses.collect()));
                self.address_error = None;
            }
            Err(e) => {
                self.endpoint = None;
                self.address_error = Some(e);
            }
        }
        self
    }

    /// Listens on a Unix domain socket, FastCGI only. A stale socket file
    /// at `path` is replaced.
    #[cfg(unix)]
    pub fn unix<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.endpoint = Some(Endpoint::Unix(path.into()));
        self.address_error = None;
        self
    }

    /// Accepts on the listening socket inherited as standard input, FastCGI only.
    #[cfg(unix)]
    pub fn stdio(mut self) -> Self {
        self.endpoint = Some(Endpoint::Stdio);
        self.address_error = None;
        self
    }

    pub fn fastcgi(mut self) -> Self {
        self.fastcgi = true;
        self
    }

    /// Runs a TLS handshake on every accepted TCP stream, HTTP only.
    pub fn tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some(acceptor);
        self
    }

    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Closes connections that take longer than `timeout` to deliver a
    /// complete request, idle keep-alive time included.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.config.limits = limits;
        self
    }

    /// # Errors
    ///
    /// Returns a [`ServerBuildError`] when no usable endpoint was given or
    /// the options don't fit the chosen protocol.
    pub fn build(self) -> Result<Server, ServerBuildError> {
        if let Some(source) = self.address_error {
            return Err(ServerBuildError::InvalidAddress { source });
        }

        let endpoint = self.endpoint.ok_or(ServerBuildError::MissingEndpoint)?;
        if let Endpoint::Tcp(addresses) = &endpoint {
            ensure!(!addresses.is_empty(), ServerBuildError::NoAddress);
        }

        ensure!(self.config.read_buffer_size > 0, ServerBuildError::InvalidBufferSize);

        let protocol = if self.fastcgi {
            ensure!(self.tls.is_none(), ServerBuildError::TlsWithFastCgi);
            WireKind::FastCgi
        } else {
            ensure!(matches!(endpoint, Endpoint::Tcp(_)), ServerBuildError::RequiresFastCgi { endpoint: endpoint.name() });
            WireKind::Http { tls: self.tls }
        };

        Ok(Server { endpoint, protocol, config: self.config })
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("endpoint", &self.endpoint)
            .field("address_error", &self.address_error)
            .field("fastcgi", &self.fastcgi)
            .field("tls", &self.tls.is_some())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_defaults_to_http() {
        let server = Server::builder().bind("127.0.0.1:0").build().unwrap();
        assert!(matches!(server.endpoint, Endpoint::Tcp(ref addresses) if addresses.len() == 1));
        assert!(matches!(server.protocol, WireKind::Http { tls: None }));
        assert_eq!(server.config, ConnectionConfig::default());
    }

    #[test]
    fn missing_endpoint() {
        let result = Server::builder().fastcgi().build();
        assert!(matches!(result, Err(ServerBuildError::MissingEndpoint)));
    }

    #[test]
    fn unresolvable_address() {
        let result = Server::builder().bind("not an address").build();
        assert!(matches!(result, Err(ServerBuildError::InvalidAddress { .. })));
    }

    #[test]
    fn empty_address_list() {
        let no_addresses: &[SocketAddr] = &[];
        let result = Server::builder().bind(no_addresses).build();
        assert!(matches!(result, Err(ServerBuildError::NoAddress)));
    }

    #[test]
    fn zero_buffer_size() {
        let result = Server::builder().bind("127.0.0.1:0").read_buffer_size(0).build();
        assert!(matches!(result, Err(ServerBuildError::InvalidBufferSize)));
    }

    #[cfg(unix)]
    #[test]
    fn unix_and_stdio_need_fastcgi() {
        let result = Server::builder().unix("/tmp/micro-serve.sock").build();
        assert!(matches!(result, Err(ServerBuildError::RequiresFastCgi { endpoint: "unix socket" })));

        let result = Server::builder().stdio().build();
        assert!(matches!(result, Err(ServerBuildError::RequiresFastCgi { endpoint: "stdio" })));

        let server = Server::builder().stdio().fastcgi().build().unwrap();
        assert_eq!(server.endpoint, Endpoint::Stdio);
        assert!(matches!(server.protocol, WireKind::FastCgi));
    }

    #[test]
    fn options_reach_connection_config() {
        let limits = Limits { max_headers: 8, ..Limits::default() };
        let server = Server::builder()
            .bind("127.0.0.1:0")
            .fastcgi()
            .read_buffer_size(1024)
            .read_timeout(Duration::from_secs(5))
            .limits(limits)
            .build()
            .unwrap();

        assert_eq!(server.config.read_buffer_size, 1024);
        assert_eq!(server.config.read_timeout, Some(Duration::from_secs(5)));
        assert_eq!(server.config.limits, limits);
    }

    #[test]
    fn last_endpoint_wins() {
        let builder = Server::builder().bind("not an address").bind("127.0.0.1:0");
        assert!(builder.build().is_ok_and(|server| matches!(server.endpoint, Endpoint::Tcp(_))));
    }
}
