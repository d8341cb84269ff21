//! The transport-agnostic connection engine.
//!
//! A [`Connection`] pairs a [`Transport`] (plain TCP, TLS, Unix socket or an
//! in-memory pipe) with a [`WireProtocol`] (HTTP/1.x or FastCGI) and runs the
//! `read -> parse -> dispatch -> write -> reset | close` cycle over them.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use futures::FutureExt;
//! use micro_serve::codec::HttpCodec;
//! use micro_serve::connection::{Connection, ConnectionConfig};
//! use micro_serve::handler::{Context, Done, make_handler};
//! use micro_serve::protocol::BoxError;
//! use tokio::net::TcpListener;
//!
//! async fn hello(mut ctx: Context<'_>) -> Result<Done, BoxError> {
//!     ctx.response_mut().set_body("hello");
//!     Ok(ctx.done().await?)
//! }
//!
//! # async fn run() -> std::io::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:8080").await?;
//! let handler = Arc::new(make_handler(|ctx| hello(ctx).boxed()));
//! let config = ConnectionConfig::default();
//!
//! loop {
//!     let (stream, _) = listener.accept().await?;
//!     let connection = Connection::new(stream, HttpCodec::new(config.limits), &config);
//!     tokio::spawn(connection.process(Arc::clone(&handler)));
//! }
//! # }
//! ```

mod engine;
mod protocol;
mod transport;
mod writer;

pub use engine::{Connection, ConnectionConfig, DEFAULT_READ_BUFFER_SIZE};
pub use protocol::WireProtocol;
pub use transport::Transport;
