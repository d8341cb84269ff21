//! An embeddable asynchronous HTTP/1.x and FastCGI server.
//!
//! Both wire protocols share one request/response model: the transport is
//! read until a complete [`Request`](protocol::Request) is decoded, the
//! application [`Handler`](handler::Handler) is called exactly once with a
//! [`Context`](handler::Context), and the [`Response`](protocol::Response)
//! it fills in is written back, either at once or streamed in parts.
//!
//! # Example
//!
//! ```no_run
//! use futures::FutureExt;
//! use micro_serve::handler::{Context, Done, make_handler};
//! use micro_serve::protocol::{BoxError, Response, Status};
//! use micro_serve::server::Server;
//! use tracing::{Level, error, info};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let listener = match Server::builder().bind("127.0.0.1:8080").build() {
//!         Ok(server) => server.bind().await,
//!         Err(e) => {
//!             error!(cause = %e, "invalid server configuration");
//!             return;
//!         }
//!     };
//!
//!     match listener {
//!         Ok(listener) => {
//!             info!(port = 8080, "start listening");
//!             if let Err(e) = listener.serve(make_handler(|ctx| hello_world(ctx).boxed())).await {
//!                 error!(cause = %e, "server stopped");
//!             }
//!         }
//!         Err(e) => error!(cause = %e, "bind server error"),
//!     }
//! }
//!
//! async fn hello_world(mut ctx: Context<'_>) -> Result<Done, BoxError> {
//!     info!(uri = ctx.request().uri(), "receiving request");
//!
//!     if ctx.request().uri() != "/" {
//!         *ctx.response_mut() = Response::stock(Status::NotFound);
//!         return Ok(ctx.done().await?);
//!     }
//!
//!     ctx.response_mut().set_body("Hello World!\r\n");
//!     Ok(ctx.done().await?)
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: request, response, status and error types
//! - [`codec`]: the HTTP request parser and the HTTP wire codec
//! - [`fastcgi`]: FastCGI records, name/value pairs and the FastCGI wire codec
//! - [`connection`]: the engine driving one transport through request cycles
//! - [`handler`]: the application interface
//! - [`server`]: endpoint configuration and the accept loop
//!
//! # Limitations
//!
//! - One request at a time per connection; HTTP pipelining is served in order
//!   and FastCGI multiplexing is not supported
//! - Request bodies are only kept for `POST` with a `Content-Length`; the
//!   declared body of any other method is read and dropped. Chunked request
//!   bodies are not supported
//! - Without a configured read timeout a stalled peer holds its connection
//!   indefinitely

pub mod codec;
pub mod connection;
pub mod fastcgi;
pub mod handler;
pub mod protocol;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
