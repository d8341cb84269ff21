//! Binding endpoints and accepting connections.
//!
//! A [`Server`] is built with [`Server::builder`], bound into a [`Listener`]
//! and then serves a [`Handler`](crate::handler::Handler) on every accepted
//! transport:
//!
//! ```no_run
//! use futures::FutureExt;
//! use micro_serve::handler::{Context, Done, make_handler};
//! use micro_serve::protocol::BoxError;
//! use micro_serve::server::Server;
//!
//! async fn hello(mut ctx: Context<'_>) -> Result<Done, BoxError> {
//!     ctx.response_mut().set_body("Hello World!\r\n");
//!     Ok(ctx.done().await?)
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let listener = Server::builder().bind("127.0.0.1:8080").build()?.bind().await?;
//! listener.serve(make_handler(|ctx| hello(ctx).boxed())).await?;
//! # Ok(())
//! # }
//! ```
//!
//! One listener runs on one runtime. Scaling over several cores means binding
//! several listeners, each on its own current-thread runtime; they share
//! nothing.

mod config;
mod error;
mod listener;

pub use config::ServerBuilder;
pub use error::{ServerBuildError, ServerError};
pub use listener::{Listener, Server};
