//! Application handlers.
//!
//! A handler is called exactly once per received request. It fills in the
//! response through the [`Context`] and returns the [`Done`] token that
//! [`Context::done`] produced. Returning an error, or panicking, closes the
//! connection; an error page for the client must be written by the handler
//! itself before calling `done`.
//!
//! # Example
//!
//! ```no_run
//! use futures::FutureExt;
//! use micro_serve::handler::{Context, Done, make_handler};
//! use micro_serve::protocol::BoxError;
//!
//! async fn hello(mut ctx: Context<'_>) -> Result<Done, BoxError> {
//!     ctx.response_mut().insert_header("Content-Type", "text/plain")?;
//!     ctx.response_mut().set_body("Hello World!\r\n");
//!     Ok(ctx.done().await?)
//! }
//!
//! let handler = make_handler(|ctx| hello(ctx).boxed());
//! ```

mod context;

pub use context::Context;
pub use context::Done;
pub(crate) use context::ResponseWriter;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::protocol::BoxError;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: Context<'_>) -> Result<Done, BoxError>;
}

/// A [`Handler`] backed by a function, see [`make_handler`].
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(Context<'a>) -> BoxFuture<'a, Result<Done, BoxError>> + Send + Sync,
{
    async fn call(&self, ctx: Context<'_>) -> Result<Done, BoxError> {
        (self.f)(ctx).await
    }
}

/// Wraps a function returning a boxed future into a [`Handler`].
pub fn make_handler<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(Context<'a>) -> BoxFuture<'a, Result<Done, BoxError>> + Send + Sync,
{
    HandlerFn { f }
}
