use std::fmt;

use async_trait::async_trait;

use crate::protocol::{Request, Response, SendError};

/// The write side of a connection as seen from a request cycle.
#[async_trait]
pub(crate) trait ResponseWriter: Send {
    /// Writes the preamble if it is still pending, then the buffered body, and flushes.
    async fn write_partial(&mut self, response: &mut Response) -> Result<(), SendError>;

    /// Like `write_partial`, then ends the response cycle.
    async fn write_final(&mut self, response: &mut Response) -> Result<(), SendError>;
}

/// Proof that a response cycle was completed, only obtainable from [`Context::done`].
#[derive(Debug)]
#[must_use = "return the token from the handler"]
pub struct Done(());

/// Per-request handle given to a [`Handler`](crate::handler::Handler).
///
/// It exposes the request read-only and the response mutably, and lets the
/// handler either finish with [`done`](Self::done) or stream the response
/// with any number of [`send_partial`](Self::send_partial) calls before it.
/// The same handler code runs over HTTP, HTTPS and FastCGI.
pub struct Context<'a> {
    request: &'a Request,
    response: &'a mut Response,
    writer: &'a mut dyn ResponseWriter,
}

impl<'a> Context<'a> {
    pub(crate) fn new(request: &'a Request, response: &'a mut Response, writer: &'a mut dyn ResponseWriter) -> Self {
        Self { request, response, writer }
    }

    /// The request, borrowed for the whole cycle so it can be read while
    /// the response is being modified.
    pub fn request(&self) -> &'a Request {
        self.request
    }

    pub fn response(&self) -> &Response {
        self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        self.response
    }

    /// Sends everything buffered so far and clears the body buffer.
    ///
    /// The first call also sends the status line and headers; later header
    /// changes are not transmitted. Returns once the bytes are written, so the
    /// code after the `.await` is the continuation that produces the next chunk.
    ///
    /// # Errors
    ///
    /// Fails when the transport write fails; the connection is then unusable.
    pub async fn send_partial(&mut self) -> Result<(), SendError> {
        self.writer.write_partial(self.response).await
    }

    /// Sends the rest of the response and completes the cycle.
    ///
    /// # Errors
    ///
    /// Fails when the transport write fails.
    pub async fn done(self) -> Result<Done, SendError> {
        let Context { response, writer, .. } = self;
        writer.write_final(response).await?;
        Ok(Done(()))
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("request", self.request).field("response", &self.response).finish_non_exhaustive()
    }
}
