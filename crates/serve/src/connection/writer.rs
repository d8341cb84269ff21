use async_trait::async_trait;
use futures::SinkExt;
use tokio_util::codec::Framed;

use crate::codec::ResponseFrame;
use crate::connection::{Transport, WireProtocol};
use crate::handler::ResponseWriter;
use crate::protocol::{Request, Response, SendError};

/// Writes one response cycle onto the connection's framed transport.
///
/// The preamble goes out with the first write only; every write sends the
/// body bytes buffered since the previous one and then empties the buffer.
pub(crate) struct ResponseStream<'a, T, P> {
    framed: &'a mut Framed<T, P>,
    request: &'a Request,
    head_sent: bool,
    keep_alive: bool,
}

impl<'a, T, P> ResponseStream<'a, T, P>
where
    T: Transport,
    P: WireProtocol,
{
    pub(crate) fn new(framed: &'a mut Framed<T, P>, request: &'a Request) -> Self {
        Self { framed, request, head_sent: false, keep_alive: false }
    }

    /// Whether the connection may serve another request after this cycle.
    pub(crate) fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    async fn write(&mut self, response: &mut Response, finishing: bool) -> Result<(), SendError> {
        if self.head_sent {
            if !response.body().is_empty() {
                self.framed.feed(ResponseFrame::Body(response.body())).await?;
            }
        } else {
            self.keep_alive = self.framed.codec_mut().prepare(self.request, response, finishing);
            self.head_sent = true;

            let version = self.request.version();
            self.framed.feed(ResponseFrame::Head { response: &*response, version }).await?;
        }

        response.body_mut().clear();
        Ok(())
    }
}

#[async_trait]
impl<'a, T, P> ResponseWriter for ResponseStream<'a, T, P>
where
    T: Transport,
    P: WireProtocol,
{
    async fn write_partial(&mut self, response: &mut Response) -> Result<(), SendError> {
        self.write(response, false).await?;
        SinkExt::<ResponseFrame<'_>>::flush(&mut *self.framed).await
    }

    async fn write_final(&mut self, response: &mut Response) -> Result<(), SendError> {
        self.write(response, true).await?;
        self.framed.send(ResponseFrame::End).await
    }
}
