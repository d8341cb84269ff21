use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{Decoder, Framed};
use tracing::{debug, warn};

use crate::codec::{Limits, ResponseFrame};
use crate::connection::writer::ResponseStream;
use crate::connection::{Transport, WireProtocol};
use crate::handler::{Context, Handler};
use crate::protocol::{ConnectionError, Request, Response, SendError, Version};

/// Size of the read buffer, enough for most request heads in one read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Per-connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub read_buffer_size: usize,
    /// Longest wait for a complete request, idle keep-alive time included.
    /// `None` waits forever.
    pub read_timeout: Option<Duration>,
    pub limits: Limits,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { read_buffer_size: DEFAULT_READ_BUFFER_SIZE, read_timeout: None, limits: Limits::default() }
    }
}

/// Drives one transport through its request/response cycles.
///
/// Each cycle reads until the protocol yields a request, calls the handler
/// exactly once, and then either waits for the next request on the same
/// transport or shuts it down. Reads and writes never overlap and a second
/// request is never decoded before the current cycle finished.
#[derive(Debug)]
pub struct Connection<T, P> {
    framed: Framed<T, P>,
    remote_addr: Option<SocketAddr>,
    read_timeout: Option<Duration>,
}

impl<T, P> Connection<T, P>
where
    T: Transport,
    P: WireProtocol,
{
    pub fn new(transport: T, protocol: P, config: &ConnectionConfig) -> Self {
        let remote_addr = transport.remote_addr();
        Self {
            framed: Framed::with_capacity(transport, protocol, config.read_buffer_size),
            remote_addr,
            read_timeout: config.read_timeout,
        }
    }

    /// Serves requests until the peer leaves, a cycle ends without keep-alive,
    /// or an error occurs.
    ///
    /// # Errors
    ///
    /// Protocol, transport and handler failures are returned after the
    /// transport was shut down. [`ConnectionError::is_benign`] tells the peer
    /// simply going away apart from real faults.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), ConnectionError>
    where
        H: Handler + ?Sized,
    {
        loop {
            let next = match self.read_request().await {
                Ok(next) => next,
                Err(e) => {
                    self.shutdown().await;
                    return Err(e);
                }
            };

            let mut request = match next {
                Some(Ok(request)) => request,
                Some(Err(e)) => {
                    if let Some(response) = self.framed.codec().stock_response(&e) {
                        warn!(cause = %e, status = %response.status(), "can't parse request, send stock response");
                        if let Err(send_error) = self.write_stock(response).await {
                            debug!(cause = %send_error, "failed to send stock response");
                        }
                    }
                    self.shutdown().await;
                    return Err(e.into());
                }
                None => {
                    debug!("peer closed the connection");
                    self.shutdown().await;
                    return Ok(());
                }
            };

            request.remote_addr = request.remote_addr.or(self.remote_addr);

            match self.dispatch(&request, &*handler).await {
                Ok(true) => {}
                Ok(false) => {
                    self.shutdown().await;
                    return Ok(());
                }
                Err(e) => {
                    self.shutdown().await;
                    return Err(e);
                }
            }
        }
    }

    async fn read_request(&mut self) -> Result<Option<Result<Request, <P as Decoder>::Error>>, ConnectionError> {
        match self.read_timeout {
            None => Ok(self.framed.next().await),
            Some(duration) => tokio::time::timeout(duration, self.framed.next()).await.map_err(|_elapsed| ConnectionError::Timeout),
        }
    }

    /// Runs the handler for one request, returns whether to keep the connection.
    async fn dispatch<H>(&mut self, request: &Request, handler: &H) -> Result<bool, ConnectionError>
    where
        H: Handler + ?Sized,
    {
        let mut response = Response::new();
        let mut stream = ResponseStream::new(&mut self.framed, request);

        let result = {
            let ctx = Context::new(request, &mut response, &mut stream);
            AssertUnwindSafe(handler.call(ctx)).catch_unwind().await
        };

        match result {
            Ok(Ok(_done)) => Ok(stream.keep_alive()),
            Ok(Err(e)) => Err(ConnectionError::handler(e)),
            Err(panic) => Err(ConnectionError::handler(format!("handler panicked: {}", panic_message(panic.as_ref())))),
        }
    }

    async fn write_stock(&mut self, mut response: Response) -> Result<(), SendError> {
        let request = Request::default();
        self.framed.codec_mut().prepare(&request, &mut response, true);
        self.framed.feed(ResponseFrame::Head { response: &response, version: Version::HTTP_11 }).await?;
        self.framed.send(ResponseFrame::End).await
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.framed.get_mut().shutdown().await {
            debug!(cause = %e, "transport shutdown failed");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown cause"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::HttpCodec;
    use crate::fastcgi::FcgiCodec;
    use crate::fastcgi::params::encode_pair;
    use crate::fastcgi::record::{BeginRequest, RecordHeader, RecordType, Role, encode_stream, encode_stream_end};
    use crate::handler::{Done, make_handler};
    use crate::protocol::{BoxError, FcgiError, ParseError, Status};
    use bytes::BytesMut;
    use tokio::io::{AsyncReadExt, DuplexStream, duplex};

    #[derive(Debug)]
    struct ParsedResponse {
        code: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    impl ParsedResponse {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
        }
    }

    /// Splits a byte stream into responses; a response without length runs to the end.
    fn parse_responses(mut bytes: &[u8]) -> Vec<ParsedResponse> {
        let mut responses = vec![];
        while !bytes.is_empty() {
            let mut headers = [httparse::EMPTY_HEADER; 32];
            let mut response = httparse::Response::new(&mut headers);
            let httparse::Status::Complete(head_len) = response.parse(bytes).unwrap() else {
                panic!("incomplete response head");
            };

            let headers = response
                .headers
                .iter()
                .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
                .collect::<Vec<_>>();
            let length = headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case("Content-Length"))
                .map_or(bytes.len() - head_len, |(_, v)| v.parse::<usize>().unwrap());

            responses.push(ParsedResponse {
                code: response.code.unwrap(),
                headers,
                body: bytes[head_len..head_len + length].to_vec(),
            });
            bytes = &bytes[head_len + length..];
        }
        responses
    }

    async fn echo(mut ctx: Context<'_>) -> Result<Done, BoxError> {
        let body = format!("{} {} {}", ctx.request().method(), ctx.request().uri(), String::from_utf8_lossy(ctx.request().body()));
        ctx.response_mut().insert_header("Content-Type", "text/plain")?;
        ctx.response_mut().set_body(body);
        Ok(ctx.done().await?)
    }

    async fn stream_three(mut ctx: Context<'_>) -> Result<Done, BoxError> {
        for chunk in ["one,", "two,"] {
            ctx.response_mut().append_body(chunk);
            ctx.send_partial().await?;
            assert!(ctx.response().body().is_empty());
        }
        ctx.response_mut().append_body("three");
        Ok(ctx.done().await?)
    }

    async fn failing(_ctx: Context<'_>) -> Result<Done, BoxError> {
        Err("no luck".into())
    }

    async fn panicking(_ctx: Context<'_>) -> Result<Done, BoxError> {
        panic!("boom")
    }

    /// Sends `input`, half-closes, and collects everything the server wrote.
    async fn exchange<P, H>(protocol: P, handler: H, config: ConnectionConfig, input: &[u8]) -> (Result<(), ConnectionError>, Vec<u8>)
    where
        P: WireProtocol,
        H: Handler + 'static,
    {
        let (mut client, server): (DuplexStream, DuplexStream) = duplex(256 * 1024);
        let connection = Connection::new(server, protocol, &config);
        let task = tokio::spawn(connection.process(Arc::new(handler)));

        client.write_all(input).await.unwrap();
        client.shutdown().await.unwrap();

        let mut output = vec![];
        client.read_to_end(&mut output).await.unwrap();
        (task.await.unwrap(), output)
    }

    async fn http_exchange<H: Handler + 'static>(handler: H, input: &[u8]) -> (Result<(), ConnectionError>, Vec<ParsedResponse>) {
        let (result, output) = exchange(HttpCodec::default(), handler, ConnectionConfig::default(), input).await;
        (result, parse_responses(&output))
    }

    #[tokio::test]
    async fn keep_alive_serves_sequential_requests() {
        let input = b"GET /first HTTP/1.1\r\nConnection: keep-alive\r\n\r\nPOST /second HTTP/1.1\r\nConnection: keep-alive\r\nContent-Length: 4\r\n\r\nbody";
        let (result, responses) = http_exchange(make_handler(|ctx| echo(ctx).boxed()), input).await;

        result.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].code, 200);
        assert_eq!(responses[0].body, b"GET /first ");
        assert_eq!(responses[0].header("Connection"), None);
        assert_eq!(responses[1].body, b"POST /second body");
        assert_eq!(responses[1].header("content-type"), Some("text/plain"));
        assert_eq!(responses[1].header("Server"), Some(crate::protocol::SERVER_NAME));
        assert!(responses[1].header("Date").is_some());
    }

    #[tokio::test]
    async fn connection_close_ends_the_transport() {
        let input = b"GET /first HTTP/1.1\r\nConnection: close\r\n\r\nGET /second HTTP/1.1\r\n\r\n";
        let (result, responses) = http_exchange(make_handler(|ctx| echo(ctx).boxed()), input).await;

        result.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].body, b"GET /first ");
        assert_eq!(responses[0].header("Connection"), Some("close"));
    }

    #[tokio::test]
    async fn body_of_other_methods_never_runs_as_a_request() {
        let input = b"PUT /x HTTP/1.1\r\nContent-Length: 23\r\n\r\nGET /admin HTTP/1.1\r\n\r\nGET /next HTTP/1.1\r\n\r\n";
        let (result, responses) = http_exchange(make_handler(|ctx| echo(ctx).boxed()), input).await;

        result.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].body, b"PUT /x ");
        assert_eq!(responses[1].body, b"GET /next ");
    }

    #[tokio::test]
    async fn http10_keep_alive_is_acknowledged() {
        let input = b"GET /a HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\nGET /b HTTP/1.0\r\n\r\n";
        let (result, responses) = http_exchange(make_handler(|ctx| echo(ctx).boxed()), input).await;

        result.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].header("Connection"), Some("keep-alive"));
        assert_eq!(responses[1].header("Connection"), None);
        assert_eq!(responses[1].body, b"GET /b ");
    }

    #[tokio::test]
    async fn http09_gets_the_bare_body() {
        let (result, output) = exchange(HttpCodec::default(), make_handler(|ctx| echo(ctx).boxed()), ConnectionConfig::default(), b"GET /old\r\n").await;

        result.unwrap();
        assert_eq!(output, b"GET /old ");
    }

    #[tokio::test]
    async fn syntax_error_gets_bad_request() {
        let (result, responses) = http_exchange(make_handler(|ctx| echo(ctx).boxed()), b"GET / HTTP/1.1\r\nBad Header\r\n\r\n").await;

        assert!(matches!(result, Err(ConnectionError::Parse { source: ParseError::InvalidHeader { .. } })));
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].code, 400);
        assert_eq!(responses[0].header("Connection"), Some("close"));
        assert_eq!(responses[0].body, Status::BadRequest.stock_body().as_bytes());
    }

    #[tokio::test]
    async fn streamed_response_without_length_closes() {
        let input = b"GET /stream HTTP/1.1\r\n\r\nGET /never HTTP/1.1\r\n\r\n";
        let (result, responses) = http_exchange(make_handler(|ctx| stream_three(ctx).boxed()), input).await;

        result.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].header("Connection"), Some("close"));
        assert_eq!(responses[0].header("Content-Length"), None);
        assert_eq!(responses[0].body, b"one,two,three");
    }

    #[tokio::test]
    async fn handler_failure_closes_without_response() {
        let (result, output) = exchange(HttpCodec::default(), make_handler(|ctx| failing(ctx).boxed()), ConnectionConfig::default(), b"GET / HTTP/1.1\r\n\r\n").await;
        assert!(matches!(result, Err(ConnectionError::Handler { .. })));
        assert!(output.is_empty());

        let (result, output) = exchange(HttpCodec::default(), make_handler(|ctx| panicking(ctx).boxed()), ConnectionConfig::default(), b"GET / HTTP/1.1\r\n\r\n").await;
        let Err(ConnectionError::Handler { source }) = result else { panic!("expect handler error") };
        assert!(source.to_string().contains("boom"));
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn idle_connection_times_out() {
        let (_client, server) = duplex(1024);
        let config = ConnectionConfig { read_timeout: Some(Duration::from_millis(20)), ..ConnectionConfig::default() };
        let result = Connection::new(server, HttpCodec::default(), &config).process(Arc::new(make_handler(|ctx| echo(ctx).boxed()))).await;

        let error = result.unwrap_err();
        assert!(matches!(error, ConnectionError::Timeout));
        assert!(error.is_benign());
    }

    fn fcgi_request(request_id: u16, role: Role, keep_conn: bool, uri: &str, dst: &mut BytesMut) {
        BeginRequest { role, keep_conn }.encode(request_id, dst);
        let mut params = BytesMut::new();
        encode_pair(b"REQUEST_METHOD", b"GET", &mut params);
        encode_pair(b"REQUEST_URI", uri.as_bytes(), &mut params);
        encode_stream(RecordType::Params, request_id, &params, dst);
        encode_stream_end(RecordType::Params, request_id, dst);
        encode_stream_end(RecordType::Stdin, request_id, dst);
    }

    fn stdout_of(mut bytes: &[u8]) -> (Vec<u8>, usize) {
        let mut stdout = vec![];
        let mut end_requests = 0;
        while let Some(header) = RecordHeader::parse(bytes) {
            let content = &bytes[8..8 + usize::from(header.content_length)];
            match header.record_type {
                RecordType::Stdout => stdout.extend_from_slice(content),
                RecordType::EndRequest => end_requests += 1,
                other => panic!("unexpected record {other:?}"),
            }
            bytes = &bytes[header.record_len()..];
        }
        (stdout, end_requests)
    }

    #[tokio::test]
    async fn fastcgi_rejected_role_writes_nothing() {
        let mut input = BytesMut::new();
        fcgi_request(1, Role::Filter, false, "/", &mut input);

        let (result, output) = exchange(FcgiCodec::default(), make_handler(|ctx| echo(ctx).boxed()), ConnectionConfig::default(), &input).await;

        assert!(matches!(result, Err(ConnectionError::FastCgi { source: FcgiError::UnsupportedRole(3) })));
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn fastcgi_keep_conn_serves_sequential_requests() {
        let mut input = BytesMut::new();
        fcgi_request(1, Role::Responder, true, "/one", &mut input);
        fcgi_request(2, Role::Responder, false, "/two", &mut input);

        let (result, output) = exchange(FcgiCodec::default(), make_handler(|ctx| echo(ctx).boxed()), ConnectionConfig::default(), &input).await;

        result.unwrap();
        let (stdout, end_requests) = stdout_of(&output);
        assert_eq!(end_requests, 2);

        let stdout = String::from_utf8(stdout).unwrap();
        assert!(stdout.starts_with("Status: 200 OK\r\n"));
        assert!(stdout.contains("GET /one "));
        assert!(stdout.ends_with("GET /two "));
    }

    #[tokio::test]
    async fn fastcgi_streaming() {
        let mut input = BytesMut::new();
        fcgi_request(9, Role::Responder, false, "/stream", &mut input);

        let (result, output) = exchange(FcgiCodec::default(), make_handler(|ctx| stream_three(ctx).boxed()), ConnectionConfig::default(), &input).await;

        result.unwrap();
        let (stdout, end_requests) = stdout_of(&output);
        assert_eq!(end_requests, 1);
        assert!(stdout.ends_with(b"\r\n\r\none,two,three"));
    }
}
