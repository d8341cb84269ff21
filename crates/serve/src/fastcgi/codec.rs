use std::mem;
use std::net::{IpAddr, SocketAddr};

use bytes::{Buf, BytesMut};
use http::Method;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{Limits, ResponseFrame};
use crate::ensure;
use crate::fastcgi::params::{ParamsDecoder, cgi_header_name};
use crate::fastcgi::record::{
    BeginRequest, FCGI_VERSION_1, HEADER_LEN, ProtocolStatus, RecordHeader, RecordType, Role, encode_end_request,
    encode_stream, encode_stream_end,
};
use crate::protocol::{FcgiError, HeaderItem, Request, SendError, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitBegin,
    Params,
    Stdin,
    /// A request was handed out and its response is not finished yet.
    Responding,
}

impl Phase {
    fn describe(self) -> &'static str {
        match self {
            Phase::AwaitBegin => "awaiting BeginRequest",
            Phase::Params => "reading Params",
            Phase::Stdin => "reading Stdin",
            Phase::Responding => "responding",
        }
    }
}

#[derive(Debug, Default)]
struct RemoteEndpoint {
    ip: Option<IpAddr>,
    port: Option<u16>,
}

/// FastCGI responder codec: one request at a time per connection.
///
/// Decoding accepts `BeginRequest`, a Params stream and a Stdin stream, and
/// yields the request when the empty Stdin record arrives. Encoding wraps the
/// response in Stdout records of the session's request id and closes the
/// request with two empty Stdout records and an `EndRequest`.
#[derive(Debug)]
pub struct FcgiCodec {
    phase: Phase,
    limits: Limits,
    request_id: u16,
    keep_conn: bool,
    params: ParamsDecoder,
    staged: Request,
    remote: RemoteEndpoint,
    stdin: BytesMut,
    scratch: BytesMut,
}

impl Default for FcgiCodec {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl FcgiCodec {
    pub fn new(limits: Limits) -> Self {
        Self {
            phase: Phase::AwaitBegin,
            limits,
            request_id: 0,
            keep_conn: false,
            params: ParamsDecoder::new(limits.max_head_bytes),
            staged: Request::default(),
            remote: RemoteEndpoint::default(),
            stdin: BytesMut::new(),
            scratch: BytesMut::new(),
        }
    }

    /// The request id of the session in progress, 0 between requests.
    pub fn request_id(&self) -> u16 {
        self.request_id
    }

    fn reset_session(&mut self) {
        self.phase = Phase::AwaitBegin;
        self.request_id = 0;
        self.keep_conn = false;
        self.params.reset();
        self.staged = Request::default();
        self.remote = RemoteEndpoint::default();
        self.stdin.clear();
    }

    fn on_record(&mut self, header: RecordHeader, content: &[u8]) -> Result<Option<Request>, FcgiError> {
        ensure!(header.version == FCGI_VERSION_1, FcgiError::UnsupportedVersion(header.version));

        if self.phase == Phase::AwaitBegin {
            return self.on_begin_request(header, content).map(|()| None);
        }

        ensure!(header.request_id == self.request_id, FcgiError::request_id_mismatch(self.request_id, header.request_id));

        match (self.phase, header.record_type) {
            (_, RecordType::AbortRequest) => Err(FcgiError::Aborted(self.request_id)),

            (Phase::Params, RecordType::Params) if content.is_empty() => {
                self.params.finish()?;
                self.phase = Phase::Stdin;
                Ok(None)
            }

            (Phase::Params, RecordType::Params) => {
                let Self { params, staged, remote, limits, .. } = self;
                params.feed(content, |name, value| apply_param(staged, remote, limits.max_headers, name, value))?;
                Ok(None)
            }

            (Phase::Stdin, RecordType::Stdin) if content.is_empty() => Ok(Some(self.complete())),

            (Phase::Stdin, RecordType::Stdin) => {
                let max_size = self.limits.max_body_bytes;
                ensure!(self.stdin.len() + content.len() <= max_size, FcgiError::TooLarge { what: "stdin", max_size });
                self.stdin.extend_from_slice(content);
                Ok(None)
            }

            (phase, record_type) => Err(FcgiError::unexpected_record(record_type.into(), phase.describe())),
        }
    }

    fn on_begin_request(&mut self, header: RecordHeader, content: &[u8]) -> Result<(), FcgiError> {
        // management records carry request id 0
        ensure!(
            header.record_type == RecordType::BeginRequest && header.request_id != 0,
            FcgiError::unexpected_record(header.record_type.into(), self.phase.describe())
        );

        let begin = BeginRequest::parse(content)?;
        ensure!(begin.role == Role::Responder, FcgiError::UnsupportedRole(begin.role.into()));

        self.request_id = header.request_id;
        self.keep_conn = begin.keep_conn;
        self.phase = Phase::Params;
        debug!(request_id = self.request_id, keep_conn = self.keep_conn, "fastcgi request begins");
        Ok(())
    }

    fn complete(&mut self) -> Request {
        self.phase = Phase::Responding;

        let mut request = mem::take(&mut self.staged);
        request.body = self.stdin.split().freeze();
        request.keep_alive = self.keep_conn;

        let remote = mem::take(&mut self.remote);
        if let Some(ip) = remote.ip {
            request.remote_addr = Some(SocketAddr::new(ip, remote.port.unwrap_or(0)));
        }
        request
    }
}

fn apply_param(
    request: &mut Request,
    remote: &mut RemoteEndpoint,
    max_headers: usize,
    name: &[u8],
    value: &[u8],
) -> Result<(), FcgiError> {
    let name = String::from_utf8_lossy(name);
    let value = String::from_utf8_lossy(value);

    match &*name {
        "REQUEST_METHOD" => {
            request.method = Method::from_bytes(value.as_bytes())
                .map_err(|_e| FcgiError::malformed_params(format!("invalid REQUEST_METHOD {value:?}")))?;
        }
        "REQUEST_URI" => request.uri = value.into_owned(),
        "SERVER_PROTOCOL" => {
            if let Some(version) = parse_protocol(&value) {
                request.version = version;
            }
        }
        "REMOTE_ADDR" => remote.ip = value.parse().ok(),
        "REMOTE_PORT" => remote.port = value.parse().ok(),
        // web servers send these empty for bodiless requests
        "CONTENT_LENGTH" | "CONTENT_TYPE" if value.is_empty() => {}
        _ => {
            if let Some(header_name) = cgi_header_name(&name) {
                ensure!(request.headers.len() < max_headers, FcgiError::TooLarge { what: "headers", max_size: max_headers });
                request.headers.push(HeaderItem::new(header_name, value.into_owned()));
            }
        }
    }

    Ok(())
}

/// Parses `HTTP/x.y`.
fn parse_protocol(value: &str) -> Option<Version> {
    let (major, minor) = value.strip_prefix("HTTP/")?.split_once('.')?;
    Some(Version::new(major.parse().ok()?, minor.parse().ok()?))
}

impl Decoder for FcgiCodec {
    type Item = Request;
    type Error = FcgiError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(header) = RecordHeader::parse(&src[..]) else {
                return Ok(None);
            };

            let record_len = header.record_len();
            if src.len() < record_len {
                src.reserve(record_len - src.len());
                return Ok(None);
            }

            let mut record = src.split_to(record_len);
            record.advance(HEADER_LEN);
            record.truncate(usize::from(header.content_length));

            if let Some(request) = self.on_record(header, &record)? {
                return Ok(Some(request));
            }
        }
    }
}

impl Encoder<ResponseFrame<'_>> for FcgiCodec {
    type Error = SendError;

    fn encode(&mut self, item: ResponseFrame<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            ResponseFrame::Head { response, .. } => {
                self.scratch.clear();
                response.encode_cgi_head(&mut self.scratch)?;
                self.scratch.extend_from_slice(response.body());
                encode_stream(RecordType::Stdout, self.request_id, &self.scratch, dst);
            }
            ResponseFrame::Body(bytes) => encode_stream(RecordType::Stdout, self.request_id, bytes, dst),
            ResponseFrame::End => {
                encode_stream_end(RecordType::Stdout, self.request_id, dst);
                encode_stream_end(RecordType::Stdout, self.request_id, dst);
                encode_end_request(self.request_id, 0, ProtocolStatus::RequestComplete, dst);
                self.reset_session();
            }
        }
        Ok(())
    }
}
