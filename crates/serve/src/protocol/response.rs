//! The mutable response a handler fills in, and its wire rendering.
//!
//! Rendering is shared by both protocols: HTTP writes a status line, FastCGI a
//! CGI `Status:` header, and both follow it with the same header block and
//! blank line.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, DATE, SERVER};
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::protocol::{Status, Version};

/// Value of the `Server` header injected into every response.
pub const SERVER_NAME: &str = "micro-serve";

/// Initial buffer size reserved for a rendered preamble
const INIT_HEAD_SIZE: usize = 512;

/// A response under construction.
///
/// Header names are case-insensitive and a later insert replaces an earlier
/// value. A fresh response already carries `Date` and `Server`.
#[derive(Debug, Clone)]
pub struct Response {
    status: Status,
    headers: HeaderMap,
    body: BytesMut,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        let mut headers = HeaderMap::with_capacity(8);
        headers.insert(DATE, http_date());
        headers.insert(SERVER, HeaderValue::from_static(SERVER_NAME));
        Self { status: Status::Ok, headers, body: BytesMut::new() }
    }

    /// Builds a stock response: the status, its canned HTML page and the
    /// matching `Content-Type` and `Content-Length` headers.
    pub fn stock(status: Status) -> Self {
        let mut response = Self::new();
        response.status = status;
        response.body.extend_from_slice(status.stock_body().as_bytes());
        response.headers.insert(CONTENT_TYPE, HeaderValue::from_static(mime::TEXT_HTML_UTF_8.as_ref()));
        response.headers.insert(CONTENT_LENGTH, HeaderValue::from(response.body.len()));
        response
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the header value as a string, if present and visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Sets a header, replacing any previous value under the same name.
    ///
    /// # Errors
    ///
    /// Fails when `name` is not a valid header name or `value` contains
    /// bytes not allowed in a header value.
    pub fn insert_header(&mut self, name: &str, value: &str) -> Result<(), http::Error> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Mutable access to the pending body bytes.
    ///
    /// After a partial send the buffer only holds what was appended since.
    pub fn body_mut(&mut self) -> &mut BytesMut {
        &mut self.body
    }

    pub fn set_body(&mut self, body: impl AsRef<[u8]>) {
        self.body.clear();
        self.body.extend_from_slice(body.as_ref());
    }

    pub fn append_body(&mut self, body: impl AsRef<[u8]>) {
        self.body.extend_from_slice(body.as_ref());
    }

    /// Whether the response asks for the transport to be closed after it.
    pub fn wants_close(&self) -> bool {
        self.headers.get_all(CONNECTION).iter().any(|value| {
            value.as_bytes().split(|b| *b == b',').any(|token| token.trim_ascii().eq_ignore_ascii_case(b"close"))
        })
    }

    /// Renders `HTTP/x.y <code> <reason>\r\n`, the header block and the blank line.
    ///
    /// HTTP/1.0 requests are answered with `HTTP/1.0`, everything else with `HTTP/1.1`.
    pub fn encode_head(&self, version: Version, dst: &mut BytesMut) -> io::Result<()> {
        dst.reserve(INIT_HEAD_SIZE);
        let version = if version == Version::HTTP_10 { Version::HTTP_10 } else { Version::HTTP_11 };
        write!(FastWrite(dst), "{version} {} {}\r\n", self.status.code(), self.status.reason())?;
        self.encode_headers(dst);
        Ok(())
    }

    /// Renders the CGI preamble, `Status: <code> <reason>\r\n` followed by the
    /// header block and the blank line.
    pub fn encode_cgi_head(&self, dst: &mut BytesMut) -> io::Result<()> {
        dst.reserve(INIT_HEAD_SIZE);
        write!(FastWrite(dst), "Status: {} {}\r\n", self.status.code(), self.status.reason())?;
        self.encode_headers(dst);
        Ok(())
    }

    fn encode_headers(&self, dst: &mut BytesMut) {
        for (header_name, header_value) in &self.headers {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
    }
}

/// The current time in RFC 1123 format, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
fn http_date() -> HeaderValue {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    HeaderValue::from_bytes(&buf[..]).unwrap_or_else(|_| HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT"))
}

/// Writer over `BytesMut` for `write!` without an intermediate `String`.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
