//! Incremental HTTP/1.x request parser.
//!
//! The parser is a byte-driven state machine: every call consumes as much of
//! the input as it can and remembers where it stopped, so a request split
//! across any number of reads parses to the same result as one delivered in
//! a single read. Method and header names are staged directly into the
//! caller's [`Request`]; the URI and header values are collected as raw bytes
//! and must be valid UTF-8 once their field ends.
//!
//! Grammar accepted:
//!
//! ```text
//! METHOD SP URI CRLF                                  ; HTTP/0.9, completes immediately
//! METHOD SP URI SP HTTP/major.minor CRLF
//! *( Name ":" OWS Value CRLF | (SP / HT) continuation CRLF )
//! CRLF
//! [ body ]                                            ; Content-Length, kept for POST only
//! ```

use bytes::BytesMut;
use http::Method;

use crate::codec::Limits;
use crate::ensure;
use crate::protocol::{HeaderItem, ParseError, Request, Version, negotiate_keep_alive};

const HTTP_TOKEN: &[u8] = b"HTTP/";

/// Outcome of feeding bytes to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The request is complete; only this many leading input bytes belong to it.
    Complete(usize),
    /// Every input byte was consumed and the request needs more.
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    MethodStart,
    Method,
    UriStart,
    Uri,
    Http09Newline,
    /// Matching `HTTP/`, the index is the next expected byte.
    VersionToken(usize),
    MajorStart,
    Major,
    MinorStart,
    Minor,
    RequestLineNewline,
    HeaderLineStart,
    /// Leading whitespace of a folded continuation line.
    HeaderLws,
    HeaderName,
    HeaderValueStart,
    HeaderValue,
    HeaderLineNewline,
    HeadersEndNewline,
    Body { remaining: usize },
    /// A body the request carries but doesn't keep.
    Discard { remaining: usize },
}

#[derive(Debug)]
pub struct RequestParser {
    state: State,
    limits: Limits,
    method: Vec<u8>,
    uri: Vec<u8>,
    /// Bytes of the current header line's value.
    value: Vec<u8>,
    head_bytes: usize,
    body: BytesMut,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl RequestParser {
    pub fn new(limits: Limits) -> Self {
        Self {
            state: State::MethodStart,
            limits,
            method: Vec::with_capacity(8),
            uri: Vec::new(),
            value: Vec::new(),
            head_bytes: 0,
            body: BytesMut::new(),
        }
    }

    /// Forgets all progress so the next byte starts a new request.
    pub fn reset(&mut self) {
        self.state = State::MethodStart;
        self.method.clear();
        self.uri.clear();
        self.value.clear();
        self.head_bytes = 0;
        self.body.clear();
    }

    /// Feeds `input` into the state machine, staging into `request`.
    ///
    /// `request` must be the same staging value across the calls that make up
    /// one request, and a fresh one after [`reset`](Self::reset).
    ///
    /// # Errors
    ///
    /// Returns an error on the first byte that violates the grammar or a
    /// configured limit. The parser must be reset before it is fed again.
    pub fn parse(&mut self, request: &mut Request, input: &[u8]) -> Result<Progress, ParseError> {
        let mut pos = 0;

        while pos < input.len() {
            if let State::Body { remaining } | State::Discard { remaining } = self.state {
                let keep = matches!(self.state, State::Body { .. });
                let take = remaining.min(input.len() - pos);
                if keep {
                    self.body.extend_from_slice(&input[pos..pos + take]);
                }
                pos += take;

                if take == remaining {
                    request.body = self.body.split().freeze();
                    return Ok(Progress::Complete(pos));
                }
                let remaining = remaining - take;
                self.state = if keep { State::Body { remaining } } else { State::Discard { remaining } };
                continue;
            }

            self.head_bytes += 1;
            ensure!(
                self.head_bytes <= self.limits.max_head_bytes,
                ParseError::too_large_header(self.head_bytes, self.limits.max_head_bytes)
            );

            let byte = input[pos];
            pos += 1;
            if self.consume(request, byte)? {
                return Ok(Progress::Complete(pos));
            }
        }

        Ok(Progress::Incomplete)
    }

    /// Advances the head states by one byte, returns true when the request is complete.
    fn consume(&mut self, request: &mut Request, byte: u8) -> Result<bool, ParseError> {
        match self.state {
            State::MethodStart => match byte {
                // stray line breaks between requests
                b'\r' | b'\n' => {}
                b if is_token(b) => {
                    self.method.push(b);
                    self.state = State::Method;
                }
                _ => return Err(ParseError::InvalidMethod),
            },

            State::Method => match byte {
                b' ' => {
                    request.method = Method::from_bytes(&self.method).map_err(|_e| ParseError::InvalidMethod)?;
                    self.state = State::UriStart;
                }
                b if is_token(b) => self.method.push(b),
                _ => return Err(ParseError::InvalidMethod),
            },

            State::UriStart => {
                ensure!(!is_control(byte) && byte != b' ', ParseError::InvalidUri);
                self.uri.push(byte);
                self.state = State::Uri;
            }

            State::Uri => match byte {
                b' ' => {
                    self.finish_uri(request)?;
                    self.state = State::VersionToken(0);
                }
                b'\r' => {
                    self.finish_uri(request)?;
                    self.state = State::Http09Newline;
                }
                b if is_control(b) => return Err(ParseError::InvalidUri),
                b => self.uri.push(b),
            },

            State::Http09Newline => {
                ensure!(byte == b'\n', ParseError::InvalidVersion);
                request.version = Version::HTTP_09;
                request.keep_alive = false;
                return Ok(true);
            }

            State::VersionToken(idx) => {
                ensure!(byte == HTTP_TOKEN[idx], ParseError::InvalidVersion);
                self.state = if idx + 1 == HTTP_TOKEN.len() { State::MajorStart } else { State::VersionToken(idx + 1) };
            }

            State::MajorStart => {
                request.version.major = digit(byte)?;
                self.state = State::Major;
            }

            State::Major => match byte {
                b'.' => self.state = State::MinorStart,
                b => request.version.major = push_digit(request.version.major, b)?,
            },

            State::MinorStart => {
                request.version.minor = digit(byte)?;
                self.state = State::Minor;
            }

            State::Minor => match byte {
                b'\r' => self.state = State::RequestLineNewline,
                b => request.version.minor = push_digit(request.version.minor, b)?,
            },

            State::RequestLineNewline => {
                ensure!(byte == b'\n', ParseError::InvalidVersion);
                self.state = State::HeaderLineStart;
            }

            State::HeaderLineStart => match byte {
                b'\r' => self.state = State::HeadersEndNewline,
                b' ' | b'\t' => {
                    ensure!(!request.headers.is_empty(), ParseError::invalid_header("continuation line before any header"));
                    self.state = State::HeaderLws;
                }
                b if is_token(b) => {
                    ensure!(
                        request.headers.len() < self.limits.max_headers,
                        ParseError::too_many_headers(self.limits.max_headers)
                    );
                    request.headers.push(HeaderItem::new(char::from(b), String::new()));
                    self.state = State::HeaderName;
                }
                _ => return Err(ParseError::invalid_header("illegal character at the start of a header name")),
            },

            State::HeaderLws => match byte {
                b'\r' => self.state = State::HeaderLineNewline,
                b' ' | b'\t' => {}
                b if is_control(b) => return Err(ParseError::invalid_header("control character in header value")),
                b => {
                    let value = &mut current_header(request)?.value;
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    self.value.push(b);
                    self.state = State::HeaderValue;
                }
            },

            State::HeaderName => match byte {
                b':' => self.state = State::HeaderValueStart,
                b if is_token(b) => current_header(request)?.name.push(char::from(b)),
                _ => return Err(ParseError::invalid_header("illegal character in header name")),
            },

            State::HeaderValueStart => match byte {
                b' ' | b'\t' => {}
                b'\r' => self.state = State::HeaderLineNewline,
                b if is_control(b) => return Err(ParseError::invalid_header("control character in header value")),
                b => {
                    self.value.push(b);
                    self.state = State::HeaderValue;
                }
            },

            State::HeaderValue => match byte {
                b'\r' => {
                    self.finish_value(request)?;
                    self.state = State::HeaderLineNewline;
                }
                b if is_control(b) && b != b'\t' => {
                    return Err(ParseError::invalid_header("control character in header value"));
                }
                b => self.value.push(b),
            },

            State::HeaderLineNewline => {
                ensure!(byte == b'\n', ParseError::invalid_header("header line must end with CRLF"));
                self.state = State::HeaderLineStart;
            }

            State::HeadersEndNewline => {
                ensure!(byte == b'\n', ParseError::invalid_header("header block must end with CRLF"));
                return self.finish_head(request);
            }

            // drained in bulk by `parse`
            State::Body { .. } | State::Discard { .. } => {}
        }

        Ok(false)
    }

    fn finish_uri(&mut self, request: &mut Request) -> Result<(), ParseError> {
        let uri = std::str::from_utf8(&self.uri).map_err(|_e| ParseError::InvalidUri)?;
        request.uri.push_str(uri);
        self.uri.clear();
        Ok(())
    }

    /// Appends the value bytes of one header line to the current header.
    fn finish_value(&mut self, request: &mut Request) -> Result<(), ParseError> {
        let value = std::str::from_utf8(&self.value).map_err(|_e| ParseError::invalid_header("header value is not valid UTF-8"))?;
        current_header(request)?.value.push_str(value);
        self.value.clear();
        Ok(())
    }

    fn finish_head(&mut self, request: &mut Request) -> Result<bool, ParseError> {
        for item in &mut request.headers {
            let len = item.value.trim_end_matches([' ', '\t']).len();
            item.value.truncate(len);
        }

        request.keep_alive = negotiate_keep_alive(&request.headers, request.version);

        let Some(length) = content_length(&request.headers)? else {
            return Ok(true);
        };

        let max_size = self.limits.max_body_bytes;
        let length = usize::try_from(length)
            .ok()
            .filter(|length| *length <= max_size)
            .ok_or_else(|| ParseError::too_large_body(length, max_size))?;

        if length == 0 {
            return Ok(true);
        }

        // only POST keeps its body, the others are read past and dropped
        self.state = if request.method == Method::POST {
            State::Body { remaining: length }
        } else {
            State::Discard { remaining: length }
        };
        Ok(false)
    }
}

fn current_header(request: &mut Request) -> Result<&mut HeaderItem, ParseError> {
    request.headers.last_mut().ok_or_else(|| ParseError::invalid_header("header value without a name"))
}

/// All `Content-Length` headers must agree on one decimal value.
fn content_length(headers: &[HeaderItem]) -> Result<Option<u64>, ParseError> {
    let mut length = None;

    for item in headers.iter().filter(|item| item.is("Content-Length")) {
        let value = item.value.trim();
        ensure!(
            !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()),
            ParseError::invalid_content_length(format!("not a decimal number: {value:?}"))
        );

        let parsed = value.parse::<u64>().map_err(ParseError::invalid_content_length)?;
        ensure!(length.is_none_or(|length| length == parsed), ParseError::invalid_content_length("conflicting values"));
        length = Some(parsed);
    }

    Ok(length)
}

fn digit(byte: u8) -> Result<u16, ParseError> {
    if byte.is_ascii_digit() { Ok(u16::from(byte - b'0')) } else { Err(ParseError::InvalidVersion) }
}

fn push_digit(current: u16, byte: u8) -> Result<u16, ParseError> {
    let digit = digit(byte)?;
    current.checked_mul(10).and_then(|value| value.checked_add(digit)).ok_or(ParseError::InvalidVersion)
}

#[inline]
fn is_control(byte: u8) -> bool {
    byte < 32 || byte == 127
}

#[inline]
fn is_special(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')'
            | b'<'
            | b'>'
            | b'@'
            | b','
            | b';'
            | b':'
            | b'\\'
            | b'"'
            | b'/'
            | b'['
            | b']'
            | b'?'
            | b'='
            | b'{'
            | b'}'
            | b' '
            | b'\t'
    )
}

/// Characters allowed in methods and header names.
#[inline]
fn is_token(byte: u8) -> bool {
    byte.is_ascii() && !is_control(byte) && !is_special(byte)
}
