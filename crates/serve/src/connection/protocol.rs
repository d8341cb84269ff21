use std::fmt;

use http::HeaderValue;
use http::header::{CONNECTION, CONTENT_LENGTH};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{HttpCodec, ResponseFrame};
use crate::fastcgi::FcgiCodec;
use crate::protocol::{ConnectionError, FcgiError, ParseError, Request, Response, SendError, Status, Version};

/// A wire protocol the connection engine can speak.
///
/// The codec halves turn bytes into [`Request`]s and [`ResponseFrame`]s into
/// bytes; the two hooks carry the per-protocol policy the engine needs.
pub trait WireProtocol:
    Decoder<Item = Request, Error: Into<ConnectionError> + fmt::Display + Send>
    + for<'a> Encoder<ResponseFrame<'a>, Error = SendError>
    + Send
    + 'static
{
    /// The response to send for a decode error before closing, if the protocol
    /// can frame one at all.
    fn stock_response(&self, error: &<Self as Decoder>::Error) -> Option<Response>;

    /// Adjusts headers once, right before the preamble is encoded.
    ///
    /// `finishing` tells whether this first write is also the last one of the
    /// cycle. Returns whether the connection may be reused afterwards.
    fn prepare(&mut self, request: &Request, response: &mut Response, finishing: bool) -> bool;
}

impl WireProtocol for HttpCodec {
    fn stock_response(&self, error: &ParseError) -> Option<Response> {
        match error {
            ParseError::Io { .. } => None,
            _ => Some(Response::stock(Status::BadRequest)),
        }
    }

    fn prepare(&mut self, request: &Request, response: &mut Response, finishing: bool) -> bool {
        let mut keep_alive = request.keep_alive() && !response.wants_close();

        if response.status().allows_body() && !response.headers().contains_key(CONTENT_LENGTH) {
            if finishing {
                let length = HeaderValue::from(response.body().len());
                response.headers_mut().insert(CONTENT_LENGTH, length);
            } else {
                // without a length the end of the body is the end of the connection
                keep_alive = false;
            }
        }

        let version = request.version();
        if !response.headers().contains_key(CONNECTION) {
            if keep_alive && version == Version::HTTP_10 {
                response.headers_mut().insert(CONNECTION, HeaderValue::from_static("keep-alive"));
            } else if !keep_alive && version >= Version::HTTP_11 {
                response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
            }
        }

        keep_alive
    }
}

impl WireProtocol for FcgiCodec {
    fn stock_response(&self, _error: &FcgiError) -> Option<Response> {
        None
    }

    fn prepare(&mut self, request: &Request, _response: &mut Response, _finishing: bool) -> bool {
        request.keep_alive()
    }
}
