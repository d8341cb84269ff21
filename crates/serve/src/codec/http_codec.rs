//! The HTTP/1.x wire protocol as a tokio-util codec pair.
//!
//! Decoding drives [`RequestParser`] over the read buffer and yields one
//! [`Request`] per completed parse, declared body included. Bytes after a
//! completed request stay in the buffer until the connection asks for the
//! next one.

use std::mem;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::request_parser::{Progress, RequestParser};
use crate::codec::{Limits, ResponseFrame};
use crate::protocol::{ParseError, Request, SendError, Version};

#[derive(Debug, Default)]
pub struct HttpCodec {
    parser: RequestParser,
    staged: Request,
}

impl HttpCodec {
    pub fn new(limits: Limits) -> Self {
        Self { parser: RequestParser::new(limits), staged: Request::default() }
    }
}

impl Decoder for HttpCodec {
    type Item = Request;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&mut self.staged, &src[..])? {
            Progress::Complete(consumed) => {
                src.advance(consumed);
                self.parser.reset();
                Ok(Some(mem::take(&mut self.staged)))
            }
            Progress::Incomplete => {
                src.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<ResponseFrame<'_>> for HttpCodec {
    type Error = SendError;

    fn encode(&mut self, item: ResponseFrame<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            ResponseFrame::Head { response, version } => {
                // HTTP/0.9 responses are the bare body
                if version != Version::HTTP_09 {
                    response.encode_head(version, dst)?;
                }
                dst.extend_from_slice(response.body());
            }
            ResponseFrame::Body(bytes) => dst.extend_from_slice(bytes),
            ResponseFrame::End => {}
        }
        Ok(())
    }
}
