//! HTTP/1.x codec.
//!
//! - [`RequestParser`]: the restartable byte-level request state machine
//! - [`HttpCodec`]: tokio-util `Decoder`/`Encoder` pair built on the parser
//! - [`ResponseFrame`]: the unit of outbound writes shared with the FastCGI codec
//! - [`Limits`]: input bounds shared by both protocols
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_serve::codec::HttpCodec;
//! use tokio_util::codec::Decoder;
//!
//! let mut codec = HttpCodec::default();
//! let mut buf = BytesMut::from("GET / HTTP/1.1\r\nHost: a\r\n\r\n");
//! let request = codec.decode(&mut buf).unwrap().unwrap();
//! assert_eq!(request.header("host"), Some("a"));
//! ```

mod frame;
mod http_codec;
mod limits;
mod request_parser;

pub use frame::ResponseFrame;
pub use http_codec::HttpCodec;
pub use limits::{DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEAD_BYTES, DEFAULT_MAX_HEADERS, Limits};
pub use request_parser::{Progress, RequestParser};
