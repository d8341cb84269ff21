//! FastCGI responder protocol.
//!
//! A web server talks to this process over a stream socket, one request at a
//! time per connection:
//!
//! ```text
//! BeginRequest -> Params* -> Params(empty) -> Stdin* -> Stdin(empty)
//!                                             <- Stdout* <- Stdout(empty) x2 <- EndRequest
//! ```
//!
//! CGI variables are mapped onto the shared [`Request`](crate::protocol::Request)
//! so handlers cannot tell which protocol delivered it. Any violation of the
//! record sequence aborts the connection without a response.

mod codec;
pub mod params;
pub mod record;

pub use codec::FcgiCodec;
