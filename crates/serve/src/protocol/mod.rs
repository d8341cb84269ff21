//! Protocol-independent request/response model.
//!
//! Both wire protocols produce the same [`Request`] and consume the same
//! [`Response`], which is what lets one handler serve plain HTTP, HTTPS and
//! FastCGI unchanged.
//!
//! - [`Request`]: the staged, read-only request with ordered headers
//! - [`Response`]: mutable status, headers and appendable body, plus its
//!   wire rendering
//! - [`Status`]: the closed set of supported status codes
//! - [`error`]: failure classes of every layer

mod request;
pub use request::HeaderItem;
pub use request::Request;
pub use request::Version;
pub(crate) use request::negotiate_keep_alive;

mod response;
pub use response::Response;
pub use response::SERVER_NAME;

mod status;
pub use status::Status;
pub use status::UnsupportedStatus;

pub mod error;
pub use error::BoxError;
pub use error::ConnectionError;
pub use error::FcgiError;
pub use error::ParseError;
pub use error::SendError;
