use std::error::Error;
use std::io;
use thiserror::Error;

/// Boxed error type returned by application handlers.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("request error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("fastcgi protocol error: {source}")]
    FastCgi {
        #[from]
        source: FcgiError,
    },

    #[error("response error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("handler error: {source}")]
    Handler { source: BoxError },

    #[error("no complete request within the read timeout")]
    Timeout,
}

impl ConnectionError {
    pub fn handler<E: Into<BoxError>>(e: E) -> Self {
        let source = e.into();
        // a handler that only failed because its write failed carries the SendError through
        match source.downcast::<SendError>() {
            Ok(send) => Self::Send { source: *send },
            Err(source) => Self::Handler { source },
        }
    }

    /// Returns true when the error only reflects the peer going away.
    ///
    /// These are the cancellation indications of an abruptly closed transport,
    /// plus an idle read timeout: they are logged at debug level and never escalated.
    pub fn is_benign(&self) -> bool {
        let io_error = match self {
            Self::Timeout => return true,
            Self::Parse { source: ParseError::Io { source } }
            | Self::FastCgi { source: FcgiError::Io { source } }
            | Self::Send { source: SendError::Io { source } } => source,
            _ => return false,
        };

        matches!(
            io_error.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
                | io::ErrorKind::NotConnected
        )
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("request head size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version")]
    InvalidVersion,

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("body size {current_size} exceed the limit {max_size}")]
    TooLargeBody { current_size: u64, max_size: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn too_large_body(current_size: u64, max_size: usize) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Violations of the FastCGI record protocol.
///
/// None of these can be answered: without a confirmed request id there is no
/// way to frame a response, so the connection is aborted.
#[derive(Error, Debug)]
pub enum FcgiError {
    #[error("unsupported fastcgi version {0}")]
    UnsupportedVersion(u8),

    #[error("unsupported fastcgi role {0}")]
    UnsupportedRole(u16),

    #[error("begin request body must be 8 bytes, got {0}")]
    InvalidBeginRequest(u16),

    #[error("request id mismatch, expect {expected} but receive {found}")]
    RequestIdMismatch { expected: u16, found: u16 },

    #[error("unexpected record type {found} while {state}")]
    UnexpectedRecord { found: u8, state: &'static str },

    #[error("malformed name-value pair: {reason}")]
    MalformedParams { reason: String },

    #[error("request {0} aborted by the web server")]
    Aborted(u16),

    #[error("{what} size exceed the limit {max_size}")]
    TooLarge { what: &'static str, max_size: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl FcgiError {
    pub fn unexpected_record(found: u8, state: &'static str) -> Self {
        Self::UnexpectedRecord { found, state }
    }

    pub fn malformed_params<S: ToString>(str: S) -> Self {
        Self::MalformedParams { reason: str.to_string() }
    }

    pub fn request_id_mismatch(expected: u16, found: u16) -> Self {
        Self::RequestIdMismatch { expected, found }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid header: {source}")]
    InvalidHeader {
        #[from]
        source: http::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_reset_is_benign() {
        let error: ConnectionError = ParseError::io(io::Error::from(io::ErrorKind::ConnectionReset)).into();
        assert!(error.is_benign());

        let error: ConnectionError = SendError::io(io::Error::from(io::ErrorKind::BrokenPipe)).into();
        assert!(error.is_benign());

        let error: ConnectionError = ParseError::InvalidMethod.into();
        assert!(!error.is_benign());

        let error: ConnectionError = FcgiError::io(io::Error::from(io::ErrorKind::PermissionDenied)).into();
        assert!(!error.is_benign());
    }

    #[test]
    fn handler_error_keeps_send_error() {
        let error = ConnectionError::handler(SendError::io(io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(matches!(error, ConnectionError::Send { .. }));
        assert!(error.is_benign());

        let error = ConnectionError::handler("boom");
        assert!(matches!(error, ConnectionError::Handler { .. }));
    }
}
