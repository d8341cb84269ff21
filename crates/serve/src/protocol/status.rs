//! Response status codes understood by the server.
//!
//! The set is closed. Every variant has a literal reason phrase for
//! the status line and, where a body makes sense, a canned HTML page used by
//! [`Response::stock`](crate::protocol::Response::stock).

use std::fmt;

use http::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    SwitchingProtocols,
    #[default]
    Ok,
    Created,
    Accepted,
    NoContent,
    MultipleChoices,
    MovedPermanently,
    Found,
    SeeOther,
    NotModified,
    TemporaryRedirect,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    HttpVersionNotSupported,
}

impl Status {
    pub const fn code(self) -> u16 {
        match self {
            Status::SwitchingProtocols => 101,
            Status::Ok => 200,
            Status::Created => 201,
            Status::Accepted => 202,
            Status::NoContent => 204,
            Status::MultipleChoices => 300,
            Status::MovedPermanently => 301,
            Status::Found => 302,
            Status::SeeOther => 303,
            Status::NotModified => 304,
            Status::TemporaryRedirect => 307,
            Status::BadRequest => 400,
            Status::Unauthorized => 401,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
            Status::InternalServerError => 500,
            Status::NotImplemented => 501,
            Status::BadGateway => 502,
            Status::ServiceUnavailable => 503,
            Status::HttpVersionNotSupported => 505,
        }
    }

    pub const fn reason(self) -> &'static str {
        match self {
            Status::SwitchingProtocols => "Switching Protocols",
            Status::Ok => "OK",
            Status::Created => "Created",
            Status::Accepted => "Accepted",
            Status::NoContent => "No Content",
            Status::MultipleChoices => "Multiple Choices",
            Status::MovedPermanently => "Moved Permanently",
            Status::Found => "Found",
            Status::SeeOther => "See Other",
            Status::NotModified => "Not Modified",
            Status::TemporaryRedirect => "Temporary Redirect",
            Status::BadRequest => "Bad Request",
            Status::Unauthorized => "Unauthorized",
            Status::Forbidden => "Forbidden",
            Status::NotFound => "Not Found",
            Status::MethodNotAllowed => "Method Not Allowed",
            Status::InternalServerError => "Internal Server Error",
            Status::NotImplemented => "Not Implemented",
            Status::BadGateway => "Bad Gateway",
            Status::ServiceUnavailable => "Service Unavailable",
            Status::HttpVersionNotSupported => "HTTP Version Not Supported",
        }
    }

    /// Whether a response with this status may carry a body at all.
    pub const fn allows_body(self) -> bool {
        !matches!(self, Status::SwitchingProtocols | Status::NoContent | Status::NotModified)
    }

    /// The canned HTML page sent with synthesized responses.
    ///
    /// Empty for `200 OK` and for statuses that must not carry a body.
    pub fn stock_body(self) -> String {
        if matches!(self, Status::Ok) || !self.allows_body() {
            return String::new();
        }

        let reason = self.reason();
        format!(
            "<html><head><title>{reason}</title></head><body><h1>{code} {reason}</h1></body></html>",
            code = self.code()
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

impl From<Status> for StatusCode {
    fn from(status: Status) -> Self {
        // every variant is a registered status code
        StatusCode::from_u16(status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// The status code has no [`Status`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported status code {0}")]
pub struct UnsupportedStatus(pub u16);

impl TryFrom<u16> for Status {
    type Error = UnsupportedStatus;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        let status = match code {
            101 => Status::SwitchingProtocols,
            200 => Status::Ok,
            201 => Status::Created,
            202 => Status::Accepted,
            204 => Status::NoContent,
            300 => Status::MultipleChoices,
            301 => Status::MovedPermanently,
            302 => Status::Found,
            303 => Status::SeeOther,
            304 => Status::NotModified,
            307 => Status::TemporaryRedirect,
            400 => Status::BadRequest,
            401 => Status::Unauthorized,
            403 => Status::Forbidden,
            404 => Status::NotFound,
            405 => Status::MethodNotAllowed,
            500 => Status::InternalServerError,
            501 => Status::NotImplemented,
            502 => Status::BadGateway,
            503 => Status::ServiceUnavailable,
            505 => Status::HttpVersionNotSupported,
            other => return Err(UnsupportedStatus(other)),
        };
        Ok(status)
    }
}

impl TryFrom<StatusCode> for Status {
    type Error = UnsupportedStatus;

    fn try_from(code: StatusCode) -> Result<Self, Self::Error> {
        Status::try_from(code.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_matches_http_crate() {
        for code in [101, 200, 201, 202, 204, 300, 301, 302, 303, 304, 307, 400, 401, 403, 404, 405, 500, 501, 502, 503, 505] {
            let status = Status::try_from(code).unwrap();
            assert_eq!(status.code(), code);
            assert_eq!(StatusCode::from(status).as_u16(), code);
            assert_eq!(Some(status.reason()), StatusCode::from(status).canonical_reason());
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(Status::try_from(418), Err(UnsupportedStatus(418)));
        assert_eq!(Status::try_from(StatusCode::IM_A_TEAPOT), Err(UnsupportedStatus(418)));
    }

    #[test]
    fn stock_bodies() {
        assert_eq!(
            Status::NotFound.stock_body(),
            "<html><head><title>Not Found</title></head><body><h1>404 Not Found</h1></body></html>"
        );
        assert!(Status::Ok.stock_body().is_empty());
        assert!(Status::NoContent.stock_body().is_empty());
        assert!(Status::NotModified.stock_body().is_empty());
        assert_eq!(Status::BadGateway.to_string(), "502 Bad Gateway");
    }
}
