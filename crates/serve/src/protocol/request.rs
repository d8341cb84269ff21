//! The request model handed to application handlers.
//!
//! Both the HTTP parser and the FastCGI decoder stage their input into a
//! [`Request`]; handlers only ever see it read-only through the
//! [`Context`](crate::handler::Context).

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;
use http::Method;

/// Protocol version as it appeared on the request line.
///
/// Kept as plain numbers because the grammar accepts any digit sequence and
/// HTTP/0.9 requests carry no version token at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const HTTP_09: Version = Version::new(0, 9);
    pub const HTTP_10: Version = Version::new(1, 0);
    pub const HTTP_11: Version = Version::new(1, 1);

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::HTTP_11
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

/// A single request header, stored exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderItem {
    pub name: String,
    pub value: String,
}

impl HeaderItem {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }

    /// Case-insensitive name comparison.
    #[inline]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// A fully received request.
///
/// Headers keep their arrival order and duplicates; lookups by name are
/// case-insensitive and return the first match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: String,
    pub(crate) version: Version,
    pub(crate) headers: Vec<HeaderItem>,
    pub(crate) body: Bytes,
    pub(crate) keep_alive: bool,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: Method::GET,
            uri: String::new(),
            version: Version::default(),
            headers: Vec::new(),
            body: Bytes::new(),
            keep_alive: false,
            remote_addr: None,
        }
    }
}

impl Request {
    /// Returns a reference to the request's method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request target as sent by the client.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the path portion of the request target, without the query.
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(self.uri.as_str(), |(path, _)| path)
    }

    /// Returns the query portion of the request target, if any.
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &[HeaderItem] {
        &self.headers
    }

    /// Returns the value of the first header named `name`, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|item| item.is(name)).map(|item| item.value.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|item| item.is(name))
    }

    /// Returns every value of the headers named `name`, in arrival order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers.iter().filter(move |item| item.is(name)).map(|item| item.value.as_str())
    }

    /// The request body; only POST bodies announced by `Content-Length` over HTTP,
    /// or the whole stdin stream over FastCGI. Bodies of other HTTP methods
    /// are skipped and read as empty.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Whether the client asked to reuse the connection after this request.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// The peer address, when the transport has one.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}

/// Decides keep-alive from the `Connection` header and the request version.
///
/// A `close` token always wins, a `keep-alive` token always keeps the
/// connection, and without either the version decides: HTTP/1.1 and later
/// default to persistent connections.
pub(crate) fn negotiate_keep_alive(headers: &[HeaderItem], version: Version) -> bool {
    let mut keep_alive = None;

    for item in headers.iter().filter(|item| item.is("Connection")) {
        for token in item.value.split(',').map(str::trim) {
            if token.eq_ignore_ascii_case("close") {
                return false;
            }
            if token.eq_ignore_ascii_case("keep-alive") {
                keep_alive = Some(true);
            }
        }
    }

    keep_alive.unwrap_or(version >= Version::HTTP_11)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(headers: &[(&str, &str)]) -> Request {
        Request {
            headers: headers.iter().map(|(name, value)| HeaderItem::new(*name, *value)).collect(),
            uri: "/index.html?a=1&b=2".into(),
            ..Request::default()
        }
    }

    #[test]
    fn header_lookup_ignores_case() {
        let request = request_with(&[("content-length", "5"), ("Host", "a"), ("X-Tag", "1"), ("x-tag", "2")]);

        assert_eq!(request.header("Content-Length"), Some("5"));
        assert_eq!(request.header("HOST"), Some("a"));
        assert!(request.has_header("x-TAG"));
        assert!(!request.has_header("Cookie"));
        assert_eq!(request.header_values("X-Tag").collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn path_and_query() {
        let request = request_with(&[]);
        assert_eq!(request.path(), "/index.html");
        assert_eq!(request.query(), Some("a=1&b=2"));
    }

    #[test]
    fn keep_alive_rules() {
        let headers = |value: &str| vec![HeaderItem::new("Connection", value)];

        assert!(negotiate_keep_alive(&[], Version::HTTP_11));
        assert!(!negotiate_keep_alive(&[], Version::HTTP_10));
        assert!(!negotiate_keep_alive(&[], Version::HTTP_09));
        assert!(negotiate_keep_alive(&[], Version::new(2, 0)));

        assert!(negotiate_keep_alive(&headers("Keep-Alive"), Version::HTTP_10));
        assert!(!negotiate_keep_alive(&headers("close"), Version::HTTP_11));
        assert!(!negotiate_keep_alive(&headers("keep-alive, Close"), Version::HTTP_11));
        assert!(negotiate_keep_alive(&headers("Upgrade"), Version::HTTP_11));
        assert!(!negotiate_keep_alive(&headers("Upgrade"), Version::HTTP_10));
    }

    #[test]
    fn version_display_and_order() {
        assert_eq!(Version::HTTP_10.to_string(), "HTTP/1.0");
        assert!(Version::HTTP_09 < Version::HTTP_10);
        assert!(Version::new(1, 2) > Version::HTTP_11);
    }
}
