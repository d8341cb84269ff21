/// Upper bounds applied to untrusted input by both wire protocols.
///
/// Exceeding any of them is treated like a syntax error: HTTP answers with
/// `400 Bad Request`, FastCGI aborts the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Request line plus header block, or accumulated FastCGI params bytes.
    pub max_head_bytes: usize,
    pub max_headers: usize,
    /// Declared HTTP body or FastCGI stdin bytes.
    pub max_body_bytes: usize,
}

pub const DEFAULT_MAX_HEAD_BYTES: usize = 64 * 1024;
pub const DEFAULT_MAX_HEADERS: usize = 100;
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_head_bytes: DEFAULT_MAX_HEAD_BYTES,
            max_headers: DEFAULT_MAX_HEADERS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}
