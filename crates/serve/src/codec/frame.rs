use crate::protocol::{Response, Version};

/// One outbound write of a response cycle, as handed to a protocol encoder.
///
/// A cycle is always `Head`, then zero or more `Body`, then `End`.
#[derive(Debug, Clone, Copy)]
pub enum ResponseFrame<'a> {
    /// The preamble followed by whatever body bytes are buffered in `response`.
    Head { response: &'a Response, version: Version },
    /// Body bytes buffered since the previous write.
    Body(&'a [u8]),
    /// The handler signalled completion.
    End,
}
