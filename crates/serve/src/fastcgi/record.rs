//! FastCGI record framing.
//!
//! Every record starts with the same eight byte header; multi-byte fields are
//! big-endian:
//!
//! ```text
//! version | type | requestId (2) | contentLength (2) | paddingLength | reserved
//! ```

use bytes::{BufMut, BytesMut};

use crate::ensure;
use crate::protocol::FcgiError;

pub const FCGI_VERSION_1: u8 = 1;
pub const HEADER_LEN: usize = 8;
/// Largest payload a single record can carry.
pub const MAX_CONTENT_LEN: usize = 0xffff;
/// Length of the BeginRequest body: role (2), flags, reserved (5).
pub const BEGIN_REQUEST_BODY_LEN: u16 = 8;

/// `FCGI_KEEP_CONN` bit of the BeginRequest flags.
const KEEP_CONN: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    BeginRequest,
    AbortRequest,
    EndRequest,
    Params,
    Stdin,
    Stdout,
    Stderr,
    Data,
    GetValues,
    GetValuesResult,
    Unknown(u8),
}

impl From<u8> for RecordType {
    fn from(value: u8) -> Self {
        match value {
            1 => RecordType::BeginRequest,
            2 => RecordType::AbortRequest,
            3 => RecordType::EndRequest,
            4 => RecordType::Params,
            5 => RecordType::Stdin,
            6 => RecordType::Stdout,
            7 => RecordType::Stderr,
            8 => RecordType::Data,
            9 => RecordType::GetValues,
            10 => RecordType::GetValuesResult,
            other => RecordType::Unknown(other),
        }
    }
}

impl From<RecordType> for u8 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::BeginRequest => 1,
            RecordType::AbortRequest => 2,
            RecordType::EndRequest => 3,
            RecordType::Params => 4,
            RecordType::Stdin => 5,
            RecordType::Stdout => 6,
            RecordType::Stderr => 7,
            RecordType::Data => 8,
            RecordType::GetValues => 9,
            RecordType::GetValuesResult => 10,
            RecordType::Unknown(other) => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Responder,
    Authorizer,
    Filter,
    Unknown(u16),
}

impl From<u16> for Role {
    fn from(value: u16) -> Self {
        match value {
            1 => Role::Responder,
            2 => Role::Authorizer,
            3 => Role::Filter,
            other => Role::Unknown(other),
        }
    }
}

impl From<Role> for u16 {
    fn from(value: Role) -> Self {
        match value {
            Role::Responder => 1,
            Role::Authorizer => 2,
            Role::Filter => 3,
            Role::Unknown(other) => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub version: u8,
    pub record_type: RecordType,
    pub request_id: u16,
    pub content_length: u16,
    pub padding_length: u8,
}

impl RecordHeader {
    pub fn new(record_type: RecordType, request_id: u16, content_length: u16) -> Self {
        Self { version: FCGI_VERSION_1, record_type, request_id, content_length, padding_length: 0 }
    }

    /// Reads a header from the first [`HEADER_LEN`] bytes of `src`.
    pub fn parse(src: &[u8]) -> Option<Self> {
        let header: &[u8; HEADER_LEN] = src.get(..HEADER_LEN)?.try_into().ok()?;
        Some(Self {
            version: header[0],
            record_type: RecordType::from(header[1]),
            request_id: u16::from_be_bytes([header[2], header[3]]),
            content_length: u16::from_be_bytes([header[4], header[5]]),
            padding_length: header[6],
        })
    }

    /// Header plus content plus padding.
    pub fn record_len(&self) -> usize {
        HEADER_LEN + usize::from(self.content_length) + usize::from(self.padding_length)
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.version);
        dst.put_u8(self.record_type.into());
        dst.put_u16(self.request_id);
        dst.put_u16(self.content_length);
        dst.put_u8(self.padding_length);
        dst.put_u8(0);
    }
}

/// Body of a BeginRequest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginRequest {
    pub role: Role,
    pub keep_conn: bool,
}

impl BeginRequest {
    pub fn parse(content: &[u8]) -> Result<Self, FcgiError> {
        let len = u16::try_from(content.len()).unwrap_or(u16::MAX);
        ensure!(len == BEGIN_REQUEST_BODY_LEN, FcgiError::InvalidBeginRequest(len));

        Ok(Self { role: Role::from(u16::from_be_bytes([content[0], content[1]])), keep_conn: content[2] & KEEP_CONN != 0 })
    }

    pub fn encode(&self, request_id: u16, dst: &mut BytesMut) {
        RecordHeader::new(RecordType::BeginRequest, request_id, BEGIN_REQUEST_BODY_LEN).encode(dst);
        dst.put_u16(self.role.into());
        dst.put_u8(if self.keep_conn { KEEP_CONN } else { 0 });
        dst.put_bytes(0, 5);
    }
}

/// `protocolStatus` of an EndRequest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStatus {
    RequestComplete = 0,
    CantMultiplexConn = 1,
    Overloaded = 2,
    UnknownRole = 3,
}

/// Appends a whole EndRequest record.
pub fn encode_end_request(request_id: u16, app_status: u32, protocol_status: ProtocolStatus, dst: &mut BytesMut) {
    RecordHeader::new(RecordType::EndRequest, request_id, 8).encode(dst);
    dst.put_u32(app_status);
    dst.put_u8(protocol_status as u8);
    dst.put_bytes(0, 3);
}

/// Appends `content` as a stream of records of at most [`MAX_CONTENT_LEN`] bytes.
///
/// Empty content writes nothing: a zero-length record would close the stream.
pub fn encode_stream(record_type: RecordType, request_id: u16, content: &[u8], dst: &mut BytesMut) {
    dst.reserve(content.len() + content.len().div_ceil(MAX_CONTENT_LEN) * HEADER_LEN);
    for chunk in content.chunks(MAX_CONTENT_LEN) {
        // chunks never exceed MAX_CONTENT_LEN
        let len = u16::try_from(chunk.len()).unwrap_or(u16::MAX);
        RecordHeader::new(record_type, request_id, len).encode(dst);
        dst.put_slice(chunk);
    }
}

/// Appends the zero-length record that terminates a stream.
pub fn encode_stream_end(record_type: RecordType, request_id: u16, dst: &mut BytesMut) {
    RecordHeader::new(record_type, request_id, 0).encode(dst);
}
