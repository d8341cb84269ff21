//! FastCGI name-value pairs, as carried by the Params stream.
//!
//! Each length is one byte when below 128, otherwise four bytes big-endian
//! with the top bit set. A pair may be split across any number of records,
//! so the decoder keeps undecoded bytes until the rest arrives.

use bytes::{Buf, BufMut, BytesMut};

use crate::ensure;
use crate::protocol::FcgiError;

const LONG_LENGTH_FLAG: u8 = 0x80;

#[derive(Debug)]
pub struct ParamsDecoder {
    pending: BytesMut,
    total: usize,
    max_bytes: usize,
}

impl ParamsDecoder {
    pub fn new(max_bytes: usize) -> Self {
        Self { pending: BytesMut::new(), total: 0, max_bytes }
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.total = 0;
    }

    /// Decodes every complete pair in `pending + content`, calling `on_pair`
    /// for each one in stream order.
    pub fn feed<F>(&mut self, content: &[u8], mut on_pair: F) -> Result<(), FcgiError>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), FcgiError>,
    {
        self.total += content.len();
        ensure!(self.total <= self.max_bytes, FcgiError::TooLarge { what: "params", max_size: self.max_bytes });

        self.pending.extend_from_slice(content);

        while let Some((name_len, value_len, prefix_len)) = read_pair_lengths(&self.pending)? {
            if self.pending.len() < prefix_len + name_len + value_len {
                break;
            }

            self.pending.advance(prefix_len);
            let pair = self.pending.split_to(name_len + value_len);
            let (name, value) = pair.split_at(name_len);
            on_pair(name, value)?;
        }

        Ok(())
    }

    /// Checks that the stream ended on a pair boundary.
    pub fn finish(&mut self) -> Result<(), FcgiError> {
        ensure!(
            self.pending.is_empty(),
            FcgiError::malformed_params(format!("{} bytes of a truncated pair at end of stream", self.pending.len()))
        );
        Ok(())
    }
}

/// Returns `(name_len, value_len, prefix_len)` once both lengths are available.
fn read_pair_lengths(src: &[u8]) -> Result<Option<(usize, usize, usize)>, FcgiError> {
    let Some((name_len, name_prefix)) = read_length(src)? else {
        return Ok(None);
    };
    let Some((value_len, value_prefix)) = read_length(&src[name_prefix..])? else {
        return Ok(None);
    };
    Ok(Some((name_len, value_len, name_prefix + value_prefix)))
}

fn read_length(src: &[u8]) -> Result<Option<(usize, usize)>, FcgiError> {
    let Some(&first) = src.first() else {
        return Ok(None);
    };

    if first & LONG_LENGTH_FLAG == 0 {
        return Ok(Some((usize::from(first), 1)));
    }

    let Some(bytes) = src.get(..4) else {
        return Ok(None);
    };
    let len = u32::from_be_bytes([first & !LONG_LENGTH_FLAG, bytes[1], bytes[2], bytes[3]]);
    let len = usize::try_from(len).map_err(|_e| FcgiError::malformed_params(format!("length {len} too large")))?;
    Ok(Some((len, 4)))
}

/// Appends one encoded pair.
pub fn encode_pair(name: &[u8], value: &[u8], dst: &mut BytesMut) {
    dst.reserve(8 + name.len() + value.len());
    put_length(name.len(), dst);
    put_length(value.len(), dst);
    dst.put_slice(name);
    dst.put_slice(value);
}

fn put_length(len: usize, dst: &mut BytesMut) {
    match u8::try_from(len) {
        Ok(short) if short & LONG_LENGTH_FLAG == 0 => dst.put_u8(short),
        _ => dst.put_u32(u32::try_from(len).unwrap_or(u32::MAX) | 0x8000_0000),
    }
}

/// Maps a CGI variable name to the request header it stands for.
///
/// `HTTP_ACCEPT_ENCODING` becomes `Accept-Encoding`; `CONTENT_LENGTH` and
/// `CONTENT_TYPE` map to their headers. Every other name has no header.
pub fn cgi_header_name(name: &str) -> Option<String> {
    match name {
        "CONTENT_LENGTH" => Some("Content-Length".to_string()),
        "CONTENT_TYPE" => Some("Content-Type".to_string()),
        _ => name.strip_prefix("HTTP_").filter(|rest| !rest.is_empty()).map(canonical_header_name),
    }
}

fn canonical_header_name(cgi_name: &str) -> String {
    cgi_name
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(decoder: &mut ParamsDecoder, content: &[u8], pairs: &mut Vec<(String, String)>) -> Result<(), FcgiError> {
        decoder.feed(content, |name, value| {
            pairs.push((String::from_utf8_lossy(name).into_owned(), String::from_utf8_lossy(value).into_owned()));
            Ok(())
        })
    }

    #[test]
    fn short_and_long_lengths() {
        let long_value = "v".repeat(300);
        let mut buf = BytesMut::new();
        encode_pair(b"SCRIPT_NAME", b"/index", &mut buf);
        encode_pair(b"HTTP_COOKIE", long_value.as_bytes(), &mut buf);
        encode_pair(b"EMPTY", b"", &mut buf);

        // name length 11 then the long form of 300
        assert_eq!(&buf[..2], &[11, 6]);
        let long_start = 2 + 11 + 6;
        assert_eq!(&buf[long_start..long_start + 5], &[11, 0x80, 0, 1, 44]);

        let mut decoder = ParamsDecoder::new(usize::MAX);
        let mut pairs = vec![];
        collect(&mut decoder, &buf, &mut pairs).unwrap();
        decoder.finish().unwrap();

        assert_eq!(
            pairs,
            vec![
                ("SCRIPT_NAME".to_string(), "/index".to_string()),
                ("HTTP_COOKIE".to_string(), long_value),
                ("EMPTY".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn pairs_split_across_records() {
        let mut buf = BytesMut::new();
        encode_pair(b"REQUEST_METHOD", b"GET", &mut buf);
        encode_pair(b"QUERY_STRING", "q".repeat(200).as_bytes(), &mut buf);

        for at in 0..=buf.len() {
            let mut decoder = ParamsDecoder::new(usize::MAX);
            let mut pairs = vec![];
            collect(&mut decoder, &buf[..at], &mut pairs).unwrap();
            collect(&mut decoder, &buf[at..], &mut pairs).unwrap();
            decoder.finish().unwrap();

            assert_eq!(pairs.len(), 2, "split at {at}");
            assert_eq!(pairs[0].1, "GET");
            assert_eq!(pairs[1].1.len(), 200);
        }
    }

    #[test]
    fn truncated_pair_is_malformed() {
        let mut decoder = ParamsDecoder::new(usize::MAX);
        let mut pairs = vec![];
        collect(&mut decoder, &[0x80, 0, 0], &mut pairs).unwrap();
        assert!(pairs.is_empty());
        assert!(matches!(decoder.finish(), Err(FcgiError::MalformedParams { .. })));

        decoder.reset();
        collect(&mut decoder, &[4, 1, b'N', b'A'], &mut pairs).unwrap();
        assert!(matches!(decoder.finish(), Err(FcgiError::MalformedParams { .. })));
    }

    #[test]
    fn params_limit() {
        let mut decoder = ParamsDecoder::new(4);
        let mut pairs = vec![];
        assert!(matches!(
            collect(&mut decoder, &[1, 1, b'a', b'b', 1], &mut pairs),
            Err(FcgiError::TooLarge { what: "params", max_size: 4 })
        ));
    }

    #[test]
    fn cgi_names() {
        assert_eq!(cgi_header_name("HTTP_HOST").as_deref(), Some("Host"));
        assert_eq!(cgi_header_name("HTTP_ACCEPT_ENCODING").as_deref(), Some("Accept-Encoding"));
        assert_eq!(cgi_header_name("HTTP_X_FORWARDED_FOR").as_deref(), Some("X-Forwarded-For"));
        assert_eq!(cgi_header_name("CONTENT_LENGTH").as_deref(), Some("Content-Length"));
        assert_eq!(cgi_header_name("CONTENT_TYPE").as_deref(), Some("Content-Type"));
        assert_eq!(cgi_header_name("HTTP_"), None);
        assert_eq!(cgi_header_name("SCRIPT_FILENAME"), None);
    }
}
