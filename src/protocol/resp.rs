//! RESP2 parser and encoder
//!
//! The parser walks the buffer with a cursor and only consumes bytes once a
//! whole value is available, so a partial frame costs one scan and leaves
//! the buffer untouched.

use super::types::{RespError, RespValue};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// Largest accepted bulk string
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Largest accepted multi-bulk element count
const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Longest accepted inline command line
const MAX_INLINE_LEN: usize = 64 * 1024;

/// Deepest accepted array nesting; requests are flat
const MAX_DEPTH: usize = 8;

fn is_type_prefix(byte: u8) -> bool {
    matches!(byte, b'+' | b'-' | b':' | b'$' | b'*')
}

/// RESP2 request parser
pub struct RespParser;

impl RespParser {
    /// Parse one value from the front of `buf`
    ///
    /// Returns `Ok(Some(value))` and consumes its bytes when a whole value
    /// is buffered, `Ok(None)` when more data is needed.
    ///
    /// Lines that do not start with a RESP type prefix are inline commands
    /// (`PING\r\n`, `GET key\n`) and parse as an array of bulk strings.
    /// Blank inline lines are skipped.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        loop {
            if buf.is_empty() {
                return Ok(None);
            }

            if !is_type_prefix(buf[0]) {
                match Self::parse_inline(buf)? {
                    Some((Some(value), end)) => {
                        buf.advance(end);
                        return Ok(Some(value));
                    }
                    // Blank line
                    Some((None, end)) => {
                        buf.advance(end);
                        continue;
                    }
                    None => return Ok(None),
                }
            }

            return match Self::parse_at(buf, 0, 0)? {
                Some((value, end)) => {
                    buf.advance(end);
                    Ok(Some(value))
                }
                None => Ok(None),
            };
        }
    }

    /// Parse the value starting at `pos`; returns it with the end offset
    fn parse_at(
        buf: &[u8],
        pos: usize,
        depth: usize,
    ) -> Result<Option<(RespValue, usize)>, RespError> {
        let Some((line, next)) = Self::line_at(buf, pos + 1) else {
            if buf.len() - pos > MAX_INLINE_LEN {
                return Err(RespError::TooLarge("line"));
            }
            return Ok(None);
        };

        let value = match buf[pos] {
            b'+' => RespValue::SimpleString(Self::text(line)?),
            b'-' => RespValue::Error(Self::text(line)?),
            b':' => RespValue::Integer(Self::integer(line)?),
            b'$' => {
                let len = Self::integer(line)?;
                if len == -1 {
                    return Ok(Some((RespValue::Null, next)));
                }
                let len = Self::length(len, MAX_BULK_LEN, "bulk length")?;
                let end = next + len;
                if buf.len() < end + 2 {
                    return Ok(None);
                }
                if &buf[end..end + 2] != CRLF {
                    return Err(RespError::InvalidProtocol(
                        "missing CRLF after bulk string data".to_string(),
                    ));
                }
                return Ok(Some((
                    RespValue::BulkString(Bytes::copy_from_slice(&buf[next..end])),
                    end + 2,
                )));
            }
            b'*' => {
                let count = Self::integer(line)?;
                if count == -1 {
                    return Ok(Some((RespValue::Null, next)));
                }
                let count = Self::length(count, MAX_ARRAY_LEN, "multibulk length")?;
                if depth >= MAX_DEPTH {
                    return Err(RespError::InvalidProtocol(
                        "multibulk nesting too deep".to_string(),
                    ));
                }

                let mut elements = Vec::with_capacity(count.min(64));
                let mut cursor = next;
                for _ in 0..count {
                    if cursor >= buf.len() {
                        return Ok(None);
                    }
                    match Self::parse_at(buf, cursor, depth + 1)? {
                        Some((value, end)) => {
                            elements.push(value);
                            cursor = end;
                        }
                        None => return Ok(None),
                    }
                }
                return Ok(Some((RespValue::Array(elements), cursor)));
            }
            other => {
                return Err(RespError::InvalidProtocol(format!(
                    "unknown type prefix '{}'",
                    other.escape_ascii()
                )))
            }
        };

        Ok(Some((value, next)))
    }

    /// Inline command terminated by `\n` (optionally `\r\n`)
    fn parse_inline(buf: &[u8]) -> Result<Option<(Option<RespValue>, usize)>, RespError> {
        let Some(newline) = buf.iter().position(|&b| b == b'\n') else {
            if buf.len() > MAX_INLINE_LEN {
                return Err(RespError::TooLarge("inline command"));
            }
            return Ok(None);
        };

        let line = buf[..newline].strip_suffix(b"\r").unwrap_or(&buf[..newline]);
        let args: Vec<RespValue> = line
            .split(|b| b.is_ascii_whitespace())
            .filter(|word| !word.is_empty())
            .map(|word| RespValue::BulkString(Bytes::copy_from_slice(word)))
            .collect();

        if args.is_empty() {
            return Ok(Some((None, newline + 1)));
        }
        Ok(Some((Some(RespValue::Array(args)), newline + 1)))
    }

    /// Line content starting at `start` and the offset after its CRLF
    fn line_at(buf: &[u8], start: usize) -> Option<(&[u8], usize)> {
        if start > buf.len() {
            return None;
        }
        buf[start..]
            .windows(2)
            .position(|w| w == CRLF)
            .map(|offset| (&buf[start..start + offset], start + offset + 2))
    }

    fn text(line: &[u8]) -> Result<String, RespError> {
        String::from_utf8(line.to_vec()).map_err(|_| RespError::InvalidUtf8)
    }

    fn integer(line: &[u8]) -> Result<i64, RespError> {
        std::str::from_utf8(line)
            .map_err(|_| RespError::InvalidUtf8)?
            .parse::<i64>()
            .map_err(|_| RespError::InvalidInteger)
    }

    fn length(value: i64, max: usize, what: &'static str) -> Result<usize, RespError> {
        let len = usize::try_from(value).map_err(|_| RespError::InvalidInteger)?;
        if len > max {
            return Err(RespError::TooLarge(what));
        }
        Ok(len)
    }
}

/// RESP2 reply encoder
pub struct RespEncoder;

impl RespEncoder {
    pub fn encode(value: &RespValue) -> Bytes {
        let mut buf = BytesMut::new();
        Self::encode_to(&mut buf, value);
        buf.freeze()
    }

    /// Append the encoding of `value` to `buf`
    pub fn encode_to(buf: &mut BytesMut, value: &RespValue) {
        match value {
            RespValue::SimpleString(s) => {
                buf.put_u8(b'+');
                Self::put_line(buf, s);
            }
            RespValue::Error(e) => {
                buf.put_u8(b'-');
                Self::put_line(buf, e);
            }
            RespValue::Integer(i) => {
                buf.put_u8(b':');
                buf.put_slice(i.to_string().as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::BulkString(bytes) => {
                buf.put_u8(b'$');
                buf.put_slice(bytes.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                buf.put_slice(bytes);
                buf.put_slice(CRLF);
            }
            RespValue::Null => {
                buf.put_slice(b"$-1\r\n");
            }
            RespValue::Array(arr) => {
                buf.put_u8(b'*');
                buf.put_slice(arr.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                for elem in arr {
                    Self::encode_to(buf, elem);
                }
            }
        }
    }

    /// Simple strings and errors cannot carry line breaks
    fn put_line(buf: &mut BytesMut, text: &str) {
        for b in text.bytes() {
            buf.put_u8(if b == b'\r' || b == b'\n' { b' ' } else { b });
        }
        buf.put_slice(CRLF);
    }
}
