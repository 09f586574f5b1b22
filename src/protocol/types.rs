//! RESP2 value and error types

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// RESP2 value
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// `+OK\r\n`
    SimpleString(String),

    /// `-ERR message\r\n`
    Error(String),

    /// `:1000\r\n`
    Integer(i64),

    /// `$6\r\nfoobar\r\n`
    BulkString(Bytes),

    /// `$-1\r\n`
    Null,

    /// `*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n`
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// `+OK`
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(i: i64) -> Self {
        RespValue::Integer(i)
    }

    pub fn bulk_string(b: impl Into<Bytes>) -> Self {
        RespValue::BulkString(b.into())
    }

    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn array(v: Vec<RespValue>) -> Self {
        RespValue::Array(v)
    }

    /// Array of bulk strings
    pub fn bulk_array<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        RespValue::Array(items.into_iter().map(RespValue::bulk_string).collect())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    pub fn as_array(&self) -> Option<&Vec<RespValue>> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_bulk_string(&self) -> Option<&Bytes> {
        match self {
            RespValue::BulkString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Textual argument: bulk or simple string decoded as UTF-8
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::BulkString(bytes) => std::str::from_utf8(bytes).ok(),
            RespValue::SimpleString(s) => Some(s),
            _ => None,
        }
    }
}

/// redis-cli style rendering, used in logs
impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => f.write_str(s),
            RespValue::Error(e) => write!(f, "(error) {}", e),
            RespValue::Integer(i) => write!(f, "(integer) {}", i),
            RespValue::BulkString(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            RespValue::Null => f.write_str("(nil)"),
            RespValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// RESP parsing errors
///
/// Every variant is fatal for the connection: the stream position is lost.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RespError {
    #[error("invalid protocol: {0}")]
    InvalidProtocol(String),

    #[error("invalid UTF-8")]
    InvalidUtf8,

    #[error("invalid length or integer")]
    InvalidInteger,

    #[error("{0} exceeds the protocol limit")]
    TooLarge(&'static str),
}
