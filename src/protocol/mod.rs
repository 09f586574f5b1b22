//! RESP2 wire protocol
//!
//! Parsing of client requests (multi-bulk and inline) and encoding of
//! replies. Independent from the store and command layers.

mod resp;
mod types;

pub use resp::{RespEncoder, RespParser};
pub use types::{RespError, RespValue};
