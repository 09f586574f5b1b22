//! Command execution module
//!
//! Every supported command implements [`Command`]; the dispatcher looks it
//! up in the [`CommandRegistry`] and enforces its arity before calling it.

mod admin;
mod context;
mod hash;
mod key;
mod pubsub;
mod registry;
mod string;

pub use context::{CommandContext, ConnectionState};
pub use registry::CommandRegistry;

use crate::error::StoreError;
use crate::protocol::RespValue;
use async_trait::async_trait;
use bytes::Bytes;

/// Outcome of a command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Send the value and keep serving the connection
    Value(RespValue),

    /// Send the value, then close the connection
    Close(RespValue),

    /// Switch the connection to subscribe mode on these topics
    Subscribe { patterns: bool, topics: Vec<String> },

    /// Drop topics (all of that kind when empty) from the subscription
    Unsubscribe { patterns: bool, topics: Vec<String> },
}

impl From<RespValue> for Reply {
    fn from(value: RespValue) -> Self {
        Reply::Value(value)
    }
}

/// Command execution trait
#[async_trait]
pub trait Command: Send + Sync {
    /// Run the command
    ///
    /// `args` excludes the command name. Arity is checked by the dispatcher
    /// against [`Command::min_args`] and [`Command::max_args`].
    async fn execute(&self, ctx: &mut CommandContext, args: &[RespValue]) -> Reply;

    fn name(&self) -> &'static str;

    fn min_args(&self) -> usize {
        0
    }

    /// `None` means unbounded
    fn max_args(&self) -> Option<usize> {
        None
    }
}

/// UTF-8 argument such as a key, a channel or a pattern
pub(crate) fn text_arg(value: &RespValue) -> Result<&str, RespValue> {
    value
        .as_str()
        .ok_or_else(|| RespValue::error("ERR invalid argument encoding"))
}

/// Binary argument such as a value to store
pub(crate) fn bytes_arg(value: &RespValue) -> Result<Bytes, RespValue> {
    match value {
        RespValue::BulkString(bytes) => Ok(bytes.clone()),
        RespValue::SimpleString(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
        _ => Err(RespValue::error("ERR expected bulk string")),
    }
}

/// Store failure as a protocol error
pub(crate) fn store_error(err: &StoreError) -> RespValue {
    RespValue::error(format!("ERR {}", err))
}

pub(crate) fn wrong_arity(name: &str) -> RespValue {
    RespValue::error(format!(
        "ERR wrong number of arguments for '{}' command",
        name
    ))
}
