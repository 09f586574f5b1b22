//! Hash view over JSON records (HGET, HGETALL)
//!
//! A stored value that is a JSON object is exposed as a hash: string fields
//! are returned unescaped, any other field as its JSON text.

use super::{text_arg, Command, CommandContext, Reply};
use crate::protocol::RespValue;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::error;

fn field_value(value: &Value) -> RespValue {
    match value {
        Value::String(s) => RespValue::bulk_string(s.clone()),
        other => RespValue::bulk_string(other.to_string()),
    }
}

fn json_object(value: &[u8]) -> Option<Map<String, Value>> {
    if !value.starts_with(b"{") {
        return None;
    }
    serde_json::from_slice(value).ok()
}

/// Record behind `key`, or `None` when absent or unreadable
async fn fetch(ctx: &CommandContext, key: &str) -> Option<Bytes> {
    match ctx.store.get(ctx.dbnum(), key).await {
        Ok(value) => Some(value),
        Err(e) => {
            if !e.is_missing() {
                error!(dbnum = ctx.dbnum(), key, error = %e, "hash value");
            }
            None
        }
    }
}

/// HGET key field
pub struct HGetCommand;

#[async_trait]
impl Command for HGetCommand {
    async fn execute(&self, ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        let (key, field) = match (text_arg(&args[0]), text_arg(&args[1])) {
            (Ok(key), Ok(field)) => (key, field),
            (Err(e), _) | (_, Err(e)) => return e.into(),
        };

        let reply = fetch(ctx, key)
            .await
            .and_then(|value| json_object(&value))
            .and_then(|record| record.get(field).map(field_value))
            .unwrap_or(RespValue::Null);
        reply.into()
    }

    fn name(&self) -> &'static str {
        "HGET"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// HGETALL key
///
/// A value that is not a JSON object is returned as a plain bulk string,
/// one that looks like an object but fails to parse as a single-element
/// array.
pub struct HGetAllCommand;

#[async_trait]
impl Command for HGetAllCommand {
    async fn execute(&self, ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        let key = match text_arg(&args[0]) {
            Ok(key) => key,
            Err(e) => return e.into(),
        };

        let Some(value) = fetch(ctx, key).await else {
            return RespValue::null().into();
        };
        if !value.starts_with(b"{") {
            return RespValue::bulk_string(value).into();
        }

        let reply = match json_object(&value) {
            Some(record) => {
                let mut items = Vec::with_capacity(record.len() * 2);
                for (name, field) in &record {
                    items.push(RespValue::bulk_string(name.clone()));
                    items.push(field_value(field));
                }
                RespValue::array(items)
            }
            None => RespValue::array(vec![RespValue::bulk_string(value)]),
        };
        reply.into()
    }

    fn name(&self) -> &'static str {
        "HGETALL"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}
