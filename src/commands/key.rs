//! Key commands (DEL, KEYS)

use super::{store_error, text_arg, Command, CommandContext, Reply};
use crate::protocol::RespValue;
use async_trait::async_trait;

/// DEL key [key ...]
///
/// Answers the number of deleted keys; absent keys count as zero, any
/// other failure aborts with an error.
pub struct DelCommand;

#[async_trait]
impl Command for DelCommand {
    async fn execute(&self, ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        let mut deleted = 0;
        for arg in args {
            let key = match text_arg(arg) {
                Ok(key) => key,
                Err(e) => return e.into(),
            };
            match ctx.store.del(ctx.dbnum(), key).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_missing() => {}
                Err(e) => return store_error(&e).into(),
            }
        }
        RespValue::integer(deleted).into()
    }

    fn name(&self) -> &'static str {
        "DEL"
    }

    fn min_args(&self) -> usize {
        1
    }
}

/// KEYS pattern
pub struct KeysCommand;

#[async_trait]
impl Command for KeysCommand {
    async fn execute(&self, ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        let pattern = match text_arg(&args[0]) {
            Ok(pattern) => pattern,
            Err(e) => return e.into(),
        };

        let reply = match ctx.store.keys(ctx.dbnum(), pattern).await {
            Ok(keys) => RespValue::bulk_array(keys),
            Err(e) if e.is_missing() => RespValue::array(Vec::new()),
            Err(e) => store_error(&e),
        };
        reply.into()
    }

    fn name(&self) -> &'static str {
        "KEYS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}
