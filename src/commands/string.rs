//! String commands (GET, MGET, SET, MSET)

use super::{bytes_arg, store_error, text_arg, wrong_arity, Command, CommandContext, Reply};
use crate::protocol::RespValue;
use async_trait::async_trait;
use tracing::error;

/// GET key
///
/// Missing keys answer null, any other store failure is an error.
pub struct GetCommand;

#[async_trait]
impl Command for GetCommand {
    async fn execute(&self, ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        let key = match text_arg(&args[0]) {
            Ok(key) => key,
            Err(e) => return e.into(),
        };

        Reply::Value(match ctx.store.get(ctx.dbnum(), key).await {
            Ok(value) => RespValue::bulk_string(value),
            Err(e) if e.is_missing() => RespValue::null(),
            Err(e) => store_error(&e),
        })
    }

    fn name(&self) -> &'static str {
        "GET"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// MGET key [key ...]
///
/// Degraded read: a key that fails for any reason answers null and the
/// failure is only logged.
pub struct MGetCommand;

#[async_trait]
impl Command for MGetCommand {
    async fn execute(&self, ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let Ok(key) = text_arg(arg) else {
                values.push(RespValue::null());
                continue;
            };
            match ctx.store.get(ctx.dbnum(), key).await {
                Ok(value) => values.push(RespValue::bulk_string(value)),
                Err(e) => {
                    if !e.is_missing() {
                        error!(dbnum = ctx.dbnum(), key, error = %e, "mget value");
                    }
                    values.push(RespValue::null());
                }
            }
        }
        RespValue::array(values).into()
    }

    fn name(&self) -> &'static str {
        "MGET"
    }

    fn min_args(&self) -> usize {
        1
    }
}

/// SET key value
pub struct SetCommand;

#[async_trait]
impl Command for SetCommand {
    async fn execute(&self, ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        let (key, value) = match (text_arg(&args[0]), bytes_arg(&args[1])) {
            (Ok(key), Ok(value)) => (key, value),
            (Err(e), _) | (_, Err(e)) => return e.into(),
        };

        Reply::Value(match ctx.store.set(ctx.dbnum(), key, value).await {
            Ok(()) => RespValue::ok(),
            Err(e) => store_error(&e),
        })
    }

    fn name(&self) -> &'static str {
        "SET"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// MSET key value [key value ...]
///
/// Pairs are written in order; the first failure stops the command.
pub struct MSetCommand;

#[async_trait]
impl Command for MSetCommand {
    async fn execute(&self, ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        if args.len() % 2 != 0 {
            return wrong_arity(self.name()).into();
        }

        for pair in args.chunks_exact(2) {
            let (key, value) = match (text_arg(&pair[0]), bytes_arg(&pair[1])) {
                (Ok(key), Ok(value)) => (key, value),
                (Err(e), _) | (_, Err(e)) => return e.into(),
            };
            if let Err(e) = ctx.store.set(ctx.dbnum(), key, value).await {
                return store_error(&e).into();
            }
        }
        RespValue::ok().into()
    }

    fn name(&self) -> &'static str {
        "MSET"
    }

    fn min_args(&self) -> usize {
        2
    }
}
