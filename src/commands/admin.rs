//! Connection and compatibility commands (PING, QUIT, SELECT, CONFIG, CLIENT)

use super::{text_arg, Command, CommandContext, Reply};
use crate::protocol::RespValue;
use async_trait::async_trait;

/// Highest namespace accepted by SELECT
pub const MAX_DBNUM: i64 = 15;

/// PING [message]
pub struct PingCommand;

#[async_trait]
impl Command for PingCommand {
    async fn execute(&self, _ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        match args.first() {
            Some(message) => message.clone().into(),
            None => RespValue::simple_string("PONG").into(),
        }
    }

    fn name(&self) -> &'static str {
        "PING"
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// QUIT
pub struct QuitCommand;

#[async_trait]
impl Command for QuitCommand {
    async fn execute(&self, _ctx: &mut CommandContext, _args: &[RespValue]) -> Reply {
        Reply::Close(RespValue::ok())
    }

    fn name(&self) -> &'static str {
        "QUIT"
    }
}

/// SELECT index
pub struct SelectCommand;

#[async_trait]
impl Command for SelectCommand {
    async fn execute(&self, ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        let Some(index) = args[0].as_str().and_then(|s| s.parse::<i64>().ok()) else {
            return RespValue::error("ERR value is not an integer or out of range").into();
        };
        if !(0..=MAX_DBNUM).contains(&index) {
            return RespValue::error(format!(
                "ERR invalid database number {}, must be from 0 to {}",
                index, MAX_DBNUM
            ))
            .into();
        }

        ctx.state.dbnum = index as u32;
        RespValue::ok().into()
    }

    fn name(&self) -> &'static str {
        "SELECT"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// CONFIG GET parameter
///
/// Nothing is configurable over the wire; every parameter reads as empty
/// so clients probing the server keep working.
pub struct ConfigCommand;

#[async_trait]
impl Command for ConfigCommand {
    async fn execute(&self, _ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        let subcommand = match text_arg(&args[0]) {
            Ok(s) => s.to_uppercase(),
            Err(e) => return e.into(),
        };

        match subcommand.as_str() {
            "GET" if args.len() == 2 => {
                RespValue::array(vec![args[1].clone(), RespValue::bulk_string("")]).into()
            }
            "GET" => RespValue::error("ERR wrong number of arguments for 'config get'").into(),
            _ => RespValue::error(format!("ERR unknown subcommand '{}'", subcommand)).into(),
        }
    }

    fn name(&self) -> &'static str {
        "CONFIG"
    }

    fn min_args(&self) -> usize {
        1
    }
}

/// CLIENT SETNAME|GETNAME|SETINFO|ID
///
/// Client metadata is not tracked; the answers only keep client libraries
/// happy during their handshake.
pub struct ClientCommand;

#[async_trait]
impl Command for ClientCommand {
    async fn execute(&self, _ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        let subcommand = match text_arg(&args[0]) {
            Ok(s) => s.to_uppercase(),
            Err(e) => return e.into(),
        };

        let reply = match subcommand.as_str() {
            "SETNAME" if args.len() == 2 => RespValue::ok(),
            "SETNAME" => RespValue::error("ERR wrong number of arguments for 'client setname'"),
            "GETNAME" => RespValue::Null,
            "SETINFO" => RespValue::ok(),
            "ID" => RespValue::integer(1),
            _ => RespValue::error(format!("ERR unknown subcommand '{}'", subcommand)),
        };
        reply.into()
    }

    fn name(&self) -> &'static str {
        "CLIENT"
    }

    fn min_args(&self) -> usize {
        1
    }
}
