//! Command dispatcher
//!
//! Validates incoming requests, routes them to their [`Command`] and bounds
//! each one by the optional request timeout. Shared by every connection.
//!
//! [`Command`]: crate::commands::Command

use crate::commands::{CommandContext, CommandRegistry, Reply};
use crate::protocol::RespValue;
use crate::pubsub::Broker;
use crate::store::Store;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Command dispatcher
pub struct Dispatcher {
    registry: CommandRegistry,
    store: Arc<dyn Store>,
    broker: Arc<Broker>,
    request_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, broker: Arc<Broker>) -> Self {
        Dispatcher {
            registry: CommandRegistry::new(),
            store,
            broker,
            request_timeout: None,
        }
    }

    /// Bound every command by `timeout`; zero disables the bound
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Fresh context for a new connection
    pub fn context(&self) -> CommandContext {
        CommandContext::new(self.store.clone(), self.broker.clone())
    }

    /// Dispatch one request
    ///
    /// `value` must be a non-empty array whose first element names the
    /// command.
    pub async fn dispatch(&self, ctx: &mut CommandContext, value: RespValue) -> Reply {
        let args = match value.as_array() {
            Some(arr) if !arr.is_empty() => arr,
            Some(_) => return RespValue::error("ERR empty command array").into(),
            None => return RespValue::error("ERR expected array").into(),
        };

        let cmd_name = match args[0].as_str() {
            Some(name) => name,
            None => return RespValue::error("ERR invalid command name").into(),
        };

        let command = match self.registry.get(cmd_name) {
            Some(cmd) => cmd,
            None => {
                warn!("Unknown command: {}", cmd_name);
                return RespValue::error(format!("ERR unknown command '{}'", cmd_name)).into();
            }
        };

        let cmd_args = &args[1..];
        let too_few = cmd_args.len() < command.min_args();
        let too_many = command.max_args().is_some_and(|max| cmd_args.len() > max);
        if too_few || too_many {
            return RespValue::error(format!(
                "ERR wrong number of arguments for '{}' command",
                cmd_name
            ))
            .into();
        }

        let dbnum = ctx.dbnum();
        let started = Instant::now();
        let reply = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, command.execute(ctx, cmd_args)).await {
                Ok(reply) => reply,
                Err(_) => {
                    warn!(cmd = cmd_name, dbnum, "request timed out");
                    RespValue::error("ERR request timed out").into()
                }
            },
            None => command.execute(ctx, cmd_args).await,
        };

        if let Reply::Value(value @ RespValue::Error(_)) = &reply {
            debug!(cmd = cmd_name, dbnum, reply = %value, "command failed");
        }
        debug!(
            cmd = cmd_name,
            args = cmd_args.len(),
            dbnum,
            elapsed = ?started.elapsed(),
            "command"
        );
        reply
    }
}
