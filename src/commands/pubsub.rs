//! Publish/subscribe commands (PUBLISH, SUBSCRIBE, PSUBSCRIBE, UNSUBSCRIBE,
//! PUNSUBSCRIBE)
//!
//! Subscribing hands the connection over to subscribe mode; the connection
//! then owns the subscription and answers further (un)subscribe requests
//! itself.

use super::{bytes_arg, text_arg, Command, CommandContext, Reply};
use crate::protocol::RespValue;
use crate::pubsub::Publisher;
use async_trait::async_trait;

fn topics(args: &[RespValue]) -> Result<Vec<String>, RespValue> {
    args.iter()
        .map(|arg| text_arg(arg).map(str::to_string))
        .collect()
}

/// PUBLISH channel message
pub struct PublishCommand;

#[async_trait]
impl Command for PublishCommand {
    async fn execute(&self, ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        let (channel, payload) = match (text_arg(&args[0]), bytes_arg(&args[1])) {
            (Ok(channel), Ok(payload)) => (channel, payload),
            (Err(e), _) | (_, Err(e)) => return e.into(),
        };
        let delivered = ctx.broker.publish(channel, payload);
        RespValue::integer(delivered as i64).into()
    }

    fn name(&self) -> &'static str {
        "PUBLISH"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// SUBSCRIBE channel [channel ...]
pub struct SubscribeCommand;

#[async_trait]
impl Command for SubscribeCommand {
    async fn execute(&self, _ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        match topics(args) {
            Ok(topics) => Reply::Subscribe {
                patterns: false,
                topics,
            },
            Err(e) => e.into(),
        }
    }

    fn name(&self) -> &'static str {
        "SUBSCRIBE"
    }

    fn min_args(&self) -> usize {
        1
    }
}

/// PSUBSCRIBE pattern [pattern ...]
pub struct PSubscribeCommand;

#[async_trait]
impl Command for PSubscribeCommand {
    async fn execute(&self, _ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        match topics(args) {
            Ok(topics) => Reply::Subscribe {
                patterns: true,
                topics,
            },
            Err(e) => e.into(),
        }
    }

    fn name(&self) -> &'static str {
        "PSUBSCRIBE"
    }

    fn min_args(&self) -> usize {
        1
    }
}

/// UNSUBSCRIBE [channel ...] and PUNSUBSCRIBE [pattern ...]
///
/// No topic means every topic of that kind.
pub struct UnsubscribeCommand {
    name: &'static str,
    patterns: bool,
}

impl UnsubscribeCommand {
    pub const CHANNELS: UnsubscribeCommand = UnsubscribeCommand {
        name: "UNSUBSCRIBE",
        patterns: false,
    };
    pub const PATTERNS: UnsubscribeCommand = UnsubscribeCommand {
        name: "PUNSUBSCRIBE",
        patterns: true,
    };
}

#[async_trait]
impl Command for UnsubscribeCommand {
    async fn execute(&self, _ctx: &mut CommandContext, args: &[RespValue]) -> Reply {
        match topics(args) {
            Ok(topics) => Reply::Unsubscribe {
                patterns: self.patterns,
                topics,
            },
            Err(e) => e.into(),
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::Broker;
    use crate::testing::MemoryStore;
    use bytes::Bytes;
    use std::sync::Arc;

    fn args(items: &[&str]) -> Vec<RespValue> {
        items.iter().map(|s| RespValue::bulk_string(s.to_string())).collect()
    }

    #[tokio::test]
    async fn test_publish_counts_receivers() {
        let broker = Arc::new(Broker::new());
        let mut ctx = CommandContext::new(Arc::new(MemoryStore::new()), broker.clone());

        let reply = PublishCommand.execute(&mut ctx, &args(&["news", "hi"])).await;
        assert_eq!(reply, Reply::Value(RespValue::integer(0)));

        let mut sub = broker.subscription();
        sub.subscribe("news");
        let reply = PublishCommand.execute(&mut ctx, &args(&["news", "hi"])).await;
        assert_eq!(reply, Reply::Value(RespValue::integer(1)));
        assert!(matches!(
            sub.recv().await,
            Some(crate::pubsub::Message::Message { payload, .. }) if payload == Bytes::from("hi")
        ));
    }

    #[tokio::test]
    async fn test_subscribe_switches_mode() {
        let mut ctx = CommandContext::new(Arc::new(MemoryStore::new()), Arc::new(Broker::new()));

        let reply = PSubscribeCommand.execute(&mut ctx, &args(&["news.*", "log.*"])).await;
        assert_eq!(
            reply,
            Reply::Subscribe {
                patterns: true,
                topics: vec!["news.*".to_string(), "log.*".to_string()],
            }
        );

        let reply = UnsubscribeCommand::CHANNELS.execute(&mut ctx, &[]).await;
        assert_eq!(
            reply,
            Reply::Unsubscribe {
                patterns: false,
                topics: Vec::new(),
            }
        );
    }
}
