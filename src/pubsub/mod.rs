//! In-process publish/subscribe broker
//!
//! Decoupled from the stores: `PUBLISH` and the stream publisher store push
//! into the broker, subscribed connections drain their own queue.

use crate::protocol::RespValue;
use crate::store::glob;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Anything messages can be published to
pub trait Publisher: Send + Sync {
    /// Number of subscribers that received the message
    fn publish(&self, channel: &str, payload: Bytes) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Topic {
    Channel(String),
    Pattern(String),
}

struct Subscriber {
    id: u64,
    topic: Topic,
    sender: mpsc::UnboundedSender<Message>,
}

/// A delivered message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Message {
        channel: String,
        payload: Bytes,
    },
    PMessage {
        pattern: String,
        channel: String,
        payload: Bytes,
    },
}

impl Message {
    /// Push reply sent to a subscribed client
    pub fn into_resp(self) -> RespValue {
        match self {
            Message::Message { channel, payload } => RespValue::array(vec![
                RespValue::bulk_string("message"),
                RespValue::bulk_string(channel),
                RespValue::bulk_string(payload),
            ]),
            Message::PMessage {
                pattern,
                channel,
                payload,
            } => RespValue::array(vec![
                RespValue::bulk_string("pmessage"),
                RespValue::bulk_string(pattern),
                RespValue::bulk_string(channel),
                RespValue::bulk_string(payload),
            ]),
        }
    }
}

/// Channel and pattern subscriptions of every connection
#[derive(Default)]
pub struct Broker {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription handle; it owns no topic until subscribed
    pub fn subscription(self: &Arc<Self>) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        Subscription {
            broker: self.clone(),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            sender,
            receiver,
            channels: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// Number of registered topic subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    fn add(&self, id: u64, topic: Topic, sender: mpsc::UnboundedSender<Message>) {
        self.subscribers.write().push(Subscriber { id, topic, sender });
    }

    fn remove(&self, id: u64, topic: &Topic) {
        self.subscribers
            .write()
            .retain(|s| !(s.id == id && &s.topic == topic));
    }

    fn remove_all(&self, id: u64) {
        self.subscribers.write().retain(|s| s.id != id);
    }
}

impl Publisher for Broker {
    fn publish(&self, channel: &str, payload: Bytes) -> usize {
        let subscribers = self.subscribers.read();
        let mut delivered = 0;
        for subscriber in subscribers.iter() {
            let message = match &subscriber.topic {
                Topic::Channel(name) if name == channel => Message::Message {
                    channel: channel.to_string(),
                    payload: payload.clone(),
                },
                Topic::Pattern(pattern) if glob::matches(pattern, channel) => Message::PMessage {
                    pattern: pattern.clone(),
                    channel: channel.to_string(),
                    payload: payload.clone(),
                },
                _ => continue,
            };
            if subscriber.sender.send(message).is_ok() {
                delivered += 1;
            }
        }
        debug!(channel, delivered, "publish");
        delivered
    }
}

/// Per-connection subscription state
///
/// Dropping it removes every topic it registered.
pub struct Subscription {
    broker: Arc<Broker>,
    id: u64,
    sender: mpsc::UnboundedSender<Message>,
    receiver: mpsc::UnboundedReceiver<Message>,
    channels: Vec<String>,
    patterns: Vec<String>,
}

impl Subscription {
    /// Total channels plus patterns
    pub fn count(&self) -> usize {
        self.channels.len() + self.patterns.len()
    }

    pub fn subscribe(&mut self, channel: &str) -> usize {
        if !self.channels.iter().any(|c| c == channel) {
            self.channels.push(channel.to_string());
            self.broker
                .add(self.id, Topic::Channel(channel.to_string()), self.sender.clone());
        }
        self.count()
    }

    pub fn psubscribe(&mut self, pattern: &str) -> usize {
        if !self.patterns.iter().any(|p| p == pattern) {
            self.patterns.push(pattern.to_string());
            self.broker
                .add(self.id, Topic::Pattern(pattern.to_string()), self.sender.clone());
        }
        self.count()
    }

    pub fn unsubscribe(&mut self, channel: &str) -> usize {
        self.channels.retain(|c| c != channel);
        self.broker.remove(self.id, &Topic::Channel(channel.to_string()));
        self.count()
    }

    pub fn punsubscribe(&mut self, pattern: &str) -> usize {
        self.patterns.retain(|p| p != pattern);
        self.broker.remove(self.id, &Topic::Pattern(pattern.to_string()));
        self.count()
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Next delivered message
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.remove_all(self.id);
    }
}
