//! Connection handling
//!
//! Reads requests from one client, dispatches them in arrival order and
//! writes the replies. A subscribe request switches the connection to
//! subscribe mode, where published messages are pushed as they arrive.

use crate::commands::{CommandContext, Reply};
use crate::dispatch::Dispatcher;
use crate::protocol::{RespEncoder, RespParser, RespValue};
use crate::pubsub::Subscription;
use anyhow::{bail, Result};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Commands accepted while subscribed
const SUBSCRIBED_COMMANDS: [&str; 6] = [
    "SUBSCRIBE",
    "PSUBSCRIBE",
    "UNSUBSCRIBE",
    "PUNSUBSCRIBE",
    "PING",
    "QUIT",
];

/// Whether the connection stays open after a step
enum Flow {
    Continue,
    Close,
}

/// Connection handler
pub struct Connection<S> {
    stream: S,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Connection {
            stream,
            read_buffer: BytesMut::with_capacity(4096),
            write_buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Serve the client until it disconnects, sends QUIT or `shutdown` fires
    pub async fn handle(&mut self, dispatcher: &Dispatcher, shutdown: &CancellationToken) -> Result<()> {
        let mut ctx = dispatcher.context();

        loop {
            while let Some(request) = self.next_request().await? {
                let reply = tokio::select! {
                    _ = shutdown.cancelled() => return self.flush().await,
                    reply = dispatcher.dispatch(&mut ctx, request) => reply,
                };

                let flow = match reply {
                    Reply::Value(value) => {
                        self.queue(&value);
                        Flow::Continue
                    }
                    Reply::Close(value) => {
                        self.queue(&value);
                        Flow::Close
                    }
                    Reply::Subscribe { patterns, topics } => {
                        self.flush().await?;
                        self.subscribed(dispatcher, &mut ctx, patterns, topics, shutdown)
                            .await?
                    }
                    Reply::Unsubscribe { patterns, topics } => {
                        self.queue_unsubscribe(None, patterns, &topics);
                        Flow::Continue
                    }
                };
                if let Flow::Close = flow {
                    return self.flush().await;
                }
            }
            self.flush().await?;

            let n = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                n = self.stream.read_buf(&mut self.read_buffer) => n?,
            };
            if n == 0 {
                if self.read_buffer.is_empty() {
                    return Ok(());
                }
                bail!("connection reset by peer");
            }
            debug!("Read {} bytes", n);
        }
    }

    /// Subscribe mode; returns to normal mode once every topic is dropped
    async fn subscribed(
        &mut self,
        dispatcher: &Dispatcher,
        ctx: &mut CommandContext,
        patterns: bool,
        topics: Vec<String>,
        shutdown: &CancellationToken,
    ) -> Result<Flow> {
        let mut subscription = dispatcher.broker().subscription();
        self.queue_subscribe(&mut subscription, patterns, &topics);
        self.flush().await?;

        loop {
            while let Some(request) = self.next_request().await? {
                if let Flow::Close = self
                    .subscribed_request(dispatcher, ctx, &mut subscription, request)
                    .await
                {
                    return Ok(Flow::Close);
                }
            }
            self.flush().await?;
            if subscription.count() == 0 {
                return Ok(Flow::Continue);
            }

            tokio::select! {
                _ = shutdown.cancelled() => return Ok(Flow::Close),
                message = subscription.recv() => {
                    if let Some(message) = message {
                        self.queue(&message.into_resp());
                        self.flush().await?;
                    }
                }
                n = self.stream.read_buf(&mut self.read_buffer) => {
                    if n? == 0 {
                        return Ok(Flow::Close);
                    }
                }
            }
        }
    }

    async fn subscribed_request(
        &mut self,
        dispatcher: &Dispatcher,
        ctx: &mut CommandContext,
        subscription: &mut Subscription,
        request: RespValue,
    ) -> Flow {
        let name = request
            .as_array()
            .and_then(|args| args.first())
            .and_then(RespValue::as_str)
            .map(str::to_uppercase)
            .unwrap_or_default();
        if !SUBSCRIBED_COMMANDS.contains(&name.as_str()) {
            self.queue(&RespValue::error(format!(
                "ERR Can't execute '{}': only (P)SUBSCRIBE / (P)UNSUBSCRIBE / PING / QUIT are allowed in this context",
                name.to_lowercase()
            )));
            return Flow::Continue;
        }

        match dispatcher.dispatch(ctx, request).await {
            Reply::Value(value) => self.queue(&value),
            Reply::Close(value) => {
                self.queue(&value);
                return Flow::Close;
            }
            Reply::Subscribe { patterns, topics } => {
                self.queue_subscribe(subscription, patterns, &topics)
            }
            Reply::Unsubscribe { patterns, topics } => {
                self.queue_unsubscribe(Some(subscription), patterns, &topics)
            }
        }
        Flow::Continue
    }

    fn queue_subscribe(&mut self, subscription: &mut Subscription, patterns: bool, topics: &[String]) {
        let kind = if patterns { "psubscribe" } else { "subscribe" };
        for topic in topics {
            let count = if patterns {
                subscription.psubscribe(topic)
            } else {
                subscription.subscribe(topic)
            };
            self.queue(&confirmation(kind, Some(topic), count));
        }
    }

    fn queue_unsubscribe(&mut self, subscription: Option<&mut Subscription>, patterns: bool, topics: &[String]) {
        let kind = if patterns { "punsubscribe" } else { "unsubscribe" };
        let Some(subscription) = subscription else {
            if topics.is_empty() {
                self.queue(&confirmation(kind, None, 0));
            }
            for topic in topics {
                self.queue(&confirmation(kind, Some(topic), 0));
            }
            return;
        };

        let topics = match (topics.is_empty(), patterns) {
            (false, _) => topics.to_vec(),
            (true, false) => subscription.channels().to_vec(),
            (true, true) => subscription.patterns().to_vec(),
        };
        if topics.is_empty() {
            self.queue(&confirmation(kind, None, subscription.count()));
        }
        for topic in &topics {
            let count = if patterns {
                subscription.punsubscribe(topic)
            } else {
                subscription.unsubscribe(topic)
            };
            self.queue(&confirmation(kind, Some(topic), count));
        }
    }

    /// Next complete request already buffered
    ///
    /// A malformed stream is answered with a protocol error, then the
    /// connection is dropped.
    async fn next_request(&mut self) -> Result<Option<RespValue>> {
        match RespParser::parse(&mut self.read_buffer) {
            Ok(request) => Ok(request),
            Err(e) => {
                warn!("Protocol error: {}", e);
                self.queue(&RespValue::error(format!("ERR Protocol error: {}", e)));
                self.flush().await?;
                Err(e.into())
            }
        }
    }

    fn queue(&mut self, value: &RespValue) {
        RespEncoder::encode_to(&mut self.write_buffer, value);
    }

    async fn flush(&mut self) -> Result<()> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }
        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;
        self.write_buffer.clear();
        Ok(())
    }
}

fn confirmation(kind: &str, topic: Option<&String>, count: usize) -> RespValue {
    RespValue::array(vec![
        RespValue::bulk_string(kind.to_string()),
        topic.map_or(RespValue::Null, |t| RespValue::bulk_string(t.clone())),
        RespValue::integer(count as i64),
    ])
}
