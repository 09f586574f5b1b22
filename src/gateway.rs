//! Gateway assembly
//!
//! Turns the configured sources into the single store served by the RESP
//! server and the REST mirror.

use crate::cache::Cache;
use crate::config::SourceConfig;
use crate::error::{Result, StoreError};
use crate::multistore::MultiStore;
use crate::proxy::CacheProxy;
use crate::pubsub::Broker;
use crate::store::{ConnectContext, ConnectorRegistry, Store};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Connect and bind every source, then aggregate them
///
/// Each cacheable source gets its own view `s{index}/` of `cache`. A failed
/// connection or bind aborts the build and closes the sources opened so far.
pub async fn build(
    sources: &[SourceConfig],
    registry: &ConnectorRegistry,
    broker: Arc<Broker>,
    cache: Option<Arc<dyn Cache>>,
    shutdown: &CancellationToken,
) -> Result<Arc<MultiStore>> {
    let ctx = ConnectContext { broker };
    let mut stores: Vec<Arc<dyn Store>> = Vec::with_capacity(sources.len());

    for (idx, source) in sources.iter().enumerate() {
        let store = match connect_source(source, registry, &ctx).await {
            Ok(store) => store,
            Err(e) => {
                error!(source = idx, "failed to open source: {}", e);
                close_all(&stores).await;
                return Err(e);
            }
        };

        let channel = Some(source.notify_channel.as_str()).filter(|c| !c.is_empty());
        let view = cache.as_ref().map(|c| c.with_prefix(&format!("s{idx}/")));
        stores.push(CacheProxy::wrap(store, view, channel, shutdown));
        info!(source = idx, binds = source.binds.len(), "source ready");
    }

    Ok(Arc::new(MultiStore::new(stores)))
}

async fn connect_source(
    source: &SourceConfig,
    registry: &ConnectorRegistry,
    ctx: &ConnectContext,
) -> Result<Arc<dyn Store>> {
    let store = registry.connect_store(&source.connect, ctx).await?;
    for conf in &source.binds {
        if let Err(e) = store.bind(conf).await {
            if let Err(close_err) = store.close().await {
                error!("closing unbound source: {}", close_err);
            }
            return Err(e);
        }
    }
    Ok(store)
}

async fn close_all(stores: &[Arc<dyn Store>]) {
    let mut errors = Vec::new();
    for store in stores {
        if let Err(e) = store.close().await {
            errors.push(e);
        }
    }
    if let Err(e) = StoreError::combine(errors) {
        error!("closing sources: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheOptions, MemoryCache};
    use crate::store::{BindConfig, StoreConnector};
    use crate::testing::MemoryStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::Ordering;

    /// Hands out one prepared store
    struct FixedConnector(Arc<MemoryStore>);

    #[async_trait]
    impl StoreConnector for FixedConnector {
        async fn connect(&self, _url: &str, _ctx: &ConnectContext) -> Result<Arc<dyn Store>> {
            Ok(self.0.clone() as Arc<dyn Store>)
        }
    }

    fn source(connect: &str, key: &str) -> SourceConfig {
        SourceConfig {
            connect: connect.into(),
            notify_channel: String::new(),
            binds: vec![BindConfig::table(key, 0, "t")],
        }
    }

    #[tokio::test]
    async fn test_build_aggregates_sources() {
        let memory = Arc::new(MemoryStore::new());
        memory.insert(0, "user_1", "alice");

        let mut registry = ConnectorRegistry::with_defaults();
        registry.register_store("mem", Arc::new(FixedConnector(memory.clone())));

        let broker = Arc::new(Broker::new());
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(CacheOptions::default()));
        let sources = vec![source("pubsub://", "events"), source("mem://", "user_{{id}}")];
        let shutdown = CancellationToken::new();

        let store = build(&sources, &registry, broker.clone(), Some(cache.clone()), &shutdown)
            .await
            .unwrap();
        assert_eq!(store.len(), 2);

        assert_eq!(store.get(0, "user_1").await.unwrap(), Bytes::from("alice"));
        assert_eq!(store.get(0, "user_1").await.unwrap(), Bytes::from("alice"));
        assert_eq!(memory.gets.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("s1/0:user_1").await.unwrap(), Bytes::from("alice"));

        let mut sub = broker.subscription();
        sub.subscribe("events");
        store.set(0, "events", Bytes::from("ping")).await.unwrap();
        assert!(sub.recv().await.is_some());

        store.close().await.unwrap();
        assert!(memory.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_bind_failure_aborts() {
        let healthy = Arc::new(MemoryStore::new());
        let broken = Arc::new(MemoryStore::new().rejecting_binds());

        let mut registry = ConnectorRegistry::new();
        registry.register_store("ok", Arc::new(FixedConnector(healthy.clone())));
        registry.register_store("bad", Arc::new(FixedConnector(broken.clone())));

        let sources = vec![source("ok://", "a_{{id}}"), source("bad://", "b_{{id}}")];
        let err = build(
            &sources,
            &registry,
            Arc::new(Broker::new()),
            None,
            &CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();

        assert!(matches!(err, StoreError::InvalidBindConfig(_)));
        assert!(healthy.closed.load(Ordering::SeqCst));
        assert!(broken.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        let err = build(
            &[source("mongo://db", "k")],
            &ConnectorRegistry::with_defaults(),
            Arc::new(Broker::new()),
            None,
            &CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, StoreError::UnsupportedScheme(_)));
    }
}
