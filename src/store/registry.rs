//! URL scheme to backend constructor mapping
//!
//! Built once at startup and passed to whatever opens connections, so the
//! set of available backends is decided when the binary is assembled.

use super::{Store, StreamStore};
use crate::cache::{Cache, CacheOptions, LruCache, MemoryCache};
use crate::error::{Result, StoreError};
use crate::pubsub::Broker;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Shared services handed to store constructors
#[derive(Clone)]
pub struct ConnectContext {
    pub broker: Arc<Broker>,
}

/// Opens a store from a connection URL
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, url: &str, ctx: &ConnectContext) -> Result<Arc<dyn Store>>;
}

type CacheConstructor = fn(&str, CacheOptions) -> Result<Arc<dyn Cache>>;

/// Scheme-keyed store and cache constructors
#[derive(Default)]
pub struct ConnectorRegistry {
    stores: HashMap<String, Arc<dyn StoreConnector>>,
    caches: HashMap<String, CacheConstructor>,
}

impl ConnectorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every backend compiled into the binary
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "postgres")]
        {
            let postgres = Arc::new(super::postgres::PostgresConnector);
            for scheme in ["postgres", "postgresql", "pgx"] {
                registry.register_store(scheme, postgres.clone());
            }
        }

        registry.register_store("pubsub", Arc::new(StreamConnector));
        registry.register_cache("memory", memory_cache);
        registry.register_cache("lru", lru_cache);

        #[cfg(feature = "redis")]
        for scheme in ["redis", "redis+unix"] {
            registry.register_cache(scheme, redis_cache);
        }
        registry
    }

    pub fn register_store(&mut self, scheme: &str, connector: Arc<dyn StoreConnector>) {
        self.stores.insert(scheme.to_ascii_lowercase(), connector);
    }

    pub fn register_cache(&mut self, scheme: &str, constructor: CacheConstructor) {
        self.caches.insert(scheme.to_ascii_lowercase(), constructor);
    }

    pub fn has_store(&self, scheme: &str) -> bool {
        self.stores.contains_key(&scheme.to_ascii_lowercase())
    }

    pub async fn connect_store(&self, url: &str, ctx: &ConnectContext) -> Result<Arc<dyn Store>> {
        let scheme = scheme(url);
        let connector = self
            .stores
            .get(&scheme)
            .ok_or_else(|| StoreError::UnsupportedScheme(scheme.clone()))?;
        info!(scheme = %scheme, "connecting store");
        connector.connect(url, ctx).await
    }

    pub fn connect_cache(&self, url: &str, options: CacheOptions) -> Result<Arc<dyn Cache>> {
        let scheme = scheme(url);
        let constructor = self
            .caches
            .get(&scheme)
            .ok_or_else(|| StoreError::UnsupportedScheme(scheme.clone()))?;
        info!(scheme = %scheme, size = options.size, ttl = ?options.ttl, "opening cache");
        constructor(url, options)
    }
}

fn memory_cache(_url: &str, options: CacheOptions) -> Result<Arc<dyn Cache>> {
    Ok(Arc::new(MemoryCache::new(options)))
}

fn lru_cache(_url: &str, options: CacheOptions) -> Result<Arc<dyn Cache>> {
    Ok(Arc::new(LruCache::new(options)))
}

#[cfg(feature = "redis")]
fn redis_cache(url: &str, options: CacheOptions) -> Result<Arc<dyn Cache>> {
    Ok(Arc::new(crate::cache::RedisCache::open(url, options)?))
}

/// Scheme of a connection URL; a bare word is its own scheme
fn scheme(url: &str) -> String {
    url.split_once("://")
        .map_or(url, |(scheme, _)| scheme)
        .trim()
        .to_ascii_lowercase()
}

/// `pubsub://[channel]`
struct StreamConnector;

#[async_trait]
impl StoreConnector for StreamConnector {
    async fn connect(&self, url: &str, ctx: &ConnectContext) -> Result<Arc<dyn Store>> {
        let channel = url.split_once("://").map_or("", |(_, rest)| rest);
        Ok(Arc::new(StreamStore::new(
            ctx.broker.clone(),
            channel.trim_end_matches('/'),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn ctx() -> ConnectContext {
        ConnectContext {
            broker: Arc::new(Broker::new()),
        }
    }

    #[test]
    fn test_scheme() {
        assert_eq!(scheme("postgres://u:p@host/db"), "postgres");
        assert_eq!(scheme("PubSub://events"), "pubsub");
        assert_eq!(scheme("memory"), "memory");
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        let registry = ConnectorRegistry::with_defaults();
        let err = registry.connect_store("mongo://x", &ctx()).await.err().unwrap();
        assert!(matches!(err, StoreError::UnsupportedScheme(s) if s == "mongo"));

        let err = registry
            .connect_cache("memcached://x", CacheOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn test_default_connectors() {
        let registry = ConnectorRegistry::with_defaults();
        assert_eq!(registry.has_store("pgx"), cfg!(feature = "postgres"));

        let store = registry.connect_store("pubsub://events", &ctx()).await.unwrap();
        assert!(!store.supports_cache());

        for url in ["memory", "lru"] {
            let cache = registry.connect_cache(url, CacheOptions::default()).unwrap();
            cache.set("k", Bytes::from("v")).await.unwrap();
            assert_eq!(cache.get("k").await.unwrap(), Bytes::from("v"));
        }

        // Opening does not dial the server
        let redis = registry.connect_cache("redis://127.0.0.1:6379/2", CacheOptions::default());
        assert_eq!(redis.is_ok(), cfg!(feature = "redis"));
    }
}
