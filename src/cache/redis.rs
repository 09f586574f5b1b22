//! Networked cache on a Redis server (`redis://`, `redis+unix://`)
//!
//! Several gateway instances pointed at the same server share one cache.
//! The connection is owned by the root cache and dialled on first use;
//! prefixed views borrow it and never close it.

use super::{Cache, CacheOptions};
use crate::error::{Result, StoreError};
use ::redis::aio::ConnectionManager;
use ::redis::Client;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

struct Connection {
    client: Client,
    manager: Mutex<Option<ConnectionManager>>,
    closed: AtomicBool,
    ttl_secs: u64,
}

/// Cache entries stored as `SET key value EX ttl` on a Redis server
///
/// Reads refresh the entry lifetime.
#[derive(Clone)]
pub struct RedisCache {
    inner: Arc<Connection>,
    prefix: String,
    root: bool,
}

impl RedisCache {
    /// Cache on the server at `url`; nothing is dialled until the first call
    pub fn open(url: &str, options: CacheOptions) -> Result<Self> {
        let client = Client::open(url).map_err(StoreError::backend)?;
        Ok(RedisCache {
            inner: Arc::new(Connection {
                client,
                manager: Mutex::new(None),
                closed: AtomicBool::new(false),
                ttl_secs: options.ttl.as_secs().max(1),
            }),
            prefix: String::new(),
            root: true,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let mut manager = self.inner.manager.lock().await;
        if self.is_closed() {
            return Err(StoreError::backend("redis cache is closed"));
        }
        if let Some(conn) = manager.as_ref() {
            return Ok(conn.clone());
        }

        info!("connecting redis cache");
        let conn = ConnectionManager::new(self.inner.client.clone())
            .await
            .map_err(StoreError::backend)?;
        *manager = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl Cache for RedisCache {
    fn with_prefix(&self, prefix: &str) -> Arc<dyn Cache> {
        Arc::new(RedisCache {
            inner: self.inner.clone(),
            prefix: format!("{}{}", self.prefix, prefix),
            root: false,
        })
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = ::redis::cmd("GETEX")
            .arg(self.full_key(key))
            .arg("EX")
            .arg(self.inner.ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;
        value.map(Bytes::from).ok_or(StoreError::NotFound)
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        let mut conn = self.connection().await?;
        ::redis::cmd("SET")
            .arg(self.full_key(key))
            .arg(&value[..])
            .arg("EX")
            .arg(self.inner.ttl_secs)
            .query_async::<()>(&mut conn)
            .await
            .map_err(StoreError::backend)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let removed: i64 = ::redis::cmd("DEL")
            .arg(self.full_key(key))
            .query_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;
        if removed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.root {
            let mut manager = self.inner.manager.lock().await;
            self.inner.closed.store(true, Ordering::Release);
            manager.take();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn open() -> RedisCache {
        RedisCache::open("redis://127.0.0.1:6379/0", CacheOptions::default()).unwrap()
    }

    #[test]
    fn test_open_rejects_bad_url() {
        assert!(RedisCache::open("redis://localhost:notaport", CacheOptions::default()).is_err());
        assert!(RedisCache::open("http://localhost", CacheOptions::default()).is_err());
    }

    #[test]
    fn test_key_prefix_and_ttl() {
        let root = open();
        let view = RedisCache {
            prefix: "s0/".into(),
            root: false,
            ..root.clone()
        };
        assert_eq!(view.full_key("0:user_1"), "s0/0:user_1");
        assert_eq!(root.inner.ttl_secs, 60);

        let short = RedisCache::open(
            "redis+unix:///tmp/redis.sock",
            CacheOptions {
                size: 1,
                ttl: Duration::from_millis(10),
            },
        )
        .unwrap();
        assert_eq!(short.inner.ttl_secs, 1);
    }

    #[tokio::test]
    async fn test_view_close_keeps_connection() {
        let root = open();
        let view = root.with_prefix("s0/");

        view.close().await.unwrap();
        assert!(!root.is_closed());

        root.close().await.unwrap();
        assert!(root.is_closed());

        // A closed cache never dials again
        let err = view.get("k").await.err().unwrap();
        assert!(matches!(err, StoreError::Backend(ref msg) if msg == "redis cache is closed"));
        assert!(view.set("k", Bytes::from("v")).await.is_err());
    }
}
