//! Cache-aside proxy in front of a store
//!
//! Reads are served from the cache when possible and populated on a miss,
//! writes go through to the store first. When the wrapped store reports
//! committed changes, a background task evicts the affected keys.

use crate::cache::Cache;
use crate::error::{Result, StoreError};
use crate::record::Record;
use crate::store::{BindConfig, ChangeEvent, ChangeNotifier, Store};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EVENT_BUFFER: usize = 256;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Store wrapper keeping a cache in sync with reads and writes
pub struct CacheProxy {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    cancel: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl CacheProxy {
    /// Wrap `store` with `cache`
    ///
    /// Without a cache, or for a store that must not be cached, the store
    /// itself is returned. With a non-empty `channel` and a store exposing
    /// change notifications, an invalidation listener runs until `shutdown`
    /// is cancelled or the proxy is closed.
    pub fn wrap(
        store: Arc<dyn Store>,
        cache: Option<Arc<dyn Cache>>,
        channel: Option<&str>,
        shutdown: &CancellationToken,
    ) -> Arc<dyn Store> {
        let cache = match cache {
            Some(cache) if store.supports_cache() => cache,
            _ => return store,
        };

        let cancel = shutdown.child_token();
        let listener = match channel.filter(|c| !c.is_empty()) {
            Some(channel) if store.change_notifier().is_some() => Some(tokio::spawn(watch(
                store.clone(),
                cache.clone(),
                channel.to_string(),
                cancel.clone(),
            ))),
            _ => None,
        };

        Arc::new(CacheProxy {
            store,
            cache,
            cancel,
            listener: Mutex::new(listener),
        })
    }
}

fn cache_key(dbnum: u32, key: &str) -> String {
    format!("{dbnum}:{key}")
}

#[async_trait]
impl Store for CacheProxy {
    async fn get(&self, dbnum: u32, key: &str) -> Result<Bytes> {
        let cached = cache_key(dbnum, key);
        match self.cache.get(&cached).await {
            Ok(value) => {
                debug!(dbnum, key, "get value from cache");
                return Ok(value);
            }
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let value = self.store.get(dbnum, key).await?;
        debug!(dbnum, key, "get value from store");
        self.cache.set(&cached, value.clone()).await?;
        Ok(value)
    }

    async fn set(&self, dbnum: u32, key: &str, value: Bytes) -> Result<()> {
        self.store.set(dbnum, key, value.clone()).await?;
        if let Err(e) = self.cache.set(&cache_key(dbnum, key), value).await {
            warn!(dbnum, key, error = %e, "cache set");
        }
        Ok(())
    }

    async fn del(&self, dbnum: u32, key: &str) -> Result<()> {
        let mut errors = Vec::new();
        match self.cache.del(&cache_key(dbnum, key)).await {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(e) => errors.push(e),
        }
        if let Err(e) = self.store.del(dbnum, key).await {
            errors.push(e);
        }
        StoreError::combine(errors)
    }

    async fn keys(&self, dbnum: u32, pattern: &str) -> Result<Vec<String>> {
        self.store.keys(dbnum, pattern).await
    }

    async fn list(&self, dbnum: u32, pattern: &str) -> Result<Vec<Record>> {
        self.store.list(dbnum, pattern).await
    }

    async fn bind(&self, conf: &BindConfig) -> Result<()> {
        self.store.bind(conf).await
    }

    async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            let _ = listener.await;
        }

        let mut errors = Vec::new();
        if let Err(e) = self.cache.close().await {
            errors.push(e);
        }
        if let Err(e) = self.store.close().await {
            errors.push(e);
        }
        StoreError::combine(errors)
    }

    fn supports_cache(&self) -> bool {
        false
    }

    fn change_notifier(&self) -> Option<&dyn ChangeNotifier> {
        self.store.change_notifier()
    }
}

impl Drop for CacheProxy {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Keep a change subscription alive, reconnecting with backoff
async fn watch(store: Arc<dyn Store>, cache: Arc<dyn Cache>, channel: String, cancel: CancellationToken) {
    let Some(notifier) = store.change_notifier() else {
        return;
    };
    let mut backoff = INITIAL_BACKOFF;

    loop {
        info!(channel = %channel, "run notify listener");
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return,
            (result, ()) = async {
                tokio::join!(
                    notifier.listen_updates(&channel, events_tx),
                    invalidate_from(notifier, cache.as_ref(), events_rx),
                )
            } => result,
        };

        match outcome {
            Ok(()) => {
                info!(channel = %channel, "notify listener stopped");
                return;
            }
            Err(e) => {
                error!(channel = %channel, error = %e, retry_in = ?backoff, "notification updates listener");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Evict the key of every received change event until the sender is gone
pub async fn invalidate_from(
    notifier: &dyn ChangeNotifier,
    cache: &dyn Cache,
    mut events: mpsc::Receiver<ChangeEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some((dbnum, key)) = notifier.resolve_key(&event) else {
            debug!(table = %event.table, "no binding for change event");
            continue;
        };
        match cache.del(&cache_key(dbnum, &key)).await {
            Ok(()) => debug!(dbnum, key = %key, "clear key cache"),
            Err(e) if e.is_missing() => {}
            Err(e) => error!(dbnum, key = %key, error = %e, "clear key cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheOptions, MemoryCache};
    use crate::pattern::ExecContext;
    use crate::testing::{FailingCache, MemoryStore};
    use std::sync::atomic::Ordering;

    fn cache() -> Arc<MemoryCache> {
        Arc::new(MemoryCache::new(CacheOptions::default()))
    }

    fn proxy(store: Arc<MemoryStore>, cache: Arc<MemoryCache>) -> Arc<dyn Store> {
        CacheProxy::wrap(store, Some(cache as Arc<dyn Cache>), None, &CancellationToken::new())
    }

    fn event(key: &str) -> ChangeEvent {
        ChangeEvent {
            table: "items".to_string(),
            fields: [("key", key)].into_iter().collect::<ExecContext>(),
        }
    }

    #[tokio::test]
    async fn test_without_cache_returns_store() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let wrapped = CacheProxy::wrap(store.clone(), None, None, &CancellationToken::new());
        assert!(Arc::ptr_eq(&store, &wrapped));

        let uncacheable: Arc<dyn Store> = Arc::new(MemoryStore::new().uncacheable());
        let cache: Arc<dyn Cache> = cache();
        let wrapped = CacheProxy::wrap(uncacheable.clone(), Some(cache), None, &CancellationToken::new());
        assert!(Arc::ptr_eq(&uncacheable, &wrapped));
    }

    #[tokio::test]
    async fn test_get_hit_skips_store() {
        let store = Arc::new(MemoryStore::new());
        store.insert(0, "a", "1");
        let cache = cache();
        let proxy = proxy(store.clone(), cache.clone());

        assert_eq!(proxy.get(0, "a").await.unwrap(), Bytes::from("1"));
        assert_eq!(proxy.get(0, "a").await.unwrap(), Bytes::from("1"));
        assert_eq!(store.gets.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("0:a").await.unwrap(), Bytes::from("1"));
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache();
        let proxy = proxy(store.clone(), cache.clone());

        assert!(matches!(proxy.get(0, "a").await, Err(StoreError::NotFound)));
        assert!(cache.is_empty());

        store.insert(0, "a", "late");
        assert_eq!(proxy.get(0, "a").await.unwrap(), Bytes::from("late"));
    }

    #[tokio::test]
    async fn test_namespaces_are_cached_apart() {
        let store = Arc::new(MemoryStore::new());
        store.insert(0, "a", "zero");
        store.insert(1, "a", "one");
        let proxy = proxy(store, cache());

        assert_eq!(proxy.get(0, "a").await.unwrap(), Bytes::from("zero"));
        assert_eq!(proxy.get(1, "a").await.unwrap(), Bytes::from("one"));
    }

    #[tokio::test]
    async fn test_set_writes_through() {
        let store = Arc::new(MemoryStore::with_prefix("user_"));
        let cache = cache();
        let proxy = proxy(store.clone(), cache.clone());

        proxy.set(0, "user_1", Bytes::from("v")).await.unwrap();
        assert!(store.contains(0, "user_1"));
        assert_eq!(cache.get("0:user_1").await.unwrap(), Bytes::from("v"));

        assert!(matches!(
            proxy.set(0, "other", Bytes::from("v")).await,
            Err(StoreError::NoKey)
        ));
        assert!(cache.get("0:other").await.is_err());
    }

    #[tokio::test]
    async fn test_del_evicts_and_deletes() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache();
        let proxy = proxy(store.clone(), cache.clone());

        proxy.set(0, "a", Bytes::from("v")).await.unwrap();
        proxy.del(0, "a").await.unwrap();
        assert!(!store.contains(0, "a"));
        assert!(cache.get("0:a").await.is_err());

        // Cache miss does not hide the store outcome
        assert!(matches!(proxy.del(0, "a").await, Err(StoreError::NotFound)));
        assert_eq!(store.dels.load(Ordering::SeqCst), 2);
    }

    fn broken(store: Arc<MemoryStore>) -> Arc<dyn Store> {
        let cache: Arc<dyn Cache> = Arc::new(FailingCache);
        CacheProxy::wrap(store, Some(cache), None, &CancellationToken::new())
    }

    #[tokio::test]
    async fn test_get_surfaces_cache_failure() {
        let store = Arc::new(MemoryStore::new());
        store.insert(0, "a", "1");
        let proxy = broken(store.clone());

        let err = proxy.get(0, "a").await.err().unwrap();
        assert!(matches!(err, StoreError::Backend(ref msg) if msg == "cache unavailable"));
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_set_ignores_cache_failure() {
        let store = Arc::new(MemoryStore::new());
        let proxy = broken(store.clone());

        proxy.set(0, "a", Bytes::from("v")).await.unwrap();
        assert!(store.contains(0, "a"));
    }

    #[tokio::test]
    async fn test_del_combines_cache_failure() {
        let store = Arc::new(MemoryStore::new());
        store.insert(0, "a", "1");
        let proxy = broken(store.clone());

        let err = proxy.del(0, "a").await.err().unwrap();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(!store.contains(0, "a"));
        assert_eq!(store.dels.load(Ordering::SeqCst), 1);

        // Both sides failing are reported together
        let err = proxy.del(0, "a").await.err().unwrap();
        assert!(matches!(err, StoreError::Multiple(ref errors) if errors.len() == 2));
    }

    #[tokio::test]
    async fn test_listener_retries_after_failure() {
        let store = Arc::new(
            MemoryStore::new()
                .with_events(vec![event("a")])
                .failing_listens(1),
        );
        let cache = cache();
        cache.set("0:a", Bytes::from("old")).await.unwrap();

        let proxy = CacheProxy::wrap(
            store.clone(),
            Some(cache.clone() as Arc<dyn Cache>),
            Some("updates"),
            &CancellationToken::new(),
        );

        let evicted = tokio::time::timeout(Duration::from_secs(3), async {
            while cache.get("0:a").await.is_ok() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(evicted.is_ok());
        assert_eq!(store.listens.load(Ordering::SeqCst), 2);

        proxy.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_closes_store() {
        let store = Arc::new(MemoryStore::new().failing_close());
        let proxy = proxy(store.clone(), cache());

        assert!(proxy.close().await.is_err());
        assert!(store.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_change_events_evict_keys() {
        let store = Arc::new(MemoryStore::new().with_events(vec![event("a")]));
        store.insert(0, "a", "old");
        let cache = cache();
        cache.set("0:a", Bytes::from("old")).await.unwrap();
        cache.set("0:b", Bytes::from("kept")).await.unwrap();

        let proxy = CacheProxy::wrap(
            store.clone(),
            Some(cache.clone() as Arc<dyn Cache>),
            Some("updates"),
            &CancellationToken::new(),
        );

        let evicted = tokio::time::timeout(Duration::from_secs(2), async {
            while cache.get("0:a").await.is_ok() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(evicted.is_ok());
        assert!(cache.get("0:b").await.is_ok());

        proxy.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_from_channel() {
        let store = MemoryStore::new();
        let cache = cache();
        cache.set("0:a", Bytes::from("v")).await.unwrap();

        let (tx, rx) = mpsc::channel(4);
        tx.send(event("a")).await.unwrap();
        tx.send(event("missing")).await.unwrap();
        tx.send(ChangeEvent {
            table: "items".to_string(),
            fields: ExecContext::new(),
        })
        .await
        .unwrap();
        drop(tx);

        invalidate_from(&store, cache.as_ref(), rx).await;
        assert!(cache.is_empty());
    }
}
