//! Several stores behind one store
//!
//! Stores are consulted strictly in registration order. `NoKey` means "not
//! mine" and moves on to the next store; every other error is collected.

use crate::error::{Result, StoreError};
use crate::record::Record;
use crate::store::{BindConfig, Store};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Ordered store aggregate
pub struct MultiStore {
    stores: Vec<Arc<dyn Store>>,
}

impl MultiStore {
    pub fn new(stores: Vec<Arc<dyn Store>>) -> Self {
        MultiStore { stores }
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[async_trait]
impl Store for MultiStore {
    async fn get(&self, dbnum: u32, key: &str) -> Result<Bytes> {
        for store in &self.stores {
            match store.get(dbnum, key).await {
                Err(StoreError::NoKey) => continue,
                outcome => return outcome,
            }
        }
        Err(StoreError::NoKey)
    }

    async fn set(&self, dbnum: u32, key: &str, value: Bytes) -> Result<()> {
        let mut errors = Vec::new();
        for store in &self.stores {
            match store.set(dbnum, key, value.clone()).await {
                Ok(()) | Err(StoreError::NoKey) => {}
                Err(e) => errors.push(e),
            }
        }
        StoreError::combine(errors)
    }

    async fn del(&self, dbnum: u32, key: &str) -> Result<()> {
        let mut errors = Vec::new();
        for store in &self.stores {
            match store.del(dbnum, key).await {
                Ok(()) | Err(StoreError::NoKey) => {}
                Err(e) => errors.push(e),
            }
        }
        StoreError::combine(errors)
    }

    async fn keys(&self, dbnum: u32, pattern: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut errors = Vec::new();
        for store in &self.stores {
            match store.keys(dbnum, pattern).await {
                Ok(found) => keys.extend(found),
                Err(StoreError::NoKey) => {}
                Err(e) => errors.push(e),
            }
        }
        StoreError::combine(errors)?;
        Ok(keys)
    }

    async fn list(&self, dbnum: u32, pattern: &str) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut errors = Vec::new();
        for store in &self.stores {
            match store.list(dbnum, pattern).await {
                Ok(found) => records.extend(found),
                Err(StoreError::NoKey) => {}
                Err(e) => errors.push(e),
            }
        }
        StoreError::combine(errors)?;
        Ok(records)
    }

    async fn bind(&self, _conf: &BindConfig) -> Result<()> {
        Err(StoreError::MethodIsNotSupported)
    }

    async fn close(&self) -> Result<()> {
        let mut errors = Vec::new();
        for store in &self.stores {
            if let Err(e) = store.close().await {
                errors.push(e);
            }
        }
        StoreError::combine(errors)
    }

    fn supports_cache(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use std::sync::atomic::Ordering;

    fn stores() -> (Arc<MemoryStore>, Arc<MemoryStore>, MultiStore) {
        let users = Arc::new(MemoryStore::with_prefix("user_"));
        let orders = Arc::new(MemoryStore::with_prefix("order_"));
        let multi = MultiStore::new(vec![users.clone() as Arc<dyn Store>, orders.clone()]);
        (users, orders, multi)
    }

    #[tokio::test]
    async fn test_get_falls_through_no_key() {
        let (users, orders, multi) = stores();
        orders.insert(0, "order_1", "box");

        assert_eq!(multi.get(0, "order_1").await.unwrap(), Bytes::from("box"));
        assert_eq!(users.gets.load(Ordering::SeqCst), 1);
        assert!(matches!(multi.get(0, "other").await, Err(StoreError::NoKey)));
    }

    #[tokio::test]
    async fn test_get_stops_at_not_found() {
        let (_, orders, multi) = stores();
        assert!(matches!(multi.get(0, "user_1").await, Err(StoreError::NotFound)));
        assert_eq!(orders.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_set_and_del_skip_unrouted_stores() {
        let (users, orders, multi) = stores();

        multi.set(0, "user_1", Bytes::from("alice")).await.unwrap();
        assert!(users.contains(0, "user_1"));
        assert!(!orders.contains(0, "user_1"));

        multi.del(0, "user_1").await.unwrap();
        assert!(!users.contains(0, "user_1"));

        // Every store said NoKey: nothing to report
        multi.set(0, "other", Bytes::from("x")).await.unwrap();
        assert!(matches!(multi.del(0, "user_1").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_keys_concatenates() {
        let (users, orders, multi) = stores();
        users.insert(0, "user_1", "a");
        orders.insert(0, "order_1", "b");

        let keys = multi.keys(0, "*").await.unwrap();
        assert_eq!(keys, vec!["user_1".to_string(), "order_1".to_string()]);

        let keys = multi.keys(0, "order_*").await.unwrap();
        assert_eq!(keys, vec!["order_1".to_string()]);
        assert!(multi.keys(0, "nothing").await.unwrap().is_empty());

        let records = multi.list(0, "*").await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_bind_is_not_supported() {
        let (_, _, multi) = stores();
        let conf = BindConfig::table("user_{{id}}", 0, "users");
        assert!(matches!(multi.bind(&conf).await, Err(StoreError::MethodIsNotSupported)));
    }

    #[tokio::test]
    async fn test_close_combines_errors() {
        let first = Arc::new(MemoryStore::new().failing_close());
        let second = Arc::new(MemoryStore::new().failing_close());
        let multi = MultiStore::new(vec![first.clone() as Arc<dyn Store>, second.clone()]);

        match multi.close().await {
            Err(StoreError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(second.closed.load(Ordering::SeqCst));
    }
}
