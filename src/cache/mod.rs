//! Cache drivers used by the cache-aside proxy
//!
//! One root cache is opened per process; each source gets a prefixed view
//! over the same storage.

mod entry;
mod lru;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod router;

pub use self::lru::LruCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;
pub use entry::CacheEntry;
pub use memory::MemoryCache;
pub use router::ShardRouter;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Key/value cache capability
///
/// `get` and `del` answer [`crate::error::StoreError::NotFound`] on a miss.
#[async_trait]
pub trait Cache: Send + Sync {
    /// View whose keys are transparently prefixed
    ///
    /// Views share the storage of their root and never release it.
    fn with_prefix(&self, prefix: &str) -> Arc<dyn Cache>;

    async fn get(&self, key: &str) -> Result<Bytes>;

    async fn set(&self, key: &str, value: Bytes) -> Result<()>;

    async fn del(&self, key: &str) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Capacity and entry lifetime of a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    pub size: usize,
    pub ttl: Duration,
}

impl CacheOptions {
    pub fn new(size: usize, ttl: Duration) -> Self {
        CacheOptions {
            size: size.max(1),
            ttl: if ttl.is_zero() { Duration::from_secs(60) } else { ttl },
        }
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions::new(1000, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = CacheOptions::new(0, Duration::ZERO);
        assert_eq!(options.size, 1);
        assert_eq!(options.ttl, Duration::from_secs(60));
    }
}
