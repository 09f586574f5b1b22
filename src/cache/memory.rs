//! Sharded in-memory TTL cache (`memory`)

use super::{Cache, CacheEntry, CacheOptions, ShardRouter};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Entries of one shard with their insertion order
///
/// `order` may hold stale tickets for overwritten or removed keys; a ticket
/// is live only while its sequence number matches the stored entry.
#[derive(Default)]
struct Shard {
    entries: HashMap<String, (u64, CacheEntry)>,
    order: VecDeque<(u64, String)>,
    seq: u64,
}

impl Shard {
    fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key).map(|(_, entry)| entry)
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    fn insert(&mut self, key: String, entry: CacheEntry, capacity: usize) {
        if !self.entries.contains_key(&key) {
            self.evict(capacity);
        }
        self.seq += 1;
        self.order.push_back((self.seq, key.clone()));
        self.entries.insert(key, (self.seq, entry));

        if self.order.len() > 2 * capacity {
            let entries = &self.entries;
            self.order
                .retain(|(seq, key)| entries.get(key).is_some_and(|(live, _)| live == seq));
        }
    }

    /// Drop the oldest insertions until there is room for one more
    ///
    /// Every entry shares the same TTL, so the oldest are also the first to
    /// expire.
    fn evict(&mut self, capacity: usize) {
        while self.entries.len() >= capacity {
            let Some((seq, key)) = self.order.pop_front() else {
                break;
            };
            if self.entries.get(&key).is_some_and(|(live, _)| *live == seq) {
                self.entries.remove(&key);
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

struct Shards {
    router: ShardRouter,
    shards: Vec<Mutex<Shard>>,
    capacity: usize,
    ttl: Duration,
}

impl Shards {
    fn shard(&self, key: &str) -> &Mutex<Shard> {
        &self.shards[self.router.route(key)]
    }
}

/// Bounded map split into SipHash-routed shards
///
/// A full shard drops its oldest insertion.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Arc<Shards>,
    prefix: String,
    root: bool,
}

impl MemoryCache {
    pub fn new(options: CacheOptions) -> Self {
        Self::with_router(options, ShardRouter::per_cpu())
    }

    pub fn with_router(options: CacheOptions, router: ShardRouter) -> Self {
        let shards = (0..router.num_shards())
            .map(|_| Mutex::new(Shard::default()))
            .collect();
        MemoryCache {
            inner: Arc::new(Shards {
                router,
                shards,
                capacity: options.size.div_ceil(router.num_shards()).max(1),
                ttl: options.ttl,
            }),
            prefix: String::new(),
            root: true,
        }
    }

    /// Number of live entries across every view
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .shards
            .iter()
            .map(|shard| {
                shard
                    .lock()
                    .entries
                    .values()
                    .filter(|(_, e)| !e.is_expired_at(now))
                    .count()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn with_prefix(&self, prefix: &str) -> Arc<dyn Cache> {
        Arc::new(MemoryCache {
            inner: self.inner.clone(),
            prefix: format!("{}{}", self.prefix, prefix),
            root: false,
        })
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let key = self.full_key(key);
        let mut shard = self.inner.shard(&key).lock();
        match shard.get(&key) {
            Some(entry) if !entry.is_expired() => Ok(entry.value.clone()),
            Some(_) => {
                shard.remove(&key);
                Err(StoreError::NotFound)
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        let key = self.full_key(key);
        let entry = CacheEntry::new(value, self.inner.ttl);
        self.inner
            .shard(&key)
            .lock()
            .insert(key, entry, self.inner.capacity);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let key = self.full_key(key);
        match self.inner.shard(&key).lock().remove(&key) {
            Some(entry) if !entry.is_expired() => Ok(()),
            _ => Err(StoreError::NotFound),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.root {
            for shard in &self.inner.shards {
                shard.lock().clear();
            }
        }
        Ok(())
    }
}
