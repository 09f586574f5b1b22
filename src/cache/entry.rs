//! Cached value with its lifetime

use bytes::Bytes;
use std::time::{Duration, Instant};

/// One cached value
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Bytes,

    /// Insertion time
    pub created_at: Instant,

    /// Absolute expiration time
    pub expire_at: Instant,
}

impl CacheEntry {
    pub fn new(value: Bytes, ttl: Duration) -> Self {
        let now = Instant::now();
        CacheEntry {
            value,
            created_at: now,
            expire_at: now + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expire_at
    }

    /// Remaining lifetime, zero once expired
    pub fn ttl(&self) -> Duration {
        self.expire_at.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(Bytes::from("v"), Duration::from_secs(60));
        assert!(!entry.is_expired());
        assert!(entry.ttl() > Duration::from_secs(59));
        assert!(entry.is_expired_at(entry.created_at + Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let entry = CacheEntry::new(Bytes::from("v"), Duration::ZERO);
        assert!(entry.is_expired());
        assert_eq!(entry.ttl(), Duration::ZERO);
    }
}
