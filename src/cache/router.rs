//! Cache key routing to shards
//!
//! Keys are spread across shards with SipHash-1-3.

use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};

/// Routes cache keys to shard indexes
#[derive(Debug, Clone, Copy)]
pub struct ShardRouter {
    num_shards: usize,
}

impl ShardRouter {
    /// Router over `num_shards` shards, at least one
    pub fn new(num_shards: usize) -> Self {
        ShardRouter {
            num_shards: num_shards.max(1),
        }
    }

    /// One shard per CPU core, between 1 and 16
    pub fn per_cpu() -> Self {
        Self::new(num_cpus::get().clamp(1, 16))
    }

    pub fn route(&self, key: &str) -> usize {
        let mut hasher = SipHasher13::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.num_shards
    }

    pub fn num_shards(&self) -> usize {
        self.num_shards
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_deterministic() {
        let router = ShardRouter::new(4);
        assert_eq!(router.route("0:user_1"), router.route("0:user_1"));
    }

    #[test]
    fn test_routing_distribution() {
        let router = ShardRouter::new(4);
        let mut counts = [0; 4];
        for i in 0..1000 {
            counts[router.route(&format!("s0/0:key_{i}"))] += 1;
        }
        for count in counts {
            assert!(count > 180 && count < 320, "uneven distribution: {count}");
        }
    }

    #[test]
    fn test_zero_shards_clamped() {
        let router = ShardRouter::new(0);
        assert_eq!(router.num_shards(), 1);
        assert_eq!(router.route("any"), 0);
    }
}
