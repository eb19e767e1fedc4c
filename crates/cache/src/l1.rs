//! L1: capacity-bounded in-process LRU.
//!
//! Lookups are a mutex acquire plus a hash probe, well under a microsecond.
//! The tier is volatile by design; eviction is LRU at capacity, expiry is
//! checked on read against the shared clock.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lru::LruCache;
use normalizer::Fingerprint;

use crate::clock::Clock;
use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::tier::CacheTier;

pub struct L1Cache {
    entries: Mutex<LruCache<Fingerprint, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl L1Cache {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("max(1) is nonzero");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            clock,
        }
    }

    /// Current population, for the per-tier gauge.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheTier for L1Cache {
    fn name(&self) -> &'static str {
        "l1"
    }

    async fn get(&self, key: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.clone())),
            Some(_) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &Fingerprint, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .put(*key, entry);
        Ok(())
    }

    async fn delete(&self, key: &Fingerprint) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop(key);
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
        Ok(())
    }

    async fn population(&self) -> Result<u64, CacheError> {
        Ok(self.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::entry::SourceTier;
    use chrono::{Duration, Utc};

    fn entry(clock: &dyn Clock, ttl_days: i64) -> CacheEntry {
        let now = clock.now();
        CacheEntry {
            supplement_id: "s1".into(),
            similarity: 0.9,
            source_tier: SourceTier::Vector,
            cached_at: now,
            ttl_expires_at: now + Duration::days(ttl_days),
        }
    }

    #[tokio::test]
    async fn roundtrip_and_delete() {
        let cache = L1Cache::new(16, Arc::new(SystemClock));
        let key = Fingerprint::of("vitamin d");

        assert!(cache.get(&key).await.unwrap().is_none());
        cache.put(&key, entry(&SystemClock, 7)).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());

        cache.delete(&key).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lru_evicts_oldest() {
        let cache = L1Cache::new(2, Arc::new(SystemClock));
        let k1 = Fingerprint::of("one");
        let k2 = Fingerprint::of("two");
        let k3 = Fingerprint::of("three");

        cache.put(&k1, entry(&SystemClock, 7)).await.unwrap();
        cache.put(&k2, entry(&SystemClock, 7)).await.unwrap();
        cache.put(&k3, entry(&SystemClock, 7)).await.unwrap();

        assert!(cache.get(&k1).await.unwrap().is_none(), "k1 should be evicted");
        assert!(cache.get(&k2).await.unwrap().is_some());
        assert!(cache.get(&k3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = L1Cache::new(16, clock.clone());
        let key = Fingerprint::of("magnesium");

        cache.put(&key, entry(clock.as_ref(), 7)).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());

        clock.advance(Duration::days(7) + Duration::seconds(1));
        assert!(cache.get(&key).await.unwrap().is_none());
        // Reaped on read, not just hidden.
        assert_eq!(cache.len(), 0);
    }
}
