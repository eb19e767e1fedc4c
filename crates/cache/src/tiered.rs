//! Static L1-over-L2 composition.
//!
//! Read path: L1, then L2, populating L1 on an L2 hit. Write path:
//! write-through to L2 first (durability), then L1. Tier failures on the
//! read and write paths are swallowed with a warning; the request degrades
//! to the next tier or the store. Deletion is different: the discovery
//! worker needs to know when an L2 delete failed so it can retry, so
//! [`TieredCache::delete`] surfaces that error instead of masking it.

use std::sync::Arc;

use chrono::Duration;
use normalizer::Fingerprint;

use crate::clock::Clock;
use crate::entry::{CacheEntry, SourceTier};
use crate::error::CacheError;
use crate::tier::CacheTier;

pub struct TieredCache {
    l1: Arc<dyn CacheTier>,
    l2: Arc<dyn CacheTier>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl TieredCache {
    pub fn new(
        l1: Arc<dyn CacheTier>,
        l2: Arc<dyn CacheTier>,
        clock: Arc<dyn Clock>,
        ttl_days: u64,
    ) -> Self {
        Self {
            l1,
            l2,
            clock,
            ttl: Duration::days(ttl_days as i64),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Look up a fingerprint, returning the entry and the tier that served
    /// it. Tier failures degrade to the next tier.
    pub async fn get(&self, key: &Fingerprint) -> Option<(CacheEntry, SourceTier)> {
        match self.l1.get(key).await {
            Ok(Some(entry)) => return Some((entry, SourceTier::L1)),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(tier = self.l1.name(), key = %key, error = %err, "cache tier read failed, degrading");
            }
        }

        match self.l2.get(key).await {
            Ok(Some(entry)) => {
                // Promote into L1 so the next identical query stays local.
                if let Err(err) = self.l1.put(key, entry.clone()).await {
                    tracing::warn!(tier = self.l1.name(), key = %key, error = %err, "l1 populate failed");
                }
                Some((entry, SourceTier::L2))
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(tier = self.l2.name(), key = %key, error = %err, "cache tier read failed, degrading");
                None
            }
        }
    }

    /// Write-through after a successful live search. Stamps `cached_at` and
    /// the TTL from the shared clock. Failures are masked; a missed cache
    /// write only costs a future recomputation.
    pub async fn put(&self, key: &Fingerprint, supplement_id: String, similarity: f32) {
        let now = self.clock.now();
        let entry = CacheEntry {
            supplement_id,
            similarity,
            source_tier: SourceTier::Vector,
            cached_at: now,
            ttl_expires_at: now + self.ttl,
        };

        if let Err(err) = self.l2.put(key, entry.clone()).await {
            tracing::warn!(tier = self.l2.name(), key = %key, error = %err, "cache write-through failed");
        }
        if let Err(err) = self.l1.put(key, entry).await {
            tracing::warn!(tier = self.l1.name(), key = %key, error = %err, "cache write-through failed");
        }
        self.record_populations().await;
    }

    /// Best-effort delete on both tiers. L1 failures are masked; an L2
    /// failure is returned so the caller (the discovery worker) can retry
    /// with backoff until the stale entry is really gone.
    pub async fn delete(&self, key: &Fingerprint) -> Result<(), CacheError> {
        if let Err(err) = self.l1.delete(key).await {
            tracing::warn!(tier = self.l1.name(), key = %key, error = %err, "l1 delete failed");
        }
        self.l2.delete(key).await
    }

    /// Global flush signal: empty both tiers. Used after admin upserts.
    pub async fn flush_all(&self) -> Result<(), CacheError> {
        if let Err(err) = self.l1.flush().await {
            tracing::warn!(tier = self.l1.name(), error = %err, "l1 flush failed");
        }
        let result = self.l2.flush().await;
        self.record_populations().await;
        result
    }

    /// Per-tier population gauges, refreshed after mutations.
    async fn record_populations(&self) {
        for tier in [&self.l1, &self.l2] {
            if let Ok(population) = tier.population().await {
                metrics::gauge!("cache_entries", "tier" => tier.name()).set(population as f64);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::l1::L1Cache;
    use crate::l2::L2Cache;
    use chrono::Utc;

    fn tiered(clock: Arc<ManualClock>, l2_file: &std::path::Path) -> TieredCache {
        let l1 = Arc::new(L1Cache::new(64, clock.clone()));
        let l2 = Arc::new(L2Cache::open(l2_file, clock.clone()).unwrap());
        TieredCache::new(l1, l2, clock, 7)
    }

    #[tokio::test]
    async fn write_through_then_l1_hit() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = tiered(clock, file.path());
        let key = Fingerprint::of("vitamin d");

        cache.put(&key, "s1".into(), 0.93).await;
        let (entry, tier) = cache.get(&key).await.unwrap();
        assert_eq!(entry.supplement_id, "s1");
        assert_eq!(tier, SourceTier::L1);
    }

    #[tokio::test]
    async fn l2_hit_populates_l1() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let l1 = Arc::new(L1Cache::new(64, clock.clone()));
        let l2 = Arc::new(L2Cache::open(file.path(), clock.clone()).unwrap());
        let cache = TieredCache::new(l1.clone(), l2, clock, 7);
        let key = Fingerprint::of("magnesio");

        cache.put(&key, "s2".into(), 0.9).await;
        // Simulate a cold L1 (fresh process) with a warm L2.
        l1.flush().await.unwrap();

        let (_, tier) = cache.get(&key).await.unwrap();
        assert_eq!(tier, SourceTier::L2);
        // Promoted: second read is an L1 hit.
        let (_, tier) = cache.get(&key).await.unwrap();
        assert_eq!(tier, SourceTier::L1);
    }

    #[tokio::test]
    async fn delete_removes_from_both_tiers() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = tiered(clock, file.path());
        let key = Fingerprint::of("zinc");

        cache.put(&key, "s3".into(), 0.88).await;
        cache.delete(&key).await.unwrap();
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn ttl_expiry_with_simulated_clock() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = tiered(clock.clone(), file.path());
        let key = Fingerprint::of("creatine");

        cache.put(&key, "s4".into(), 0.95).await;
        assert!(cache.get(&key).await.is_some());

        clock.advance(Duration::days(7) + Duration::seconds(1));
        assert!(cache.get(&key).await.is_none(), "entry must expire at ttl + 1s");
    }

    #[tokio::test]
    async fn flush_all_empties_both_tiers() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = tiered(clock, file.path());

        cache.put(&Fingerprint::of("a"), "s1".into(), 0.9).await;
        cache.put(&Fingerprint::of("b"), "s2".into(), 0.9).await;
        cache.flush_all().await.unwrap();
        assert!(cache.get(&Fingerprint::of("a")).await.is_none());
        assert!(cache.get(&Fingerprint::of("b")).await.is_none());
    }
}
