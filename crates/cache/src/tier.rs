use async_trait::async_trait;
use normalizer::Fingerprint;

use crate::entry::CacheEntry;
use crate::error::CacheError;

/// The capability every cache tier exposes. L1 and L2 are two
/// implementations; the orchestrator composes them statically through
/// [`TieredCache`](crate::tiered::TieredCache).
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Tier label for logs and metrics (`"l1"`, `"l2"`).
    fn name(&self) -> &'static str;

    /// Fetch a live entry. Expired entries are treated as misses and may be
    /// reaped lazily.
    async fn get(&self, key: &Fingerprint) -> Result<Option<CacheEntry>, CacheError>;

    /// Store an entry.
    async fn put(&self, key: &Fingerprint, entry: CacheEntry) -> Result<(), CacheError>;

    /// Remove an entry if present.
    async fn delete(&self, key: &Fingerprint) -> Result<(), CacheError>;

    /// Drop every entry. Used by the admin global flush.
    async fn flush(&self) -> Result<(), CacheError>;

    /// Current population, for the per-tier gauges.
    async fn population(&self) -> Result<u64, CacheError>;
}
