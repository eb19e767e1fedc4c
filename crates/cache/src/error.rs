use thiserror::Error;

/// Cache-tier failures. These are always maskable: the orchestrator degrades
/// to the next tier (or the store) with a warning; only the discovery
/// worker's invalidation path treats an L2 failure as retryable work.
#[derive(Debug, Error, Clone)]
pub enum CacheError {
    /// Tier backend could not be reached or its transaction failed.
    #[error("cache tier unavailable: {0}")]
    Unavailable(String),

    /// Stored bytes failed to decode; the entry is dropped.
    #[error("cache entry codec failure: {0}")]
    Codec(String),
}
