use thiserror::Error;

/// Failures the orchestrator surfaces to the boundary. Everything else
/// (cache tiers down, LLM timeouts, enqueue hiccups) degrades inside the
/// pipeline and shows up only in logs and metrics.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The embedding model cannot load. No fallback.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// The vector store stayed unavailable through the retry budget.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// The request deadline elapsed mid-pipeline.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// Invariant breakage that is a bug, not an operational condition.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Admin ingest failures.
#[derive(Debug, Error)]
pub enum AdminError {
    /// A supplement with this canonical name (or colliding alias) exists.
    #[error("duplicate supplement: {name}")]
    Duplicate { name: String },

    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}
