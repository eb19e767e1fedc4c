use thiserror::Error;

/// Errors surfaced by the vector store.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// A row with the same canonical name (or a colliding alias) exists.
    /// Not retryable; racing writers treat it as success.
    #[error("duplicate supplement: {name}")]
    Duplicate { name: String },

    /// Embedding failed the dimension or unit-norm invariant. Not retryable.
    #[error("invalid embedding: expected {expected} unit-norm dims, got {got} (norm {norm:.4})")]
    InvalidEmbedding {
        expected: usize,
        got: usize,
        norm: f32,
    },

    /// Backend I/O failure. Retryable upstream.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Row encode/decode failure; indicates corruption or a schema mismatch.
    #[error("row codec failure: {0}")]
    Codec(String),
}

impl StoreError {
    /// Whether a caller may retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
