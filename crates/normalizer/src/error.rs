use thiserror::Error;

/// Errors surfaced by the normalization pipeline.
///
/// Only [`NormalizeError::InvalidQuery`] is user-visible; dictionary load
/// failures abort startup, and LLM failures are absorbed by the pipeline
/// (it falls through to the passthrough stage).
#[derive(Debug, Error, Clone)]
pub enum NormalizeError {
    /// Cleaned query length fell outside the supported range.
    #[error("cleaned query length {length} outside supported range 1..={max}")]
    InvalidQuery { length: usize, max: usize },

    /// The dictionary overlay file could not be read or parsed.
    #[error("failed to load dictionary overlay {path}: {reason}")]
    DictionaryLoad { path: String, reason: String },
}

/// Errors from the optional LLM fallback client. Never user-visible; the
/// pipeline logs them and continues to the passthrough stage.
#[derive(Debug, Error, Clone)]
pub enum LlmError {
    /// The call exceeded the hard timeout budget.
    #[error("llm normalization timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Transport-level failure.
    #[error("llm request failed: {0}")]
    Request(String),

    /// The response body was not the expected `{"normalized": "..."}` shape.
    #[error("llm response had unexpected shape: {0}")]
    BadResponse(String),
}
