use thiserror::Error;

/// Errors surfaced by the embedding service.
#[derive(Debug, Error, Clone)]
pub enum EmbedError {
    /// The model artifacts could not be loaded (missing files, bad build
    /// features, runtime initialization failure). There is no fallback: the
    /// caller surfaces this as a 503.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// Tokenization or inference failed for a specific input.
    #[error("inference failure: {0}")]
    Inference(String),
}
