use thiserror::Error;

/// Queue storage failures.
#[derive(Debug, Error, Clone)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("job row codec failure: {0}")]
    Codec(String),

    #[error("unknown job: {0}")]
    UnknownJob(String),
}

/// PubMed call outcomes the worker cares about: retry or give up.
#[derive(Debug, Error, Clone)]
pub enum PubMedError {
    /// Timeouts, connection failures, 429s, 5xx. Retry with backoff.
    #[error("pubmed transient failure: {0}")]
    Transient(String),

    /// Anything else (malformed response, 4xx). The job fails.
    #[error("pubmed permanent failure: {0}")]
    Permanent(String),
}
