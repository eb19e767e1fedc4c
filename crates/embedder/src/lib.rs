//! Embedding service: text in, 384-d unit vector out.
//!
//! The service wraps a process-resident model with a cold/warm lifecycle:
//! artifacts load lazily on the first call (under a once-guard per process,
//! per-thread session handles after that) and stay resident. Identical input
//! yields identical output within a process; callers must not assume
//! bit-equality across processes.
//!
//! Two modes exist. `onnx` runs the real model from a configured artifact
//! directory and is gated behind the `onnx` build feature; `stub` produces
//! deterministic hash-seeded vectors and is what the test suite runs on.
//! Both L2-normalize by default, which is what makes cosine similarity in
//! the vector store collapse to a dot product.
//!
//! Embedding is CPU-bound. Async callers run [`Embedder::embed`] on a
//! blocking pool (`tokio::task::spawn_blocking`) so inference cannot starve
//! the request scheduler.

pub mod config;
pub mod error;

mod normalize;
mod stub;
mod types;

#[cfg(feature = "onnx")]
mod model;

pub use crate::config::{EmbedMode, EmbedderConfig, EMBEDDING_DIM};
pub use crate::error::EmbedError;
pub use crate::types::Embedding;

#[cfg(feature = "onnx")]
use crate::normalize::l2_normalize_in_place;
use crate::stub::make_stub_embedding;

/// Capability consumed by the search orchestrator and the discovery worker.
/// [`Embedder`] is the production implementation; tests substitute counting
/// or failing stubs.
pub trait EmbedService: Send + Sync {
    fn embed(&self, text: &str) -> Result<Embedding, EmbedError>;
}

/// The embedding service. Cheap to clone behind an `Arc`; the heavy state
/// (model handles) lives in process/thread caches, not in this struct.
pub struct Embedder {
    cfg: EmbedderConfig,
}

impl EmbedService for Embedder {
    fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        Embedder::embed(self, text)
    }
}

impl Embedder {
    pub fn new(cfg: EmbedderConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &EmbedderConfig {
        &self.cfg
    }

    /// Embed one text. Fails with [`EmbedError::ModelUnavailable`] only when
    /// the model cannot be loaded (or the build lacks the `onnx` feature
    /// while the config demands it).
    pub fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        match self.cfg.mode {
            EmbedMode::Stub => Ok(make_stub_embedding(text, &self.cfg)),
            EmbedMode::Onnx => self.embed_onnx(text),
        }
    }

    #[cfg(feature = "onnx")]
    fn embed_onnx(&self, text: &str) -> Result<Embedding, EmbedError> {
        let artifact_dir = self.cfg.model_artifact_path.as_deref().ok_or_else(|| {
            EmbedError::ModelUnavailable("model_artifact_path not configured".into())
        })?;
        let handle = model::get_or_load_model(artifact_dir)?;
        let mut vector = model::run_inference(&handle, text, &self.cfg)?;
        if self.cfg.normalize {
            l2_normalize_in_place(&mut vector);
        }
        Ok(Embedding {
            vector,
            model_name: self.cfg.model_name.clone(),
            normalized: self.cfg.normalize,
        })
    }

    #[cfg(not(feature = "onnx"))]
    fn embed_onnx(&self, _text: &str) -> Result<Embedding, EmbedError> {
        Err(EmbedError::ModelUnavailable(
            "built without the `onnx` feature".into(),
        ))
    }
}
