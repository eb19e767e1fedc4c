use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fixed output dimensionality. The store, cache keys, and ANN index all
/// assume this; it is not a tunable.
pub const EMBEDDING_DIM: usize = 384;

/// Inference mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedMode {
    /// Local ONNX inference from the configured artifact directory.
    /// Requires the `onnx` build feature.
    Onnx,
    /// Deterministic hash-seeded vectors. Always available; used by tests
    /// and model-less deployments.
    Stub,
}

/// Embedding service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedderConfig {
    /// Inference mode.
    #[serde(default = "default_mode")]
    pub mode: EmbedMode,

    /// Read-only artifact directory containing `model.onnx` and
    /// `tokenizer.json`. Required in [`EmbedMode::Onnx`]; configured once at
    /// startup.
    #[serde(default)]
    pub model_artifact_path: Option<PathBuf>,

    /// Friendly model label surfaced on every embedding.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// L2-normalize output vectors. On by default; cosine similarity in the
    /// store assumes unit vectors.
    #[serde(default = "default_true")]
    pub normalize: bool,

    /// Token budget per input before truncation (ONNX mode).
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            model_artifact_path: None,
            model_name: default_model_name(),
            normalize: default_true(),
            max_sequence_length: default_max_sequence_length(),
        }
    }
}

fn default_mode() -> EmbedMode {
    EmbedMode::Stub
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".into()
}

fn default_true() -> bool {
    true
}

fn default_max_sequence_length() -> usize {
    256
}
