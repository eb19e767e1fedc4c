//! The whole-service configuration surface.
//!
//! One struct collects every tunable the product contract enumerates, with
//! serde defaults matching the contract values. The service builder maps
//! these onto the per-subsystem config structs; nothing reads configuration
//! after startup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use discovery::{EvidenceThresholds, PubMedConfig};
use embedder::{EmbedMode, EMBEDDING_DIM};

/// Service configuration. `Default` is a working in-memory deployment with
/// the stub embedder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Cosine floor for a match.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Result-cache TTL in days.
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u64,

    /// Total request deadline.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Hard budget for the LLM normalization fallback.
    #[serde(default = "default_llm_timeout_ms")]
    pub llm_timeout_ms: u64,

    /// Discovery retry budget.
    #[serde(default = "default_worker_max_attempts")]
    pub worker_max_attempts: u32,

    /// Pending-job count that trips the backlog alarm.
    #[serde(default = "default_backlog_alert_threshold")]
    pub backlog_alert_threshold: u64,

    #[serde(default)]
    pub evidence_thresholds: EvidenceThresholds,

    /// Embedding dimensionality. Fixed at 384; present so a config file
    /// that disagrees fails fast instead of corrupting the store.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Optional JSON overlay for the normalization dictionary.
    #[serde(default)]
    pub dictionary_path: Option<PathBuf>,

    /// Read-only model artifact directory (`model.onnx`, `tokenizer.json`).
    #[serde(default)]
    pub model_artifact_path: Option<PathBuf>,

    /// Embedding mode; `stub` runs without artifacts.
    #[serde(default = "default_embed_mode")]
    pub embed_mode: EmbedMode,

    /// Endpoint for the LLM normalization fallback; absent disables it.
    #[serde(default)]
    pub llm_endpoint: Option<String>,

    /// Retention window for terminal discovery jobs and negative markers.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// ANN candidates per search.
    #[serde(default = "default_ann_k")]
    pub ann_k: usize,

    /// L1 cache capacity in entries.
    #[serde(default = "default_l1_capacity")]
    pub l1_capacity: usize,

    /// Directory for the persistent stores (rows, cache, queue). Absent
    /// means fully in-memory: fine for dev and tests, nothing survives a
    /// restart.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub pubmed: PubMedConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            cache_ttl_days: default_cache_ttl_days(),
            request_timeout_ms: default_request_timeout_ms(),
            llm_timeout_ms: default_llm_timeout_ms(),
            worker_max_attempts: default_worker_max_attempts(),
            backlog_alert_threshold: default_backlog_alert_threshold(),
            evidence_thresholds: EvidenceThresholds::default(),
            embedding_dim: default_embedding_dim(),
            dictionary_path: None,
            model_artifact_path: None,
            embed_mode: default_embed_mode(),
            llm_endpoint: None,
            retention_days: default_retention_days(),
            ann_k: default_ann_k(),
            l1_capacity: default_l1_capacity(),
            data_dir: None,
            pubmed: PubMedConfig::default(),
        }
    }
}

impl Config {
    /// Reject configurations that cannot work before any component starts.
    pub fn validate(&self) -> Result<(), String> {
        if self.embedding_dim != EMBEDDING_DIM {
            return Err(format!(
                "embedding_dim is fixed at {EMBEDDING_DIM}, got {}",
                self.embedding_dim
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(format!(
                "similarity_threshold must be in [0, 1], got {}",
                self.similarity_threshold
            ));
        }
        if self.embed_mode == EmbedMode::Onnx && self.model_artifact_path.is_none() {
            return Err("embed_mode=onnx requires model_artifact_path".into());
        }
        if self.ann_k == 0 {
            return Err("ann_k must be at least 1".into());
        }
        Ok(())
    }
}

fn default_similarity_threshold() -> f32 {
    0.85
}

fn default_cache_ttl_days() -> u64 {
    7
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_llm_timeout_ms() -> u64 {
    5_000
}

fn default_worker_max_attempts() -> u32 {
    3
}

fn default_backlog_alert_threshold() -> u64 {
    100
}

fn default_embedding_dim() -> usize {
    EMBEDDING_DIM
}

fn default_embed_mode() -> EmbedMode {
    EmbedMode::Stub
}

fn default_retention_days() -> u64 {
    30
}

fn default_ann_k() -> usize {
    5
}

fn default_l1_capacity() -> usize {
    4_096
}
