use serde::{Deserialize, Serialize};

/// One embedding result. Ephemeral: produced per call, never persisted as-is
/// (the store copies the vector into its own row).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding {
    /// 384 components; unit length when `normalized` is set.
    pub vector: Vec<f32>,
    /// Label of the producing model (suffixed `-stub` in stub mode).
    pub model_name: String,
    /// Whether the vector was L2-normalized.
    pub normalized: bool,
}
