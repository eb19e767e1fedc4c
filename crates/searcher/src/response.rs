use serde::{Deserialize, Serialize};

use tiercache::SourceTier;
use vecstore::Supplement;

/// Search outcome classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Best match cleared the similarity floor.
    Found,
    /// No close match; a discovery job now covers the query.
    Processing,
    /// The query failed normalization (length or confidence gate).
    Invalid,
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SearchStatus::Found => "found",
            SearchStatus::Processing => "processing",
            SearchStatus::Invalid => "invalid",
        };
        f.write_str(label)
    }
}

/// The search contract's response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub status: SearchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplement: Option<Supplement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
    pub source_tier: SourceTier,
    pub latency_ms: u64,
    pub correlation_id: String,
}
