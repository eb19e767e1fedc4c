use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Normalizer configuration.
///
/// The dictionary and compound tables are built once from this config at
/// startup and never reloaded; hot-reload is an explicit non-goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizerConfig {
    /// Upper bound on cleaned query length, in characters.
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,

    /// Optional JSON overlay extending the compiled-in dictionary.
    #[serde(default)]
    pub dictionary_path: Option<PathBuf>,

    /// Endpoint for the LLM normalization fallback. Absent means the
    /// pipeline skips straight from compound matching to passthrough.
    #[serde(default)]
    pub llm_endpoint: Option<String>,

    /// Hard budget for one LLM fallback call.
    #[serde(default = "default_llm_timeout_ms")]
    pub llm_timeout_ms: u64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_query_chars: default_max_query_chars(),
            dictionary_path: None,
            llm_endpoint: None,
            llm_timeout_ms: default_llm_timeout_ms(),
        }
    }
}

fn default_max_query_chars() -> usize {
    200
}

fn default_llm_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = NormalizerConfig::default();
        assert_eq!(cfg.max_query_chars, 200);
        assert_eq!(cfg.llm_timeout_ms, 5_000);
        assert!(cfg.dictionary_path.is_none());
        assert!(cfg.llm_endpoint.is_none());
    }
}
