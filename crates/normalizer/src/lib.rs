//! Query normalization for supplement search.
//!
//! Raw user input arrives in Spanish or English, with typos, stray accents,
//! shouting case, and compound-word spelling variants. This crate turns it
//! into `{canonical, confidence}` deterministically, running stages in a
//! fixed order and short-circuiting on the first hit:
//!
//! 1. **Clean**: trim, collapse whitespace, lowercase, NFD, strip accents.
//!    Rejects queries whose cleaned length is outside `1..=200`.
//! 2. **Exact dictionary**: static Spanish/variant → English map. 1.0.
//! 3. **Fuzzy**: minimum Levenshtein against dictionary keys. 0.6..=1.0.
//! 4. **Compound**: separator folding for `omega-3`-style variants.
//! 5. **LLM fallback**: optional, one call, hard 5 s budget. 0.7.
//! 6. **Passthrough**: per-word title case. 0.3.
//!
//! Stages 1–4 and 6 are pure and synchronous; only the LLM stage touches the
//! network, which is why [`Normalizer::normalize`] exists alongside the async
//! [`Normalizer::normalize_with_fallback`]. The tables behind stages 2–4 are
//! immutable after startup, so a [`Normalizer`] is freely shareable.
//!
//! Feeding a canonical output back through the pipeline always resolves as
//! an exact hit (the dictionary maps every canonical to itself), which gives
//! the idempotence the cache layer depends on.

pub mod clean;
pub mod compound;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod fingerprint;
pub mod fuzzy;
pub mod llm;

use std::sync::Arc;

pub use crate::clean::clean;
pub use crate::config::NormalizerConfig;
pub use crate::dictionary::Dictionary;
pub use crate::error::{LlmError, NormalizeError};
pub use crate::fingerprint::Fingerprint;
pub use crate::llm::{HttpLlmClient, LlmClient};

use crate::clean::cleaned_len;
use crate::compound::CompoundTable;

/// How a query was resolved, surfaced for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMethod {
    Exact,
    Fuzzy,
    Compound,
    Llm,
    Passthrough,
}

impl std::fmt::Display for NormalizeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NormalizeMethod::Exact => "exact",
            NormalizeMethod::Fuzzy => "fuzzy",
            NormalizeMethod::Compound => "compound",
            NormalizeMethod::Llm => "llm",
            NormalizeMethod::Passthrough => "passthrough",
        };
        f.write_str(label)
    }
}

/// Result of normalizing one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Canonical English title-case form.
    pub canonical: String,
    /// Resolution confidence in `[0, 1]`; exact > fuzzy > llm > passthrough.
    pub confidence: f32,
    /// Stage that produced the hit.
    pub method: NormalizeMethod,
}

impl Normalized {
    /// Cache fingerprint of the canonical form.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.canonical)
    }
}

/// The normalization pipeline. Built once at startup; immutable afterwards.
pub struct Normalizer {
    cfg: NormalizerConfig,
    dictionary: Dictionary,
    compounds: CompoundTable,
    llm: Option<Arc<dyn LlmClient>>,
}

impl Normalizer {
    /// Build a normalizer from config, loading the dictionary overlay if one
    /// is configured and wiring the HTTP LLM client when an endpoint is set.
    pub fn new(cfg: NormalizerConfig) -> Result<Self, NormalizeError> {
        let dictionary = match &cfg.dictionary_path {
            Some(path) => Dictionary::with_overlay(path)?,
            None => Dictionary::builtin(),
        };
        let compounds = CompoundTable::build(&dictionary);
        let llm: Option<Arc<dyn LlmClient>> = match &cfg.llm_endpoint {
            Some(endpoint) => match HttpLlmClient::new(endpoint.clone(), cfg.llm_timeout_ms) {
                Ok(client) => Some(Arc::new(client)),
                Err(err) => {
                    // The fallback is optional; a client that cannot even be
                    // constructed just leaves the pipeline without stage 5.
                    tracing::warn!(error = %err, "llm fallback unavailable, continuing without it");
                    None
                }
            },
            None => None,
        };
        Ok(Self {
            cfg,
            dictionary,
            compounds,
            llm,
        })
    }

    /// Replace the LLM client, mainly for tests that script the fallback.
    pub fn with_llm_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(client);
        self
    }

    /// Dictionary access for variant expansion during cache invalidation.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Synchronous normalization: stages 1–4 plus passthrough. The LLM stage
    /// is skipped entirely; callers that want it use
    /// [`normalize_with_fallback`](Self::normalize_with_fallback).
    pub fn normalize(&self, raw: &str) -> Result<Normalized, NormalizeError> {
        let cleaned = self.clean_checked(raw)?;
        Ok(self
            .resolve_static(&cleaned)
            .unwrap_or_else(|| passthrough(&cleaned)))
    }

    /// Full normalization including the time-boxed LLM fallback when
    /// configured. LLM errors and timeouts degrade to passthrough.
    pub async fn normalize_with_fallback(&self, raw: &str) -> Result<Normalized, NormalizeError> {
        let cleaned = self.clean_checked(raw)?;
        if let Some(hit) = self.resolve_static(&cleaned) {
            return Ok(hit);
        }

        if let Some(llm) = &self.llm {
            match llm.normalize(&cleaned).await {
                Ok(normalized) => {
                    return Ok(Normalized {
                        canonical: title_case(&clean(&normalized)),
                        confidence: 0.7,
                        method: NormalizeMethod::Llm,
                    });
                }
                Err(err) => {
                    tracing::warn!(query = %cleaned, error = %err, "llm fallback failed, using passthrough");
                }
            }
        }

        Ok(passthrough(&cleaned))
    }

    fn clean_checked(&self, raw: &str) -> Result<String, NormalizeError> {
        let cleaned = clean(raw);
        let length = cleaned_len(&cleaned);
        if length == 0 || length > self.cfg.max_query_chars {
            return Err(NormalizeError::InvalidQuery {
                length,
                max: self.cfg.max_query_chars,
            });
        }
        Ok(cleaned)
    }

    /// Stages 2–4: exact dictionary, fuzzy, compound. Pure table reads.
    fn resolve_static(&self, cleaned: &str) -> Option<Normalized> {
        if let Some(canonical) = self.dictionary.lookup(cleaned) {
            return Some(Normalized {
                canonical: canonical.to_string(),
                confidence: 1.0,
                method: NormalizeMethod::Exact,
            });
        }

        if let Some(hit) = fuzzy::closest_match(&self.dictionary, cleaned) {
            return Some(Normalized {
                canonical: hit.canonical,
                confidence: hit.confidence,
                method: NormalizeMethod::Fuzzy,
            });
        }

        if let Some(canonical) = self.compounds.resolve(cleaned) {
            // A compound hit that lands on a dictionary canonical is an exact
            // hit after separator folding; anything else scores 0.9.
            let confidence = if self.dictionary.lookup(&clean(canonical)).is_some() {
                1.0
            } else {
                0.9
            };
            return Some(Normalized {
                canonical: canonical.to_string(),
                confidence,
                method: NormalizeMethod::Compound,
            });
        }

        None
    }
}

/// Stage 6: per-word title case of the cleaned query.
fn passthrough(cleaned: &str) -> Normalized {
    Normalized {
        canonical: title_case(cleaned),
        confidence: 0.3,
        method: NormalizeMethod::Passthrough,
    }
}

/// Capitalize the first alphabetic character of each space-separated word.
fn title_case(cleaned: &str) -> String {
    cleaned
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn normalizer() -> Normalizer {
        Normalizer::new(NormalizerConfig::default()).unwrap()
    }

    #[test]
    fn exact_dictionary_hit() {
        let n = normalizer();
        let out = n.normalize("magnesio").unwrap();
        assert_eq!(out.canonical, "Magnesium");
        assert_eq!(out.confidence, 1.0);
        assert_eq!(out.method, NormalizeMethod::Exact);
    }

    #[test]
    fn accent_case_whitespace_invariance() {
        let n = normalizer();
        let a = n.normalize("vitamin d").unwrap();
        let b = n.normalize("VITAMIN D").unwrap();
        let c = n.normalize("  vitamín  d ").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.canonical, "Vitamin D");
        assert_eq!(a.confidence, 1.0);
    }

    #[test]
    fn typo_resolves_via_fuzzy() {
        let n = normalizer();
        let out = n.normalize("magenesio").unwrap();
        assert_eq!(out.canonical, "Magnesium");
        assert_eq!(out.method, NormalizeMethod::Fuzzy);
        assert!(out.confidence >= 0.8);
    }

    #[test]
    fn compound_spelling_resolves() {
        let n = normalizer();
        let out = n.normalize("omega3").unwrap();
        assert_eq!(out.canonical, "Omega-3");
        assert!(out.confidence >= 0.6);
    }

    #[test]
    fn unknown_query_passes_through_title_cased() {
        let n = normalizer();
        let out = n.normalize("quercetin phytosome").unwrap();
        assert_eq!(out.canonical, "Quercetin Phytosome");
        assert_eq!(out.confidence, 0.3);
        assert_eq!(out.method, NormalizeMethod::Passthrough);
    }

    #[test]
    fn idempotent_for_all_stages() {
        let n = normalizer();
        for raw in [
            "magnesio",
            "magenesio",
            "omega3",
            "quercetin phytosome",
            "  Vitamín  D ",
        ] {
            let once = n.normalize(raw).unwrap();
            let twice = n.normalize(&once.canonical).unwrap();
            assert_eq!(
                once.canonical, twice.canonical,
                "normalize must be idempotent for {raw:?}"
            );
        }
    }

    #[test]
    fn rejects_empty_and_oversized() {
        let n = normalizer();
        assert!(matches!(
            n.normalize("   "),
            Err(NormalizeError::InvalidQuery { length: 0, .. })
        ));
        let long = "a".repeat(201);
        assert!(matches!(
            n.normalize(&long),
            Err(NormalizeError::InvalidQuery { length: 201, .. })
        ));
        // Boundary: exactly 200 is accepted.
        assert!(n.normalize(&"a".repeat(200)).is_ok());
    }

    #[test]
    fn confidence_ordering_is_monotone() {
        let n = normalizer();
        let exact = n.normalize("magnesio").unwrap().confidence;
        let fuzzy = n.normalize("magenesio").unwrap().confidence;
        let passthrough = n.normalize("quercetin phytosome").unwrap().confidence;
        assert_eq!(exact, 1.0);
        assert!((0.6..=1.0).contains(&fuzzy));
        assert!(exact >= fuzzy);
        assert!(fuzzy > passthrough);
        assert_eq!(passthrough, 0.3);
    }

    #[test]
    fn same_fingerprint_for_whitespace_variants() {
        let n = normalizer();
        let a = n.normalize("vitamin  d").unwrap();
        let b = n.normalize("vitamin d").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    struct ScriptedLlm;

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn normalize(&self, _query: &str) -> Result<String, LlmError> {
            Ok("quercetin phytosome".into())
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn normalize(&self, _query: &str) -> Result<String, LlmError> {
            Err(LlmError::Timeout { timeout_ms: 5000 })
        }
    }

    #[tokio::test]
    async fn llm_fallback_scores_0_7() {
        let n = normalizer().with_llm_client(Arc::new(ScriptedLlm));
        let out = n.normalize_with_fallback("kwerseting fitosoma").await.unwrap();
        assert_eq!(out.canonical, "Quercetin Phytosome");
        assert_eq!(out.confidence, 0.7);
        assert_eq!(out.method, NormalizeMethod::Llm);
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_passthrough() {
        let n = normalizer().with_llm_client(Arc::new(FailingLlm));
        let out = n
            .normalize_with_fallback("quercetin phytosome extract")
            .await
            .unwrap();
        assert_eq!(out.method, NormalizeMethod::Passthrough);
        assert_eq!(out.confidence, 0.3);
    }

    #[tokio::test]
    async fn llm_not_consulted_on_dictionary_hit() {
        // A scripted client that would change the answer must never run for
        // a dictionary hit.
        let n = normalizer().with_llm_client(Arc::new(ScriptedLlm));
        let out = n.normalize_with_fallback("magnesio").await.unwrap();
        assert_eq!(out.canonical, "Magnesium");
        assert_eq!(out.method, NormalizeMethod::Exact);
    }

    #[test]
    fn title_case_handles_hyphens_and_digits() {
        assert_eq!(title_case("quercetin phytosome"), "Quercetin Phytosome");
        assert_eq!(title_case("omega-3"), "Omega-3");
        assert_eq!(title_case("5-htp"), "5-htp"); // digit first char is left as-is
    }
}
