//! Admin ingest: the bootstrap/curation path that bypasses discovery.
//!
//! Used by the seed migration and by operators adding curated rows. The
//! embedding comes from the canonical name joined with the aliases, exactly
//! like the worker's, and a successful insert fires the global cache-flush
//! signal: a curated row may contradict any number of cached negatives, so
//! the blunt instrument is the safe one.

use serde::{Deserialize, Serialize};

use vecstore::{EvidenceGrade, StoreError, Supplement, SupplementMetadata};

use crate::error::AdminError;
use crate::searcher::Searcher;

/// Metadata supplied by the admin caller; timestamps are stamped here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertMetadata {
    pub evidence_grade: EvidenceGrade,
    #[serde(default)]
    pub study_count: u32,
    #[serde(default)]
    pub category: Option<String>,
}

/// Result of an upsert: the row id covering the name, and whether this call
/// created it.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub id: String,
    pub created: bool,
}

impl Searcher {
    /// Insert a curated supplement. Idempotent on canonical name: if the row
    /// already exists its id is returned and nothing is written or flushed.
    pub async fn upsert_supplement(
        &self,
        canonical_name: &str,
        aliases: Vec<String>,
        metadata: UpsertMetadata,
    ) -> Result<UpsertOutcome, AdminError> {
        let embedding = {
            let embedder = self.embedder().clone();
            let text = Supplement::embedding_text(canonical_name, &aliases);
            tokio::task::spawn_blocking(move || embedder.embed(&text))
                .await
                .map_err(|e| AdminError::Internal(e.to_string()))?
                .map_err(|e| match e {
                    embedder::EmbedError::ModelUnavailable(reason) => {
                        AdminError::ModelUnavailable(reason)
                    }
                    other => AdminError::Internal(other.to_string()),
                })?
        };

        let now = self.cache().clock().now();
        let supplement = Supplement {
            schema_version: vecstore::ROW_SCHEMA_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            canonical_name: canonical_name.to_string(),
            aliases,
            embedding: embedding.vector,
            metadata: SupplementMetadata {
                evidence_grade: metadata.evidence_grade,
                study_count: metadata.study_count,
                category: metadata.category,
                first_seen: now,
            },
            created_at: now,
            updated_at: now,
        };
        let id = supplement.id.clone();

        match self.store().insert(supplement) {
            Ok(()) => {
                metrics::gauge!("store_rows").set(self.store().len() as f64);
                // Safety flush: cached misses anywhere in the keyspace may
                // now be wrong.
                if let Err(err) = self.cache().flush_all().await {
                    tracing::warn!(error = %err, "post-upsert cache flush failed");
                }
                tracing::info!(canonical_name, id = %id, "supplement upserted");
                Ok(UpsertOutcome { id, created: true })
            }
            Err(StoreError::Duplicate { .. }) => {
                let existing = self
                    .store()
                    .get_by_canonical_name(canonical_name)
                    .map_err(|e| AdminError::Internal(e.to_string()))?
                    .ok_or_else(|| {
                        // Duplicate came from an alias collision rather than
                        // the canonical name itself.
                        AdminError::Duplicate {
                            name: canonical_name.to_string(),
                        }
                    })?;
                Ok(UpsertOutcome {
                    id: existing.id,
                    created: false,
                })
            }
            Err(StoreError::Unavailable(reason)) => Err(AdminError::StoreUnavailable(reason)),
            Err(err) => Err(AdminError::Internal(err.to_string())),
        }
    }
}
