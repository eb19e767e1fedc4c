//! The discovery worker: consumes the queue stream, validates queries
//! against PubMed, grades the evidence, materializes supplements, and
//! invalidates stale cache entries.
//!
//! Correctness under multiple workers comes from two store-level guards: the
//! queue's `Pending → InFlight` compare-and-set (one claimant per job) and
//! the vector store's `Duplicate` rejection on insert (a racing worker's
//! insert is treated as success).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use embedder::EmbedService;
use normalizer::{Fingerprint, Normalizer};
use tiercache::{Clock, TieredCache};
use vecstore::{StoreError, Supplement, SupplementMetadata, VectorStore};

use crate::error::{PubMedError, QueueError};
use crate::grade::{grade, EvidenceThresholds, Grading};
use crate::job::{DiscoveryJob, JobEvent, JobState};
use crate::pubmed::PubMedSearch;
use crate::queue::DiscoveryQueue;

/// Worker behavior knobs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WorkerConfig {
    /// Retry budget for transient failures before a job goes `Failed`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base of the exponential backoff (`2^attempts * base`).
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Cadence of the due-job poll that complements the event stream.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Cadence of the retention sweep over terminal jobs and negative
    /// markers.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Category stamped on discovered supplements.
    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub evidence_thresholds: EvidenceThresholds,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            category: default_category(),
            evidence_thresholds: EvidenceThresholds::default(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_sweep_interval_ms() -> u64 {
    3_600_000
}

fn default_category() -> String {
    "discovered".into()
}

pub struct DiscoveryWorker {
    queue: Arc<DiscoveryQueue>,
    pubmed: Arc<dyn PubMedSearch>,
    embedder: Arc<dyn EmbedService>,
    store: Arc<VectorStore>,
    cache: Arc<TieredCache>,
    normalizer: Arc<Normalizer>,
    clock: Arc<dyn Clock>,
    cfg: WorkerConfig,
}

impl DiscoveryWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<DiscoveryQueue>,
        pubmed: Arc<dyn PubMedSearch>,
        embedder: Arc<dyn EmbedService>,
        store: Arc<VectorStore>,
        cache: Arc<TieredCache>,
        normalizer: Arc<Normalizer>,
        clock: Arc<dyn Clock>,
        cfg: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            pubmed,
            embedder,
            store,
            cache,
            normalizer,
            clock,
            cfg,
        }
    }

    /// Consume the stream until shutdown is signalled (or the stream
    /// closes), polling for due retries on a timer. Jobs are never cancelled
    /// mid-run: the in-progress job finishes, then due jobs get one final
    /// drain pass.
    pub async fn run(
        self: Arc<Self>,
        mut stream: mpsc::UnboundedReceiver<JobEvent>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        let mut poll = tokio::time::interval(Duration::from_millis(self.cfg.poll_interval_ms));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut sweep = tokio::time::interval(Duration::from_millis(self.cfg.sweep_interval_ms));
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        sweep.tick().await; // the first tick fires immediately; skip it

        loop {
            tokio::select! {
                maybe_event = stream.recv() => match maybe_event {
                    Some(event) => {
                        self.process_job(&event.job_id).await;
                    }
                    None => break,
                },
                _ = poll.tick() => {
                    self.run_due_jobs().await;
                }
                _ = sweep.tick() => {
                    match self.queue.sweep_terminal().await {
                        Ok(removed) if removed > 0 => {
                            tracing::info!(removed, "retention sweep removed terminal jobs");
                        }
                        Ok(_) => {}
                        Err(err) => tracing::warn!(error = %err, "retention sweep failed"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        // Drain: one final pass over anything already due.
        self.run_due_jobs().await;
        tracing::info!("discovery worker drained");
    }

    /// Process every currently-due pending job.
    pub async fn run_due_jobs(&self) {
        let due = match self.queue.poll_due(32).await {
            Ok(due) => due,
            Err(err) => {
                tracing::warn!(error = %err, "due-job poll failed");
                return;
            }
        };
        for job in due {
            self.process_job(&job.job_id).await;
        }
    }

    /// Run one job end to end. Never returns an error: failures change job
    /// state and emit logs, they do not surface.
    pub async fn process_job(&self, job_id: &str) {
        match self.queue.claim(job_id).await {
            Ok(true) => {}
            Ok(false) => return, // another worker owns it
            Err(err) => {
                tracing::warn!(job_id, error = %err, "claim failed");
                return;
            }
        }

        let job = match self.queue.get_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(job_id, "claimed job vanished");
                return;
            }
            Err(err) => {
                tracing::warn!(job_id, error = %err, "job fetch failed");
                return;
            }
        };

        if let Err(err) = self.execute(&job).await {
            tracing::warn!(job_id, error = %err, "queue transition failed");
        }
    }

    async fn execute(&self, job: &DiscoveryJob) -> Result<(), QueueError> {
        let query = job.query.as_str();

        // Re-rejecting a recently rejected query must not hit PubMed again.
        match self.queue.negative_marker(query).await {
            Ok(Some(rejected_at)) => {
                tracing::info!(job_id = %job.job_id, query, %rejected_at, "negative marker hit, rejecting without validation");
                return self
                    .queue
                    .complete(&job.job_id, JobState::RejectedNoEvidence, None)
                    .await;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(job_id = %job.job_id, error = %err, "negative marker read failed");
            }
        }

        let study_count = match self.pubmed.study_count(query).await {
            Ok(count) => count,
            Err(PubMedError::Transient(reason)) => {
                return self.retry_or_fail(job, reason).await;
            }
            Err(PubMedError::Permanent(reason)) => {
                tracing::error!(job_id = %job.job_id, query, %reason, "pubmed permanently rejected query");
                return self
                    .queue
                    .complete(&job.job_id, JobState::Failed, Some(reason))
                    .await;
            }
        };

        let evidence_grade = match grade(study_count, &self.cfg.evidence_thresholds) {
            Grading::NoEvidence => {
                tracing::info!(job_id = %job.job_id, query, study_count, "no evidence, rejecting");
                return self
                    .queue
                    .complete(&job.job_id, JobState::RejectedNoEvidence, None)
                    .await;
            }
            Grading::Graded(grade) => grade,
        };

        let aliases: Vec<String> = self
            .normalizer
            .dictionary()
            .variants_of(query)
            .iter()
            .filter(|variant| !variant.eq_ignore_ascii_case(query))
            .cloned()
            .collect();

        let embedding = {
            let embedder = self.embedder.clone();
            let text = Supplement::embedding_text(query, &aliases);
            let result = tokio::task::spawn_blocking(move || embedder.embed(&text)).await;
            match result {
                Ok(Ok(embedding)) => embedding,
                Ok(Err(embedder::EmbedError::ModelUnavailable(reason))) => {
                    return self.retry_or_fail(job, format!("model unavailable: {reason}")).await;
                }
                Ok(Err(err)) => {
                    tracing::error!(job_id = %job.job_id, query, error = %err, "embedding failed");
                    return self
                        .queue
                        .complete(&job.job_id, JobState::Failed, Some(err.to_string()))
                        .await;
                }
                Err(join_err) => {
                    return self.retry_or_fail(job, format!("embed task failed: {join_err}")).await;
                }
            }
        };

        let now = self.clock.now();
        let supplement = Supplement {
            schema_version: vecstore::ROW_SCHEMA_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            canonical_name: query.to_string(),
            aliases,
            embedding: embedding.vector,
            metadata: SupplementMetadata {
                evidence_grade,
                study_count,
                category: Some(self.cfg.category.clone()),
                first_seen: now,
            },
            created_at: now,
            updated_at: now,
        };

        match self.store.insert(supplement) {
            Ok(()) => {
                metrics::counter!("discovery_inserts_total").increment(1);
                metrics::gauge!("store_rows").set(self.store.len() as f64);
            }
            Err(StoreError::Duplicate { name }) => {
                // Another worker or the admin path won the race; the row
                // exists, which is all this job needs.
                tracing::info!(job_id = %job.job_id, %name, "duplicate insert treated as success");
            }
            Err(StoreError::InvalidEmbedding { .. }) => {
                let err = "embedding failed store validation";
                tracing::error!(job_id = %job.job_id, query, err);
                return self
                    .queue
                    .complete(&job.job_id, JobState::Failed, Some(err.into()))
                    .await;
            }
            Err(err) => {
                return self.retry_or_fail(job, err.to_string()).await;
            }
        }

        if let Err(reason) = self.invalidate_query_keys(query, job.attempts).await {
            return self.retry_or_fail(job, reason).await;
        }

        self.queue
            .complete(&job.job_id, JobState::Succeeded, None)
            .await?;

        let grade_label = evidence_grade.to_string();
        tracing::info!(
            job_id = %job.job_id,
            query,
            study_count,
            grade = %grade_label,
            "supplement discovered"
        );
        Ok(())
    }

    /// Delete the cache keys that could be hiding the new supplement: the
    /// canonical query's fingerprint plus the fingerprints of its known
    /// Spanish variants. L2 failures are retried inline with backoff; if the
    /// budget runs out the whole job retries (duplicate insert on the re-run
    /// is already treated as success).
    async fn invalidate_query_keys(&self, query: &str, job_attempts: u32) -> Result<(), String> {
        let mut keys = vec![Fingerprint::of(query)];
        for variant in self.normalizer.dictionary().variants_of(query) {
            keys.push(Fingerprint::of(variant));
        }

        for key in keys {
            let mut attempt = 0u32;
            loop {
                match self.cache.delete(&key).await {
                    Ok(()) => break,
                    Err(err) if attempt < 3 => {
                        let delay = backoff_delay(self.cfg.retry_base_ms / 4, attempt);
                        tracing::warn!(key = %key, error = %err, attempt, "cache invalidation retry");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(err) => {
                        return Err(format!(
                            "cache invalidation exhausted retries (job attempt {job_attempts}): {err}"
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Transient failure: back off and requeue, or fail the job once the
    /// attempt budget is spent.
    async fn retry_or_fail(&self, job: &DiscoveryJob, reason: String) -> Result<(), QueueError> {
        let next_attempts = job.attempts + 1;
        if next_attempts >= self.cfg.max_attempts {
            tracing::error!(
                job_id = %job.job_id,
                query = %job.query,
                attempts = next_attempts,
                %reason,
                "discovery job failed after retry budget"
            );
            return self
                .queue
                .complete(&job.job_id, JobState::Failed, Some(reason))
                .await;
        }

        let delay = backoff_delay(self.cfg.retry_base_ms, next_attempts);
        let next_attempt_after = self.clock.now()
            + chrono::Duration::milliseconds(delay.as_millis() as i64);
        tracing::warn!(
            job_id = %job.job_id,
            query = %job.query,
            attempts = next_attempts,
            delay_ms = delay.as_millis() as u64,
            %reason,
            "discovery job requeued"
        );
        self.queue
            .release_for_retry(&job.job_id, reason, next_attempt_after)
            .await
    }
}

/// `2^attempt * base` with ±20% jitter.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let exponential = base_ms.saturating_mul(1u64 << attempt.min(16));
    let jitter = 0.8 + fastrand::f64() * 0.4;
    Duration::from_millis((exponential as f64 * jitter) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_with_jitter() {
        for attempt in 0..4 {
            let base = 1_000u64;
            let delay = backoff_delay(base, attempt).as_millis() as u64;
            let nominal = base * (1 << attempt);
            assert!(delay >= nominal * 8 / 10, "attempt {attempt}: {delay} < 0.8x");
            assert!(delay <= nominal * 12 / 10 + 1, "attempt {attempt}: {delay} > 1.2x");
        }
    }
}
