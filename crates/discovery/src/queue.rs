//! Durable discovery queue on redb, with an in-process change stream.
//!
//! Three tables: job rows by id, an active-query index guaranteeing at most
//! one non-terminal job per canonical query, and negative-discovery markers
//! for queries PubMed rejected. redb serializes writers, so the
//! `Pending → InFlight` compare-and-set is a read-check-write inside one
//! write transaction: exactly one claimant wins.
//!
//! Every transition into `Pending` emits a [`JobEvent`] on the stream. The
//! worker couples the stream with a periodic due-job poll, which also covers
//! retries (whose `next_attempt_after` lies in the future at emission time)
//! and events lost across restarts.

use std::path::Path;
use std::sync::{Arc, Mutex};

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use chrono::{DateTime, Duration, Utc};
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tokio::sync::mpsc;

use tiercache::Clock;

use crate::error::QueueError;
use crate::job::{DiscoveryJob, JobEvent, JobState};

const JOBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("discovery_jobs");
const ACTIVE_TABLE: TableDefinition<&str, &str> = TableDefinition::new("discovery_active");
const NEGATIVE_TABLE: TableDefinition<&str, i64> = TableDefinition::new("discovery_negative");

/// Queue behavior knobs.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueueConfig {
    /// Pending-job count above which the backlog alarm fires.
    #[serde(default = "default_backlog_alert_threshold")]
    pub backlog_alert_threshold: u64,

    /// How long terminal jobs and negative markers are retained.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backlog_alert_threshold: default_backlog_alert_threshold(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_backlog_alert_threshold() -> u64 {
    100
}

fn default_retention_days() -> u64 {
    30
}

/// Result of an enqueue: the job that now covers the query, and whether this
/// call created it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueOutcome {
    pub job_id: String,
    pub created: bool,
}

pub struct DiscoveryQueue {
    db: Arc<Database>,
    cfg: QueueConfig,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<JobEvent>,
    stream: Mutex<Option<mpsc::UnboundedReceiver<JobEvent>>>,
}

impl DiscoveryQueue {
    /// Open or create the queue database at `path`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        clock: Arc<dyn Clock>,
        cfg: QueueConfig,
    ) -> Result<Self, QueueError> {
        let db = Database::create(path).map_err(|e| QueueError::Unavailable(e.to_string()))?;
        Self::with_database(db, clock, cfg)
    }

    /// Ephemeral queue for tests.
    pub fn in_memory(clock: Arc<dyn Clock>, cfg: QueueConfig) -> Result<Self, QueueError> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        Self::with_database(db, clock, cfg)
    }

    fn with_database(
        db: Database,
        clock: Arc<dyn Clock>,
        cfg: QueueConfig,
    ) -> Result<Self, QueueError> {
        let write_txn = db
            .begin_write()
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        {
            write_txn
                .open_table(JOBS_TABLE)
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            write_txn
                .open_table(ACTIVE_TABLE)
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            write_txn
                .open_table(NEGATIVE_TABLE)
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;

        let (events, receiver) = mpsc::unbounded_channel();
        Ok(Self {
            db: Arc::new(db),
            cfg,
            clock,
            events,
            stream: Mutex::new(Some(receiver)),
        })
    }

    /// Take the change stream. Exactly one consumer (the worker) owns it.
    pub fn take_stream(&self) -> Option<mpsc::UnboundedReceiver<JobEvent>> {
        self.stream.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.cfg
    }

    /// Idempotent enqueue. If a non-terminal job already covers `query`, its
    /// id is returned and no row or event is produced.
    pub async fn enqueue(&self, query: &str) -> Result<EnqueueOutcome, QueueError> {
        let db = self.db.clone();
        let now = self.clock.now();
        let query_owned = query.to_string();
        let job_id = uuid::Uuid::new_v4().to_string();

        let (outcome, pending) = run_blocking(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            let outcome;
            {
                let mut active = write_txn
                    .open_table(ACTIVE_TABLE)
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                let existing = active
                    .get(query_owned.as_str())
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?
                    .map(|v| v.value().to_string());

                match existing {
                    Some(existing_id) => {
                        outcome = EnqueueOutcome {
                            job_id: existing_id,
                            created: false,
                        };
                    }
                    None => {
                        let job = DiscoveryJob {
                            job_id: job_id.clone(),
                            query: query_owned.clone(),
                            state: JobState::Pending,
                            attempts: 0,
                            next_attempt_after: None,
                            last_error: None,
                            enqueued_at: now,
                            completed_at: None,
                        };
                        let mut jobs = write_txn
                            .open_table(JOBS_TABLE)
                            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                        jobs.insert(job.job_id.as_str(), encode_job(&job)?.as_slice())
                            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                        active
                            .insert(query_owned.as_str(), job.job_id.as_str())
                            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                        outcome = EnqueueOutcome {
                            job_id: job.job_id,
                            created: true,
                        };
                    }
                }
            }
            let pending = count_pending(&write_txn)?;
            write_txn
                .commit()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            Ok((outcome, pending))
        })
        .await?;

        metrics::gauge!("discovery_backlog").set(pending as f64);
        if pending > self.cfg.backlog_alert_threshold {
            tracing::error!(
                pending,
                threshold = self.cfg.backlog_alert_threshold,
                "discovery backlog above threshold"
            );
        }

        if outcome.created {
            tracing::info!(job_id = %outcome.job_id, query, "discovery job enqueued");
            let _ = self.events.send(JobEvent {
                job_id: outcome.job_id.clone(),
                query: query.to_string(),
            });
        }
        Ok(outcome)
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<DiscoveryJob>, QueueError> {
        let db = self.db.clone();
        let job_id = job_id.to_string();
        run_blocking(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            let jobs = read_txn
                .open_table(JOBS_TABLE)
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            match jobs
                .get(job_id.as_str())
                .map_err(|e| QueueError::Unavailable(e.to_string()))?
            {
                Some(value) => Ok(Some(decode_job(value.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Compare-and-set `Pending → InFlight`. Returns whether this caller won
    /// the claim.
    pub async fn claim(&self, job_id: &str) -> Result<bool, QueueError> {
        let db = self.db.clone();
        let job_id = job_id.to_string();
        run_blocking(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            let claimed;
            {
                let mut jobs = write_txn
                    .open_table(JOBS_TABLE)
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                let mut job = match jobs
                    .get(job_id.as_str())
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?
                {
                    Some(value) => decode_job(value.value())?,
                    None => return Err(QueueError::UnknownJob(job_id.clone())),
                };
                if job.state == JobState::Pending {
                    job.state = JobState::InFlight;
                    jobs.insert(job_id.as_str(), encode_job(&job)?.as_slice())
                        .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                    claimed = true;
                } else {
                    claimed = false;
                }
            }
            write_txn
                .commit()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            Ok(claimed)
        })
        .await
    }

    /// Transient failure: put the job back to `Pending` with an incremented
    /// attempt counter and a deferred `next_attempt_after`.
    pub async fn release_for_retry(
        &self,
        job_id: &str,
        error: String,
        next_attempt_after: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let db = self.db.clone();
        let job_id = job_id.to_string();
        run_blocking(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            {
                let mut jobs = write_txn
                    .open_table(JOBS_TABLE)
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                let mut job = match jobs
                    .get(job_id.as_str())
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?
                {
                    Some(value) => decode_job(value.value())?,
                    None => return Err(QueueError::UnknownJob(job_id.clone())),
                };
                job.state = JobState::Pending;
                job.attempts += 1;
                job.last_error = Some(error);
                job.next_attempt_after = Some(next_attempt_after);
                jobs.insert(job_id.as_str(), encode_job(&job)?.as_slice())
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            }
            write_txn
                .commit()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }

    /// Terminal transition. Clears the active-query index entry and, for
    /// `RejectedNoEvidence`, writes the negative-discovery marker.
    pub async fn complete(
        &self,
        job_id: &str,
        state: JobState,
        error: Option<String>,
    ) -> Result<(), QueueError> {
        debug_assert!(state.is_terminal());
        let db = self.db.clone();
        let now = self.clock.now();
        let owned_id = job_id.to_string();
        let query = run_blocking(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            let query;
            {
                let mut jobs = write_txn
                    .open_table(JOBS_TABLE)
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                let mut job = match jobs
                    .get(owned_id.as_str())
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?
                {
                    Some(value) => decode_job(value.value())?,
                    None => return Err(QueueError::UnknownJob(owned_id.clone())),
                };
                job.state = state;
                job.completed_at = Some(now);
                if error.is_some() {
                    job.last_error = error;
                }
                query = job.query.clone();
                jobs.insert(owned_id.as_str(), encode_job(&job)?.as_slice())
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;

                let mut active = write_txn
                    .open_table(ACTIVE_TABLE)
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                active
                    .remove(query.as_str())
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;

                if state == JobState::RejectedNoEvidence {
                    let mut negative = write_txn
                        .open_table(NEGATIVE_TABLE)
                        .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                    negative
                        .insert(query.as_str(), now.timestamp_millis())
                        .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            Ok(query)
        })
        .await?;

        metrics::counter!("discovery_jobs_total", "outcome" => state.to_string()).increment(1);
        tracing::info!(job_id, %query, state = %state, "discovery job completed");
        Ok(())
    }

    /// Fresh negative-discovery marker for `query`, if one exists inside the
    /// retention window.
    pub async fn negative_marker(&self, query: &str) -> Result<Option<DateTime<Utc>>, QueueError> {
        let db = self.db.clone();
        let now = self.clock.now();
        let retention = Duration::days(self.cfg.retention_days as i64);
        let query = query.to_string();
        run_blocking(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            let negative = read_txn
                .open_table(NEGATIVE_TABLE)
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            let ts = match negative
                .get(query.as_str())
                .map_err(|e| QueueError::Unavailable(e.to_string()))?
            {
                Some(value) => value.value(),
                None => return Ok(None),
            };
            let rejected_at = DateTime::<Utc>::from_timestamp_millis(ts)
                .ok_or_else(|| QueueError::Codec(format!("bad marker timestamp {ts}")))?;
            if now - rejected_at <= retention {
                Ok(Some(rejected_at))
            } else {
                Ok(None)
            }
        })
        .await
    }

    /// Pending jobs whose `next_attempt_after` has passed, oldest first.
    pub async fn poll_due(&self, limit: usize) -> Result<Vec<DiscoveryJob>, QueueError> {
        let db = self.db.clone();
        let now = self.clock.now();
        run_blocking(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            let jobs = read_txn
                .open_table(JOBS_TABLE)
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            let mut due = Vec::new();
            for item in jobs
                .iter()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?
            {
                let (_, value) = item.map_err(|e| QueueError::Unavailable(e.to_string()))?;
                let job = decode_job(value.value())?;
                if job.is_due(now) {
                    due.push(job);
                }
            }
            due.sort_by(|a, b| a.enqueued_at.cmp(&b.enqueued_at));
            due.truncate(limit);
            Ok(due)
        })
        .await
    }

    /// Current `Pending` population.
    pub async fn pending_count(&self) -> Result<u64, QueueError> {
        let db = self.db.clone();
        run_blocking(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            count_pending_read(&read_txn)
        })
        .await
    }

    /// Remove terminal jobs (and negative markers) older than the retention
    /// window. Returns how many rows were swept.
    pub async fn sweep_terminal(&self) -> Result<usize, QueueError> {
        let db = self.db.clone();
        let now = self.clock.now();
        let retention = Duration::days(self.cfg.retention_days as i64);
        run_blocking(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            let mut removed = 0usize;
            {
                let mut jobs = write_txn
                    .open_table(JOBS_TABLE)
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                let expired: Vec<String> = jobs
                    .iter()
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?
                    .filter_map(|item| item.ok())
                    .filter_map(|(key, value)| {
                        let job = decode_job(value.value()).ok()?;
                        let completed = job.completed_at?;
                        (job.state.is_terminal() && now - completed > retention)
                            .then(|| key.value().to_string())
                    })
                    .collect();
                for key in expired {
                    jobs.remove(key.as_str())
                        .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                    removed += 1;
                }

                let mut negative = write_txn
                    .open_table(NEGATIVE_TABLE)
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                let stale: Vec<String> = negative
                    .iter()
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?
                    .filter_map(|item| item.ok())
                    .filter_map(|(key, value)| {
                        let rejected_at = DateTime::<Utc>::from_timestamp_millis(value.value())?;
                        (now - rejected_at > retention).then(|| key.value().to_string())
                    })
                    .collect();
                for key in stale {
                    negative
                        .remove(key.as_str())
                        .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                    removed += 1;
                }
            }
            write_txn
                .commit()
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            Ok(removed)
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, QueueError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, QueueError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| QueueError::Unavailable(format!("blocking task failed: {e}")))?
}

fn count_pending(write_txn: &redb::WriteTransaction) -> Result<u64, QueueError> {
    let jobs = write_txn
        .open_table(JOBS_TABLE)
        .map_err(|e| QueueError::Unavailable(e.to_string()))?;
    count_pending_in(&jobs)
}

fn count_pending_read(read_txn: &redb::ReadTransaction) -> Result<u64, QueueError> {
    let jobs = read_txn
        .open_table(JOBS_TABLE)
        .map_err(|e| QueueError::Unavailable(e.to_string()))?;
    count_pending_in(&jobs)
}

fn count_pending_in<T: ReadableTable<&'static str, &'static [u8]>>(
    jobs: &T,
) -> Result<u64, QueueError> {
    let mut pending = 0u64;
    for item in jobs
        .iter()
        .map_err(|e| QueueError::Unavailable(e.to_string()))?
    {
        let (_, value) = item.map_err(|e| QueueError::Unavailable(e.to_string()))?;
        if decode_job(value.value())?.state == JobState::Pending {
            pending += 1;
        }
    }
    Ok(pending)
}

fn encode_job(job: &DiscoveryJob) -> Result<Vec<u8>, QueueError> {
    encode_to_vec(job, standard()).map_err(|e| QueueError::Codec(e.to_string()))
}

fn decode_job(bytes: &[u8]) -> Result<DiscoveryJob, QueueError> {
    let (job, _) =
        decode_from_slice(bytes, standard()).map_err(|e| QueueError::Codec(e.to_string()))?;
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiercache::ManualClock;

    fn queue() -> (DiscoveryQueue, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let queue = DiscoveryQueue::in_memory(clock.clone(), QueueConfig::default()).unwrap();
        (queue, clock)
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_for_active_jobs() {
        let (queue, _) = queue();
        let first = queue.enqueue("Quercetin Phytosome").await.unwrap();
        assert!(first.created);

        let second = queue.enqueue("Quercetin Phytosome").await.unwrap();
        assert!(!second.created);
        assert_eq!(first.job_id, second.job_id);

        // Still idempotent while in flight.
        assert!(queue.claim(&first.job_id).await.unwrap());
        let third = queue.enqueue("Quercetin Phytosome").await.unwrap();
        assert!(!third.created);
        assert_eq!(first.job_id, third.job_id);
    }

    #[tokio::test]
    async fn enqueue_emits_event_only_on_creation() {
        let (queue, _) = queue();
        let mut stream = queue.take_stream().unwrap();

        queue.enqueue("Shilajit").await.unwrap();
        queue.enqueue("Shilajit").await.unwrap();

        let event = stream.try_recv().unwrap();
        assert_eq!(event.query, "Shilajit");
        assert!(stream.try_recv().is_err(), "duplicate enqueue must not emit");
    }

    #[tokio::test]
    async fn claim_cas_single_winner() {
        let (queue, _) = queue();
        let outcome = queue.enqueue("Shilajit").await.unwrap();

        assert!(queue.claim(&outcome.job_id).await.unwrap());
        assert!(!queue.claim(&outcome.job_id).await.unwrap());

        let job = queue.get_job(&outcome.job_id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::InFlight);
    }

    #[tokio::test]
    async fn terminal_completion_frees_query() {
        let (queue, _) = queue();
        let first = queue.enqueue("Shilajit").await.unwrap();
        queue.claim(&first.job_id).await.unwrap();
        queue
            .complete(&first.job_id, JobState::Succeeded, None)
            .await
            .unwrap();

        let second = queue.enqueue("Shilajit").await.unwrap();
        assert!(second.created);
        assert_ne!(first.job_id, second.job_id);
    }

    #[tokio::test]
    async fn rejection_writes_negative_marker_with_retention() {
        let (queue, clock) = queue();
        let outcome = queue.enqueue("xyzzy").await.unwrap();
        queue.claim(&outcome.job_id).await.unwrap();
        queue
            .complete(&outcome.job_id, JobState::RejectedNoEvidence, None)
            .await
            .unwrap();

        assert!(queue.negative_marker("xyzzy").await.unwrap().is_some());
        assert!(queue.negative_marker("other").await.unwrap().is_none());

        // Past the retention window the marker no longer applies.
        clock.advance(Duration::days(31));
        assert!(queue.negative_marker("xyzzy").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retry_release_defers_job() {
        let (queue, clock) = queue();
        let outcome = queue.enqueue("Shilajit").await.unwrap();
        queue.claim(&outcome.job_id).await.unwrap();

        let later = clock.now() + Duration::seconds(60);
        queue
            .release_for_retry(&outcome.job_id, "pubmed 503".into(), later)
            .await
            .unwrap();

        let job = queue.get_job(&outcome.job_id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error.as_deref(), Some("pubmed 503"));

        // Not due yet, then due after the clock passes the deadline.
        assert!(queue.poll_due(10).await.unwrap().is_empty());
        clock.advance(Duration::seconds(61));
        let due = queue.poll_due(10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].job_id, outcome.job_id);
    }

    #[tokio::test]
    async fn pending_count_and_sweep() {
        let (queue, clock) = queue();
        queue.enqueue("one").await.unwrap();
        queue.enqueue("two").await.unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), 2);

        let done = queue.enqueue("three").await.unwrap();
        queue.claim(&done.job_id).await.unwrap();
        queue
            .complete(&done.job_id, JobState::Failed, Some("permanent".into()))
            .await
            .unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), 2);

        // Terminal rows are retained inside the window...
        assert_eq!(queue.sweep_terminal().await.unwrap(), 0);
        // ...and swept after it.
        clock.advance(Duration::days(31));
        assert_eq!(queue.sweep_terminal().await.unwrap(), 1);
        assert!(queue.get_job(&done.job_id).await.unwrap().is_none());
    }
}
