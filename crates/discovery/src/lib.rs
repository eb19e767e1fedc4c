//! Discovery queue and worker.
//!
//! Queries that miss the vector search below the similarity floor land here
//! as durable jobs. A worker consumes the queue's change stream (plus a
//! periodic due-job poll for retries), validates each query against PubMed,
//! grades the evidence by study count, generates an embedding, inserts the
//! new supplement, and invalidates the cache keys the query was hiding
//! behind. Rejected queries leave a negative-discovery marker so repeat
//! traffic inside the retention window does not re-hit PubMed.
//!
//! Worker failures never reach users: they move job state, emit structured
//! logs, and bump metrics. Transient failures (PubMed 429/5xx/timeouts,
//! store unavailability) retry with exponential backoff and ±20% jitter up
//! to the attempt budget; permanent ones fail the job.

pub mod error;
pub mod grade;
pub mod job;
pub mod pubmed;
pub mod queue;
pub mod worker;

pub use crate::error::{PubMedError, QueueError};
pub use crate::grade::{grade, EvidenceThresholds, Grading};
pub use crate::job::{DiscoveryJob, JobEvent, JobState};
pub use crate::pubmed::{PubMedClient, PubMedConfig, PubMedSearch, TokenBucket};
pub use crate::queue::{DiscoveryQueue, EnqueueOutcome, QueueConfig};
pub use crate::worker::{DiscoveryWorker, WorkerConfig};
