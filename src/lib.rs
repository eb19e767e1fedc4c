//! Semantic supplement search with auto-discovery.
//!
//! Umbrella crate tying the subsystem crates into one service. A free-text
//! query (Spanish or English, typos and all) flows through:
//!
//! 1. **Normalization** ([`normalizer`]): cleaning, dictionary, fuzzy and
//!    compound matching, optional time-boxed LLM fallback.
//! 2. **Tiered cache** ([`tiercache`]): in-process LRU over a durable
//!    7-day-TTL table, keyed by query fingerprint.
//! 3. **Vector search** ([`vecstore`] + [`embedder`]): 384-d unit
//!    embeddings, HNSW/linear ANN with a 0.85 cosine floor, single-flight
//!    deduplication of concurrent identical misses.
//! 4. **Discovery** ([`discovery`]): unknown queries become durable jobs; a
//!    worker validates them against PubMed, grades the evidence, inserts the
//!    new supplement, and invalidates the cache keys it was hiding behind.
//!
//! [`SearchService`] assembles all of it from one [`Config`]:
//!
//! ```no_run
//! use suppsearch::{bootstrap_seeds, Config, SearchService};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = SearchService::start(Config::default()).await?;
//!     bootstrap_seeds(&service).await?;
//!
//!     let response = service.search("vitamina d", None).await?;
//!     println!("{:?} {:?}", response.status, response.supplement);
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! The HTTP boundary lives in the `suppsearch-server` crate; everything here
//! is callable in-process.

pub mod config;
pub mod seeds;
pub mod service;

pub use crate::config::Config;
pub use crate::seeds::{bootstrap_seeds, SeedSupplement, SEED_SUPPLEMENTS};
pub use crate::service::{SearchService, ServiceBuilder, ServiceError};

// The vocabulary types callers interact with, re-exported so applications
// depend on one crate.
pub use discovery::{DiscoveryJob, EvidenceThresholds, JobState, PubMedConfig};
pub use embedder::{EmbedMode, EMBEDDING_DIM};
pub use normalizer::{Fingerprint, NormalizeMethod, Normalized};
pub use searcher::{
    AdminError, RequestContext, SearchError, SearchResponse, SearchStatus, UpsertMetadata,
};
pub use tiercache::SourceTier;
pub use vecstore::{EvidenceGrade, Supplement, SupplementMetadata};
