//! Search orchestration.
//!
//! One request walks a fixed state machine:
//!
//! ```text
//! Normalized → CacheLookup → (Hit | EmbedAndSearch) → (Match | EnqueueDiscovery) → Respond
//! ```
//!
//! The orchestrator owns the glue the individual subsystems deliberately
//! don't: the confidence gate in front of the cache, the single-flight
//! discipline that collapses concurrent identical misses onto one embedding
//! and one ANN call, the write-through after a live match, the idempotent
//! discovery enqueue on a miss, and the per-request deadline every external
//! call inherits. Cancelling a request (deadline expiry) drops the flight
//! guard and performs no cache write.
//!
//! The admin ingest path ([`Searcher::upsert_supplement`]) shares the same
//! embedding recipe as the discovery worker and fires a global cache flush
//! after inserting curated rows.

pub mod admin;
pub mod context;
pub mod error;
pub mod response;
pub mod searcher;
pub mod singleflight;

pub use crate::admin::{UpsertMetadata, UpsertOutcome};
pub use crate::context::RequestContext;
pub use crate::error::{AdminError, SearchError};
pub use crate::response::{SearchResponse, SearchStatus};
pub use crate::searcher::{Searcher, SearcherConfig};
pub use crate::singleflight::SharedFlights;
