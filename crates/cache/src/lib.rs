//! Tiered result cache for supplement search.
//!
//! Two co-operating tiers front the vector store:
//!
//! - **L1**: in-process LRU, microsecond lookups, volatile, capacity-bound.
//! - **L2**: durable redb table, millisecond lookups, 7-day TTL.
//!
//! Keys are 128-bit query fingerprints ([`normalizer::Fingerprint`]); values
//! are immutable [`CacheEntry`] records stamped with their expiry. The
//! [`TieredCache`] composition reads L1 → L2 (promoting L2 hits), writes
//! through L2 then L1, and treats tier failures as degradation rather than
//! request failure, except deletion, where an L2 failure is surfaced so the
//! discovery worker can retry invalidation until it sticks.
//!
//! All expiry decisions flow through the [`Clock`] seam so the 7-day TTL is
//! testable with a simulated clock.

pub mod clock;
pub mod entry;
pub mod error;
pub mod l1;
pub mod l2;
pub mod tier;
pub mod tiered;

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::entry::{CacheEntry, SourceTier};
pub use crate::error::CacheError;
pub use crate::l1::L1Cache;
pub use crate::l2::L2Cache;
pub use crate::tier::CacheTier;
pub use crate::tiered::TieredCache;
