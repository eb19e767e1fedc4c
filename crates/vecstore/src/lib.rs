//! Supplement vector store.
//!
//! Persists supplement rows (identity, aliases, evidence metadata, and a
//! 384-d unit embedding) behind a pluggable key-value backend and answers two
//! queries: exact lookup by canonical name and approximate nearest neighbor
//! search by cosine similarity.
//!
//! Rows are bincode-encoded and zstd-compressed before hitting the backend.
//! The name index and the ANN graph are memory-resident, rebuilt from a scan
//! at open, so the backend stays a dumb KV. The ANN layer switches from an
//! exact linear scan to an HNSW graph once the corpus is large enough for the
//! graph to pay for itself; reported similarities are always exact dot
//! products.
//!
//! Failure contract: backend I/O problems surface as
//! [`StoreError::Unavailable`] (retryable), constraint violations as
//! [`StoreError::Duplicate`] / [`StoreError::InvalidEmbedding`] (not
//! retryable).

pub mod ann;
pub mod backend;
pub mod error;
pub mod store;
pub mod supplement;

pub use crate::ann::{AnnConfig, AnnHit};
pub use crate::backend::{BackendConfig, InMemoryBackend, StoreBackend};
pub use crate::error::StoreError;
pub use crate::store::{SearchHit, StoreConfig, VectorStore, NORM_EPSILON};
pub use crate::supplement::{
    EvidenceGrade, Supplement, SupplementMetadata, ROW_SCHEMA_VERSION,
};
