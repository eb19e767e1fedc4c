//! HTTP boundary for the supplement search service.
//!
//! Thin adapters only: handlers validate the wire shape, thread the
//! correlation id, and translate core outcomes onto HTTP statuses. All
//! search, discovery, and ingest logic lives in the core crates behind
//! [`suppsearch::SearchService`].

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use crate::config::ServerConfig;
pub use crate::error::{ServerError, ServerResult};
pub use crate::server::{build_router, start_server};
pub use crate::state::AppState;
