use std::sync::Arc;

use suppsearch::SearchService;

use crate::config::ServerConfig;

/// Shared application state: the assembled core service plus the boundary
/// config. All request handlers receive this via axum state.
pub struct AppState {
    pub config: ServerConfig,
    pub service: SearchService,
}

impl AppState {
    pub fn new(config: ServerConfig, service: SearchService) -> Arc<Self> {
        Arc::new(Self { config, service })
    }
}
