use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use suppsearch::Config as ServiceConfig;

/// HTTP-boundary configuration, layered on top of the core service config.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log filter (env-filter syntax).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Serve Prometheus metrics on `/metrics`.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Run the seed bootstrap at startup when the store is empty.
    #[serde(default = "default_true")]
    pub bootstrap_seeds: bool,

    /// Core service configuration.
    #[serde(default)]
    pub service: ServiceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            log_level: default_log_level(),
            metrics_enabled: default_true(),
            bootstrap_seeds: default_true(),
            service: ServiceConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `suppsearch.toml` (optional) overridden by
    /// `SUPP__`-prefixed environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("suppsearch").required(false))
            .add_source(config::Environment::with_prefix("SUPP").separator("__"));
        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.service.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.bind_addr, self.port).parse()?)
    }

    /// Request timeout mirrors the core deadline so the HTTP layer cuts a
    /// request off at the same instant the pipeline would.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.service.request_timeout_ms)
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
