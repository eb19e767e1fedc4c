//! PubMed E-utilities client with a token-bucket throttle.
//!
//! NCBI allows 3 requests/second without an API key and 10 with one; the
//! bucket enforces the sustained rate with a small burst allowance, and every
//! call carries a hard 10 s timeout. Responses are classified into transient
//! (retry with backoff) and permanent (fail the job) per the worker's
//! contract.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::PubMedError;

/// Seam between the worker and PubMed. Tests script this trait.
#[async_trait]
pub trait PubMedSearch: Send + Sync {
    /// Number of studies matching `query`.
    async fn study_count(&self, query: &str) -> Result<u32, PubMedError>;
}

/// PubMed client configuration.
#[derive(Debug, Clone, serde::Serialize, Deserialize, PartialEq)]
pub struct PubMedConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// NCBI API key; raises the sustained rate from 3 to 10 req/s.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Token bucket enforcing a sustained request rate with a burst allowance.
pub struct TokenBucket {
    rate_per_second: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_second: f64, burst: u32) -> Self {
        Self {
            rate_per_second,
            burst: burst as f64,
            state: Mutex::new(BucketState {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token, sleeping until the bucket refills if necessary.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate_per_second).min(self.burst);
                state.last_refill = Instant::now();
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64(
                        (1.0 - state.tokens) / self.rate_per_second,
                    ))
                }
            };
            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ESearchEnvelope {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    /// NCBI serializes the count as a string.
    count: String,
}

/// Real HTTPS client against the NCBI `esearch` endpoint.
pub struct PubMedClient {
    cfg: PubMedConfig,
    http: reqwest::Client,
    bucket: TokenBucket,
}

impl PubMedClient {
    pub fn new(cfg: PubMedConfig) -> Result<Self, PubMedError> {
        let timeout = Duration::from_millis(cfg.timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PubMedError::Permanent(e.to_string()))?;
        // 3 req/s keyless, 10 req/s with an API key, per NCBI's limits.
        let bucket = if cfg.api_key.is_some() {
            TokenBucket::new(10.0, 3)
        } else {
            TokenBucket::new(3.0, 2)
        };
        Ok(Self { cfg, http, bucket })
    }
}

#[async_trait]
impl PubMedSearch for PubMedClient {
    async fn study_count(&self, query: &str) -> Result<u32, PubMedError> {
        self.bucket.acquire().await;

        let mut params: Vec<(&str, &str)> = vec![
            ("db", "pubmed"),
            ("term", query),
            ("retmode", "json"),
            ("retmax", "0"),
        ];
        if let Some(key) = &self.cfg.api_key {
            params.push(("api_key", key));
        }

        let response = self
            .http
            .get(&self.cfg.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    PubMedError::Transient(e.to_string())
                } else {
                    PubMedError::Permanent(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(PubMedError::Transient(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(PubMedError::Permanent(format!("status {status}")));
        }

        let envelope: ESearchEnvelope = response
            .json()
            .await
            .map_err(|e| PubMedError::Permanent(format!("bad esearch body: {e}")))?;
        envelope
            .esearchresult
            .count
            .parse::<u32>()
            .map_err(|e| PubMedError::Permanent(format!("bad count field: {e}")))
    }
}
