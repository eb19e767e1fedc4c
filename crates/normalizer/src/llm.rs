//! Optional LLM normalization fallback.
//!
//! The fallback is a single time-boxed call made only after the dictionary,
//! fuzzy, and compound stages have all missed. Anything other than a
//! well-formed `{"normalized": "..."}` response inside the budget is treated
//! as a failure and the pipeline moves on; the fallback can slow a cold query
//! down but can never fail it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::LlmError;

/// Seam for the LLM normalization call. Production uses [`HttpLlmClient`];
/// tests script this trait directly.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Ask the model for the canonical supplement name behind `query`.
    async fn normalize(&self, query: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Deserialize)]
struct LlmResponse {
    normalized: String,
}

/// HTTP-backed [`LlmClient`] posting `{"query": ...}` to a configured
/// endpoint and accepting only `{"normalized": ...}` back.
pub struct HttpLlmClient {
    endpoint: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpLlmClient {
    /// Build a client with a hard per-call timeout. The timeout is enforced
    /// both on the reqwest client and with an outer `tokio::time::timeout`,
    /// so a stalled DNS lookup or connect cannot blow the budget either.
    pub fn new(endpoint: String, timeout_ms: u64) -> Result<Self, LlmError> {
        let timeout = Duration::from_millis(timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;
        Ok(Self {
            endpoint,
            timeout,
            http,
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn normalize(&self, query: &str) -> Result<String, LlmError> {
        let request = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "query": query }))
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| LlmError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    LlmError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LlmError::Request(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let body: LlmResponse = response
            .json()
            .await
            .map_err(|e| LlmError::BadResponse(e.to_string()))?;

        let normalized = body.normalized.trim();
        if normalized.is_empty() {
            return Err(LlmError::BadResponse("empty normalized field".into()));
        }
        Ok(normalized.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedLlm(Result<String, LlmError>);

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn normalize(&self, _query: &str) -> Result<String, LlmError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn trait_object_is_usable() {
        let client: Box<dyn LlmClient> = Box::new(ScriptedLlm(Ok("Quercetin Phytosome".into())));
        let out = client.normalize("quercetin fitosoma").await.unwrap();
        assert_eq!(out, "Quercetin Phytosome");
    }

    #[tokio::test]
    async fn scripted_failure_propagates() {
        let client = ScriptedLlm(Err(LlmError::Timeout { timeout_ms: 5000 }));
        assert!(matches!(
            client.normalize("anything").await,
            Err(LlmError::Timeout { .. })
        ));
    }
}
