//! The request pipeline: normalize → cache → single-flight → embed → ANN →
//! write-through or discovery enqueue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use discovery::DiscoveryQueue;
use embedder::EmbedService;
use normalizer::{NormalizeError, Normalized, Normalizer};
use tiercache::{SourceTier, TieredCache};
use vecstore::{SearchHit, StoreError, VectorStore};

use crate::context::RequestContext;
use crate::error::SearchError;
use crate::response::{SearchResponse, SearchStatus};
use crate::singleflight::SharedFlights;

/// Orchestrator tunables; defaults match the product contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearcherConfig {
    /// Cosine floor below which a result is not a match.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Candidates requested from the ANN per search.
    #[serde(default = "default_ann_k")]
    pub ann_k: usize,

    /// Total request deadline.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Extra attempts against an unavailable store before surfacing a 503.
    #[serde(default = "default_store_retry_attempts")]
    pub store_retry_attempts: u32,

    /// Normalization confidence floor; below it the query is invalid.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            ann_k: default_ann_k(),
            request_timeout_ms: default_request_timeout_ms(),
            store_retry_attempts: default_store_retry_attempts(),
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.85
}

fn default_ann_k() -> usize {
    5
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_store_retry_attempts() -> u32 {
    2
}

fn default_min_confidence() -> f32 {
    0.3
}

impl SearcherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

pub struct Searcher {
    normalizer: Arc<Normalizer>,
    embedder: Arc<dyn EmbedService>,
    store: Arc<VectorStore>,
    cache: Arc<TieredCache>,
    queue: Arc<DiscoveryQueue>,
    flights: SharedFlights,
    cfg: SearcherConfig,
}

impl Searcher {
    pub fn new(
        normalizer: Arc<Normalizer>,
        embedder: Arc<dyn EmbedService>,
        store: Arc<VectorStore>,
        cache: Arc<TieredCache>,
        queue: Arc<DiscoveryQueue>,
        cfg: SearcherConfig,
    ) -> Self {
        Self {
            normalizer,
            embedder,
            store,
            cache,
            queue,
            flights: SharedFlights::default(),
            cfg,
        }
    }

    pub fn config(&self) -> &SearcherConfig {
        &self.cfg
    }

    pub(crate) fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub(crate) fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub(crate) fn embedder(&self) -> &Arc<dyn EmbedService> {
        &self.embedder
    }

    /// Run one search. `Err` is reserved for surfaced failures (model down,
    /// store down, deadline); invalid queries and discovery enqueues are
    /// regular responses.
    pub async fn search(
        &self,
        raw_query: &str,
        ctx: RequestContext,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();

        // Stage 1: normalization, including the time-boxed LLM fallback.
        let normalized = match self.normalizer.normalize_with_fallback(raw_query).await {
            Ok(normalized) if normalized.confidence >= self.cfg.min_confidence => normalized,
            Ok(normalized) => {
                tracing::info!(
                    correlation_id = %ctx.correlation_id,
                    query = raw_query,
                    confidence = normalized.confidence,
                    "query below confidence floor"
                );
                return Ok(self.respond(&ctx, started, SearchStatus::Invalid, None, SourceTier::None));
            }
            Err(NormalizeError::InvalidQuery { length, max }) => {
                tracing::info!(
                    correlation_id = %ctx.correlation_id,
                    length,
                    max,
                    "query failed length gate"
                );
                return Ok(self.respond(&ctx, started, SearchStatus::Invalid, None, SourceTier::None));
            }
            Err(err) => return Err(SearchError::Internal(err.to_string())),
        };

        let fingerprint = normalized.fingerprint();

        // Stage 2: tiered cache.
        if let Some(response) = self.try_cached(&ctx, started, &fingerprint).await? {
            return Ok(response);
        }

        // Stage 3: collapse concurrent identical misses.
        let remaining = ctx.remaining();
        if remaining.is_zero() {
            return Err(SearchError::DeadlineExceeded);
        }
        let (flight, leader) = tokio::time::timeout(remaining, self.flights.acquire(fingerprint))
            .await
            .map_err(|_| SearchError::DeadlineExceeded)?;

        // Double-checked: a joiner reads what the leader just wrote.
        if let Some(response) = self.try_cached(&ctx, started, &fingerprint).await? {
            drop(flight);
            return Ok(response);
        }
        if !leader {
            tracing::debug!(
                correlation_id = %ctx.correlation_id,
                fingerprint = %fingerprint,
                "joined flight but cache still cold, recomputing"
            );
        }

        // Stage 4: embed (CPU-bound, off the async threads) and ANN.
        let embedding = self.embed_with_deadline(&ctx, &normalized).await?;
        let hits = self.ann_with_retry(&ctx, &embedding).await?;

        // Stage 5: match or discovery.
        match hits.into_iter().next() {
            Some(best) => {
                self.cache
                    .put(&fingerprint, best.supplement.id.clone(), best.similarity)
                    .await;
                drop(flight);
                Ok(self.respond(
                    &ctx,
                    started,
                    SearchStatus::Found,
                    Some(best),
                    SourceTier::Vector,
                ))
            }
            None => {
                drop(flight);
                match self.queue.enqueue(&normalized.canonical).await {
                    Ok(outcome) => {
                        tracing::info!(
                            correlation_id = %ctx.correlation_id,
                            query = %normalized.canonical,
                            job_id = %outcome.job_id,
                            created = outcome.created,
                            "no match above floor, discovery covers the query"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(
                            correlation_id = %ctx.correlation_id,
                            query = %normalized.canonical,
                            error = %err,
                            "discovery enqueue failed"
                        );
                        metrics::counter!("errors_total", "kind" => "enqueue_failed").increment(1);
                    }
                }
                Ok(self.respond(&ctx, started, SearchStatus::Processing, None, SourceTier::None))
            }
        }
    }

    async fn try_cached(
        &self,
        ctx: &RequestContext,
        started: Instant,
        fingerprint: &normalizer::Fingerprint,
    ) -> Result<Option<SearchResponse>, SearchError> {
        let Some((entry, tier)) = self.cache.get(fingerprint).await else {
            return Ok(None);
        };
        // The row behind a cached id can disappear (store rebuild); treat a
        // dangling entry as a miss and let the live path repopulate.
        match self.store.get_by_id(&entry.supplement_id) {
            Ok(Some(supplement)) => {
                metrics::counter!("cache_hits_total", "tier" => tier.to_string()).increment(1);
                let hit = SearchHit {
                    similarity: entry.similarity,
                    supplement,
                };
                Ok(Some(self.respond(ctx, started, SearchStatus::Found, Some(hit), tier)))
            }
            Ok(None) => {
                let _ = self.cache.delete(fingerprint).await;
                Ok(None)
            }
            Err(err) if err.is_retryable() => {
                tracing::warn!(correlation_id = %ctx.correlation_id, error = %err, "store read behind cache hit failed");
                Ok(None)
            }
            Err(err) => Err(SearchError::Internal(err.to_string())),
        }
    }

    async fn embed_with_deadline(
        &self,
        ctx: &RequestContext,
        normalized: &Normalized,
    ) -> Result<embedder::Embedding, SearchError> {
        let remaining = ctx.remaining();
        if remaining.is_zero() {
            return Err(SearchError::DeadlineExceeded);
        }
        let embedder = self.embedder.clone();
        let text = normalized.canonical.clone();
        let task = tokio::task::spawn_blocking(move || embedder.embed(&text));
        match tokio::time::timeout(remaining, task).await {
            Ok(Ok(Ok(embedding))) => Ok(embedding),
            Ok(Ok(Err(embedder::EmbedError::ModelUnavailable(reason)))) => {
                metrics::counter!("errors_total", "kind" => "model_unavailable").increment(1);
                Err(SearchError::ModelUnavailable(reason))
            }
            Ok(Ok(Err(err))) => Err(SearchError::Internal(err.to_string())),
            Ok(Err(join_err)) => Err(SearchError::Internal(join_err.to_string())),
            Err(_) => Err(SearchError::DeadlineExceeded),
        }
    }

    /// ANN with a bounded retry against a transiently unavailable store.
    async fn ann_with_retry(
        &self,
        ctx: &RequestContext,
        embedding: &embedder::Embedding,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let mut attempt = 0u32;
        loop {
            match self.store.ann(
                &embedding.vector,
                self.cfg.ann_k,
                self.cfg.similarity_threshold,
            ) {
                Ok(hits) => return Ok(hits),
                Err(err @ StoreError::Unavailable(_)) if attempt < self.cfg.store_retry_attempts => {
                    attempt += 1;
                    let base = 100u64 * (1 << attempt);
                    let jitter = 0.8 + fastrand::f64() * 0.4;
                    let delay = Duration::from_millis((base as f64 * jitter) as u64);
                    tracing::warn!(
                        correlation_id = %ctx.correlation_id,
                        attempt,
                        error = %err,
                        "store unavailable, retrying"
                    );
                    if ctx.remaining() < delay {
                        return Err(SearchError::DeadlineExceeded);
                    }
                    tokio::time::sleep(delay).await;
                }
                Err(StoreError::Unavailable(reason)) => {
                    metrics::counter!("errors_total", "kind" => "store_unavailable").increment(1);
                    return Err(SearchError::StoreUnavailable(reason));
                }
                Err(err) => return Err(SearchError::Internal(err.to_string())),
            }
        }
    }

    fn respond(
        &self,
        ctx: &RequestContext,
        started: Instant,
        status: SearchStatus,
        hit: Option<SearchHit>,
        tier: SourceTier,
    ) -> SearchResponse {
        let latency_ms = started.elapsed().as_millis() as u64;
        metrics::counter!("search_requests_total", "status" => status.to_string()).increment(1);
        metrics::histogram!("search_latency_ms").record(latency_ms as f64);

        tracing::info!(
            correlation_id = %ctx.correlation_id,
            component = "searcher",
            operation = "search",
            outcome = %status,
            tier = %tier,
            latency_ms,
            "search completed"
        );

        let (supplement, similarity) = match hit {
            Some(hit) => (Some(hit.supplement), Some(hit.similarity)),
            None => (None, None),
        };
        SearchResponse {
            status,
            supplement,
            similarity,
            source_tier: tier,
            latency_ms,
            correlation_id: ctx.correlation_id.clone(),
        }
    }
}
