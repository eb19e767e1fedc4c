//! Service assembly: one `Config` in, a wired search service out.
//!
//! The builder owns the construction order the subsystems assume: clock →
//! normalizer → embedder → store → cache tiers → queue → searcher → worker,
//! with the worker's stream taken from the queue exactly once and the worker
//! task spawned on the current runtime. Seams (clock, PubMed, embedder) are
//! overridable for tests and unusual deployments.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use discovery::{
    DiscoveryQueue, DiscoveryWorker, PubMedClient, PubMedSearch, QueueConfig, WorkerConfig,
};
use embedder::{EmbedService, Embedder, EmbedderConfig};
use normalizer::{Normalizer, NormalizerConfig};
use searcher::{RequestContext, SearchError, SearchResponse, Searcher, SearcherConfig};
use tiercache::{Clock, L1Cache, L2Cache, SystemClock, TieredCache};
use vecstore::{AnnConfig, BackendConfig, StoreConfig, VectorStore};

use crate::config::Config;

/// Startup failures. Once the service is running, errors flow through the
/// per-subsystem types instead.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("normalizer startup failed: {0}")]
    Normalizer(#[from] normalizer::NormalizeError),

    #[error("store startup failed: {0}")]
    Store(#[from] vecstore::StoreError),

    #[error("cache startup failed: {0}")]
    Cache(#[from] tiercache::CacheError),

    #[error("queue startup failed: {0}")]
    Queue(#[from] discovery::QueueError),

    #[error("pubmed client startup failed: {0}")]
    PubMed(String),

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

/// The assembled service: searcher plus the background discovery worker.
pub struct SearchService {
    config: Config,
    searcher: Arc<Searcher>,
    store: Arc<VectorStore>,
    cache: Arc<TieredCache>,
    queue: Arc<DiscoveryQueue>,
    worker: Arc<DiscoveryWorker>,
    worker_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl SearchService {
    pub fn builder(config: Config) -> ServiceBuilder {
        ServiceBuilder {
            config,
            clock: None,
            pubmed: None,
            embedder: None,
        }
    }

    /// Start with production wiring (system clock, HTTPS PubMed client).
    pub async fn start(config: Config) -> Result<Self, ServiceError> {
        Self::builder(config).start().await
    }

    /// Run one search with the service-wide deadline, minting a correlation
    /// id when the boundary didn't pass one.
    pub async fn search(
        &self,
        query: &str,
        correlation_id: Option<String>,
    ) -> Result<SearchResponse, SearchError> {
        let ctx = RequestContext::new(correlation_id, self.searcher.config().request_timeout());
        self.searcher.search(query, ctx).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn searcher(&self) -> &Arc<Searcher> {
        &self.searcher
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<DiscoveryQueue> {
        &self.queue
    }

    pub fn worker(&self) -> &Arc<DiscoveryWorker> {
        &self.worker
    }

    /// Drain sequence: signal the worker, let it finish its in-flight job
    /// and one final due pass, then reap the task. Callers stop feeding
    /// requests before invoking this.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let task = self
            .worker_task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "worker task join failed");
            }
        }
        tracing::info!("search service drained");
    }
}

pub struct ServiceBuilder {
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    pubmed: Option<Arc<dyn PubMedSearch>>,
    embedder: Option<Arc<dyn EmbedService>>,
}

impl ServiceBuilder {
    /// Override the time source (tests use a manual clock).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Override the PubMed seam (tests script it).
    pub fn with_pubmed(mut self, pubmed: Arc<dyn PubMedSearch>) -> Self {
        self.pubmed = Some(pubmed);
        self
    }

    /// Override the embedding service.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbedService>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub async fn start(self) -> Result<SearchService, ServiceError> {
        let config = self.config;
        config.validate().map_err(ServiceError::Config)?;

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let normalizer = Arc::new(Normalizer::new(NormalizerConfig {
            max_query_chars: 200,
            dictionary_path: config.dictionary_path.clone(),
            llm_endpoint: config.llm_endpoint.clone(),
            llm_timeout_ms: config.llm_timeout_ms,
        })?);

        let embedder: Arc<dyn EmbedService> = match self.embedder {
            Some(embedder) => embedder,
            None => Arc::new(Embedder::new(EmbedderConfig {
                mode: config.embed_mode,
                model_artifact_path: config.model_artifact_path.clone(),
                ..Default::default()
            })),
        };

        let store_backend = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                BackendConfig::redb(dir.join("supplements.redb"))
            }
            None => BackendConfig::in_memory(),
        };
        let store = Arc::new(VectorStore::open(StoreConfig {
            backend: store_backend,
            dimension: config.embedding_dim,
            ann: AnnConfig::default(),
        })?);

        let l1 = Arc::new(L1Cache::new(config.l1_capacity, clock.clone()));
        let l2 = match &config.data_dir {
            Some(dir) => Arc::new(L2Cache::open(dir.join("cache.redb"), clock.clone())?),
            None => Arc::new(L2Cache::in_memory(clock.clone())?),
        };
        let cache = Arc::new(TieredCache::new(
            l1,
            l2,
            clock.clone(),
            config.cache_ttl_days,
        ));

        let queue_config = QueueConfig {
            backlog_alert_threshold: config.backlog_alert_threshold,
            retention_days: config.retention_days,
        };
        let queue = match &config.data_dir {
            Some(dir) => Arc::new(DiscoveryQueue::open(
                dir.join("discovery.redb"),
                clock.clone(),
                queue_config,
            )?),
            None => Arc::new(DiscoveryQueue::in_memory(clock.clone(), queue_config)?),
        };
        let stream = queue
            .take_stream()
            .ok_or_else(|| ServiceError::Config("queue stream already taken".into()))?;

        let searcher = Arc::new(Searcher::new(
            normalizer.clone(),
            embedder.clone(),
            store.clone(),
            cache.clone(),
            queue.clone(),
            SearcherConfig {
                similarity_threshold: config.similarity_threshold,
                ann_k: config.ann_k,
                request_timeout_ms: config.request_timeout_ms,
                ..Default::default()
            },
        ));

        let pubmed: Arc<dyn PubMedSearch> = match self.pubmed {
            Some(pubmed) => pubmed,
            None => Arc::new(
                PubMedClient::new(config.pubmed.clone())
                    .map_err(|e| ServiceError::PubMed(e.to_string()))?,
            ),
        };

        let worker = Arc::new(DiscoveryWorker::new(
            queue.clone(),
            pubmed,
            embedder,
            store.clone(),
            cache.clone(),
            normalizer,
            clock,
            WorkerConfig {
                max_attempts: config.worker_max_attempts,
                evidence_thresholds: config.evidence_thresholds,
                ..Default::default()
            },
        ));

        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker_task = tokio::spawn(worker.clone().run(stream, shutdown_rx));

        tracing::info!(
            rows = store.len(),
            similarity_threshold = config.similarity_threshold,
            "search service started"
        );

        Ok(SearchService {
            config,
            searcher,
            store,
            cache,
            queue,
            worker,
            worker_task: Mutex::new(Some(worker_task)),
            shutdown,
        })
    }
}
