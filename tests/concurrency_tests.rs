//! Concurrency behavior of the assembled service: single-flight collapse
//! and cross-query isolation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use discovery::{PubMedError, PubMedSearch};
use embedder::{EmbedError, EmbedService, Embedder, EmbedderConfig, Embedding};
use suppsearch::{Config, EvidenceGrade, SearchService, SearchStatus, UpsertMetadata};

struct CountingEmbedder {
    inner: Embedder,
    calls: AtomicU32,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            inner: Embedder::new(EmbedderConfig::default()),
            calls: AtomicU32::new(0),
        }
    }
}

impl EmbedService for CountingEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text)
    }
}

struct OfflinePubMed;

#[async_trait]
impl PubMedSearch for OfflinePubMed {
    async fn study_count(&self, _query: &str) -> Result<u32, PubMedError> {
        Err(PubMedError::Transient("offline".into()))
    }
}

async fn counting_service() -> (SearchService, Arc<CountingEmbedder>) {
    let embedder = Arc::new(CountingEmbedder::new());
    let service = SearchService::builder(Config::default())
        .with_embedder(embedder.clone())
        .with_pubmed(Arc::new(OfflinePubMed))
        .start()
        .await
        .unwrap();
    service
        .searcher()
        .upsert_supplement(
            "Creatine",
            vec![],
            UpsertMetadata {
                evidence_grade: EvidenceGrade::A,
                study_count: 3200,
                category: Some("performance".into()),
            },
        )
        .await
        .unwrap();
    (service, embedder)
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_identical_cold_queries_collapse_to_one_flight() {
    let (service, embedder) = counting_service().await;
    let service = Arc::new(service);
    let after_seed = embedder.calls.load(Ordering::SeqCst);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.search("creatina", None).await.unwrap() })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status, SearchStatus::Found);
        ids.push(response.supplement.unwrap().id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 1, "every caller must see the same row");

    assert_eq!(
        embedder.calls.load(Ordering::SeqCst) - after_seed,
        1,
        "sixteen identical cold queries must produce exactly one embedding call"
    );

    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn distinct_queries_run_independently() {
    let (service, _embedder) = counting_service().await;
    let service = Arc::new(service);
    for name in ["Zinc", "Iron"] {
        service
            .searcher()
            .upsert_supplement(
                name,
                vec![],
                UpsertMetadata {
                    evidence_grade: EvidenceGrade::A,
                    study_count: 5000,
                    category: None,
                },
            )
            .await
            .unwrap();
    }

    let queries = ["creatina", "zinc", "hierro"];
    let handles: Vec<_> = queries
        .iter()
        .map(|q| {
            let service = service.clone();
            let q = q.to_string();
            tokio::spawn(async move { service.search(&q, None).await.unwrap() })
        })
        .collect();

    let mut names = Vec::new();
    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status, SearchStatus::Found);
        names.push(response.supplement.unwrap().canonical_name);
    }
    names.sort();
    assert_eq!(names, vec!["Creatine", "Iron", "Zinc"]);

    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_unknown_queries_enqueue_one_job() {
    let (service, _embedder) = counting_service().await;
    let service = Arc::new(service);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                service.search("quercetin phytosome", None).await.unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().status, SearchStatus::Processing);
    }

    // The offline PubMed stub keeps the job non-terminal, so the count is
    // stable: the single-flight plus idempotent enqueue produced one job.
    let pending = service.queue().pending_count().await.unwrap();
    assert!(pending <= 1, "at most one active job, saw {pending} pending");

    service.shutdown().await;
}
