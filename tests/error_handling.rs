//! Error surfacing contracts: which failures reach callers and which
//! degrade silently.

use std::sync::Arc;

use async_trait::async_trait;

use discovery::{PubMedError, PubMedSearch};
use embedder::{EmbedError, EmbedService, Embedding};
use suppsearch::{
    AdminError, Config, EvidenceGrade, SearchError, SearchService, SearchStatus, UpsertMetadata,
};

struct OfflinePubMed;

#[async_trait]
impl PubMedSearch for OfflinePubMed {
    async fn study_count(&self, _query: &str) -> Result<u32, PubMedError> {
        Err(PubMedError::Transient("offline".into()))
    }
}

/// Embedder whose model never loads.
struct BrokenEmbedder;

impl EmbedService for BrokenEmbedder {
    fn embed(&self, _text: &str) -> Result<Embedding, EmbedError> {
        Err(EmbedError::ModelUnavailable("artifacts missing".into()))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn model_unavailable_surfaces_on_cold_queries() {
    let service = SearchService::builder(Config::default())
        .with_embedder(Arc::new(BrokenEmbedder))
        .with_pubmed(Arc::new(OfflinePubMed))
        .start()
        .await
        .unwrap();

    let result = service.search("vitamina d", None).await;
    assert!(matches!(result, Err(SearchError::ModelUnavailable(_))));

    // The admin path reports the same kind.
    let admin = service
        .searcher()
        .upsert_supplement(
            "Zinc",
            vec![],
            UpsertMetadata {
                evidence_grade: EvidenceGrade::A,
                study_count: 100,
                category: None,
            },
        )
        .await;
    assert!(matches!(admin, Err(AdminError::ModelUnavailable(_))));

    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_queries_are_responses_not_errors() {
    let service = SearchService::builder(Config::default())
        .with_pubmed(Arc::new(OfflinePubMed))
        .start()
        .await
        .unwrap();

    for raw in ["", "   ", &"x".repeat(500)] {
        let response = service.search(raw, None).await.unwrap();
        assert_eq!(response.status, SearchStatus::Invalid, "raw {raw:?}");
        assert!(response.supplement.is_none());
    }

    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_admin_upsert_reports_existing_row() {
    let service = SearchService::builder(Config::default())
        .with_pubmed(Arc::new(OfflinePubMed))
        .start()
        .await
        .unwrap();

    let meta = UpsertMetadata {
        evidence_grade: EvidenceGrade::B,
        study_count: 500,
        category: None,
    };
    let first = service
        .searcher()
        .upsert_supplement("Ashwagandha", vec!["withania".into()], meta.clone())
        .await
        .unwrap();

    // Same canonical name: resolved to the existing row.
    let repeat = service
        .searcher()
        .upsert_supplement("ashwagandha", vec![], meta.clone())
        .await
        .unwrap();
    assert!(!repeat.created);
    assert_eq!(first.id, repeat.id);

    // A different canonical name colliding with an existing alias is a real
    // conflict.
    let conflict = service
        .searcher()
        .upsert_supplement("Withania", vec![], meta)
        .await;
    assert!(matches!(conflict, Err(AdminError::Duplicate { .. })));

    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_failures_never_change_search_results() {
    // PubMed permanently offline: discovery jobs fail, searches keep
    // answering from the store.
    let service = SearchService::builder(Config::default())
        .with_pubmed(Arc::new(OfflinePubMed))
        .start()
        .await
        .unwrap();
    service
        .searcher()
        .upsert_supplement(
            "Melatonin",
            vec![],
            UpsertMetadata {
                evidence_grade: EvidenceGrade::A,
                study_count: 5800,
                category: Some("sleep".into()),
            },
        )
        .await
        .unwrap();

    // Unknown query parks in discovery; known query still answers.
    let unknown = service.search("tongkat ali", None).await.unwrap();
    assert_eq!(unknown.status, SearchStatus::Processing);

    let known = service.search("melatonina", None).await.unwrap();
    assert_eq!(known.status, SearchStatus::Found);

    service.shutdown().await;
}
