//! HTTP contract tests against the assembled router (in-memory service,
//! stub embedder, no network).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use server::{build_router, AppState, ServerConfig};
use suppsearch::{Config, SearchService};

/// Keeps the background worker off the network: every validation parks as a
/// transient error and the test never awaits it.
struct OfflinePubMed;

#[async_trait::async_trait]
impl discovery::PubMedSearch for OfflinePubMed {
    async fn study_count(&self, _query: &str) -> Result<u32, discovery::PubMedError> {
        Err(discovery::PubMedError::Transient("offline test".into()))
    }
}

async fn test_state() -> Arc<AppState> {
    let service = SearchService::builder(Config::default())
        .with_pubmed(Arc::new(OfflinePubMed))
        .start()
        .await
        .unwrap();
    // One seeded row so the found path is reachable.
    service
        .searcher()
        .upsert_supplement(
            "Vitamin D",
            vec![],
            searcher::UpsertMetadata {
                evidence_grade: suppsearch::EvidenceGrade::A,
                study_count: 9000,
                category: Some("vitamin".into()),
            },
        )
        .await
        .unwrap();
    AppState::new(ServerConfig::default(), service)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn search_found_returns_200_with_payload() {
    let app = build_router(test_state().await, None);

    let response = app
        .oneshot(
            Request::post("/api/v1/search")
                .header("content-type", "application/json")
                .body(Body::from(json!({"query": "vitamina d"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "found");
    assert_eq!(body["supplement"]["canonical_name"], "Vitamin D");
    assert_eq!(body["source_tier"], "vector");
    assert!(body["correlation_id"].as_str().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_query_returns_404_processing() {
    let app = build_router(test_state().await, None);

    let response = app
        .oneshot(
            Request::post("/api/v1/search")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"query": "quercetin phytosome"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["status"], "processing");
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_query_returns_400() {
    let app = build_router(test_state().await, None);

    let response = app
        .oneshot(
            Request::post("/api/v1/search")
                .header("content-type", "application/json")
                .body(Body::from(json!({"query": "a".repeat(300)}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "invalid");
}

#[tokio::test(flavor = "multi_thread")]
async fn correlation_id_header_is_echoed() {
    let app = build_router(test_state().await, None);

    let response = app
        .oneshot(
            Request::post("/api/v1/search")
                .header("content-type", "application/json")
                .header("x-correlation-id", "trace-42")
                .body(Body::from(json!({"query": "vitamina d"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-correlation-id").unwrap(),
        "trace-42"
    );
    let body = body_json(response).await;
    assert_eq!(body["correlation_id"], "trace-42");
}

#[tokio::test(flavor = "multi_thread")]
async fn admin_upsert_creates_then_conflict_free_reuse() {
    let app = build_router(test_state().await, None);

    let payload = json!({
        "canonical_name": "Berberine",
        "aliases": ["berberina"],
        "metadata": {"evidence_grade": "B", "study_count": 1200, "category": "metabolic"}
    });

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/supplements")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let first = body_json(response).await;
    assert_eq!(first["created"], true);

    let response = app
        .oneshot(
            Request::post("/api/v1/supplements")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await;
    assert_eq!(second["created"], false);
    assert_eq!(first["id"], second["id"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn supplement_lookup_by_canonical_name() {
    let app = build_router(test_state().await, None);

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/v1/supplements/vitamin%20d")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["canonical_name"], "Vitamin D");
    assert_eq!(body["embedding"].as_array().unwrap().len(), 384);

    let response = app
        .oneshot(
            Request::get("/api/v1/supplements/unobtainium")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_and_ready_endpoints() {
    let app = build_router(test_state().await, None);

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["components"]["store"]["rows"], 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_route_is_404() {
    let app = build_router(test_state().await, None);
    let response = app
        .oneshot(Request::get("/api/v1/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
