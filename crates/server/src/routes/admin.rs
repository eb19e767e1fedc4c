use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use searcher::UpsertMetadata;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertRequest {
    pub canonical_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub metadata: UpsertMetadata,
}

/// `POST /api/v1/supplements`, admin ingest. 201 with the new id, 200 when
/// the row already existed.
pub async fn upsert_supplement(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpsertRequest>,
) -> ServerResult<impl IntoResponse> {
    if request.canonical_name.trim().is_empty() {
        return Err(ServerError::BadRequest(
            "canonical_name must not be empty".into(),
        ));
    }

    let outcome = state
        .service
        .searcher()
        .upsert_supplement(&request.canonical_name, request.aliases, request.metadata)
        .await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(json!({ "id": outcome.id, "created": outcome.created }))))
}

/// `GET /api/v1/supplements/{name}`, exact lookup by canonical name.
pub async fn get_supplement(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let supplement = state
        .service
        .store()
        .get_by_canonical_name(&name)
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .ok_or(ServerError::NotFound)?;
    Ok(Json(supplement))
}

/// `GET /api/v1/discovery/jobs/{id}`, job inspection for operators.
pub async fn get_discovery_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let job = state
        .service
        .queue()
        .get_job(&job_id)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .ok_or(ServerError::NotFound)?;
    Ok(Json(job))
}
