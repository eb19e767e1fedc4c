use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use searcher::SearchStatus;

use crate::error::{ServerError, ServerResult};
use crate::middleware::CorrelationId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Overrides the header-derived correlation id when present.
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// `POST /api/v1/search`, the search contract. Status mapping: `found` is
/// 200, `processing` is 404 (the resource does not exist *yet*), `invalid`
/// is 400. The body is the full `SearchResponse` in every case.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Extension(CorrelationId(header_id)): Extension<CorrelationId>,
    Json(request): Json<SearchRequest>,
) -> ServerResult<impl IntoResponse> {
    if request.query.trim().is_empty() {
        return Err(ServerError::BadRequest("query must not be empty".into()));
    }

    let correlation_id = request.correlation_id.or(Some(header_id));
    let response = state
        .service
        .search(&request.query, correlation_id)
        .await?;

    let status = match response.status {
        SearchStatus::Found => StatusCode::OK,
        SearchStatus::Processing => StatusCode::NOT_FOUND,
        SearchStatus::Invalid => StatusCode::BAD_REQUEST,
    };
    Ok((status, Json(response)))
}
