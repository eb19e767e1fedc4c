use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use searcher::{AdminError, SearchError};

pub type ServerResult<T> = Result<T, ServerError>;

/// Boundary error type mapping core error kinds onto HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Search(SearchError::ModelUnavailable(_))
            | ServerError::Search(SearchError::StoreUnavailable(_))
            | ServerError::Admin(AdminError::ModelUnavailable(_))
            | ServerError::Admin(AdminError::StoreUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServerError::Search(SearchError::DeadlineExceeded) => StatusCode::GATEWAY_TIMEOUT,
            ServerError::Admin(AdminError::Duplicate { .. }) => StatusCode::CONFLICT,
            ServerError::Search(SearchError::Internal(_))
            | ServerError::Admin(AdminError::Internal(_))
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::NotFound => "NOT_FOUND",
            ServerError::Search(SearchError::ModelUnavailable(_))
            | ServerError::Admin(AdminError::ModelUnavailable(_)) => "MODEL_UNAVAILABLE",
            ServerError::Search(SearchError::StoreUnavailable(_))
            | ServerError::Admin(AdminError::StoreUnavailable(_)) => "STORE_UNAVAILABLE",
            ServerError::Search(SearchError::DeadlineExceeded) => "DEADLINE_EXCEEDED",
            ServerError::Admin(AdminError::Duplicate { .. }) => "DUPLICATE",
            ServerError::Search(SearchError::Internal(_))
            | ServerError::Admin(AdminError::Internal(_))
            | ServerError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));
        // 5xx details stay in the logs; clients get the error code.
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServerError::Search(SearchError::ModelUnavailable("x".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServerError::Admin(AdminError::Duplicate { name: "Zinc".into() }).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::BadRequest("no query".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServerError::NotFound.status_code(), StatusCode::NOT_FOUND);
    }
}
