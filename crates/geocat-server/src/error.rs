//! HTTP error mapping.
//!
//! Storage errors keep their meaning across the wire: missing rows become
//! 404, conflicts and bad references become 400 with a message the admin UI
//! can show, infrastructure failures become an opaque 500. Cache faults
//! never appear here at all - the cache layer swallows them.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use geocat_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Storage(err) => match &err {
                StorageError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
                StorageError::AlreadyExists { .. }
                | StorageError::InUse { .. }
                | StorageError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
                StorageError::ConnectionError { .. } | StorageError::Internal { .. } => {
                    tracing::error!(error = %err, "storage failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_string(),
                    )
                }
            },
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_not_found_maps_to_404() {
        let err = ApiError::from(StorageError::not_found("point", 7));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn storage_conflict_maps_to_400() {
        let err = ApiError::from(StorageError::already_exists("site type", "settlement"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let err = ApiError::from(StorageError::internal("password in DSN"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
