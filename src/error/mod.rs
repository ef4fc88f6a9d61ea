use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::DbError;
use crate::domain::{RunError, StatusSnapshot};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// A run is already active; the body carries the current status
    #[error("Blockchain scrapers are already running")]
    Conflict(Box<StatusSnapshot>),
    #[error("Scraping run failed: {0}")]
    RunFailed(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, data) = match self {
            ApiError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, None),
            ApiError::Conflict(snapshot) => (StatusCode::CONFLICT, Some(json!(snapshot))),
            ApiError::RunFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let body = Json(json!({
            "success": false,
            "message": message,
            "data": data,
        }));

        (status, body).into_response()
    }
}

// DbError to ApiError conversion implementation
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        tracing::warn!("Database error: {:?}", err);
        match err {
            DbError::ConnectionError(msg) | DbError::QueryError(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        let message = err.to_string();
        match err {
            RunError::Conflict(snapshot) => ApiError::Conflict(snapshot),
            RunError::NetworkNotFound(id) => ApiError::NotFound(format!("network {}", id)),
            RunError::StoreUnavailable(msg) => ApiError::DatabaseError(msg),
            RunError::Failed(msg) => ApiError::RunFailed(msg),
            RunError::StateLock => ApiError::InternalError(message),
        }
    }
}
