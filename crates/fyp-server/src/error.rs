use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use fyp_shared::error::{LifecycleError, TokenError};
use fyp_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Precondition(String),

    #[error("Supervisor is at capacity ({current}/{limit} active projects)")]
    CapacityExceeded { current: u32, limit: u32 },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Upload too large: {size} bytes (max {max})")]
    UploadTooLarge { size: usize, max: usize },

    #[error("File storage error: {0}")]
    FileStorage(String),

    #[error("Database error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LifecycleError> for ServerError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::Unauthenticated => ServerError::Unauthenticated,
            LifecycleError::Forbidden(reason) => ServerError::Forbidden(reason),
            LifecycleError::Validation(reason) => ServerError::BadRequest(reason),
            LifecycleError::Precondition(reason) => ServerError::Precondition(reason),
            LifecycleError::CapacityExceeded { current, limit } => {
                ServerError::CapacityExceeded { current, limit }
            }
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("Record"),
            StoreError::Conflict(reason) => ServerError::Precondition(reason),
            StoreError::CapacityExceeded { current, limit } => {
                ServerError::CapacityExceeded { current, limit }
            }
            other => ServerError::Store(other),
        }
    }
}

impl From<TokenError> for ServerError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Encoding(inner) => ServerError::Internal(inner.to_string()),
            _ => ServerError::Unauthenticated,
        }
    }
}

impl ServerError {
    /// Replace a generic "Record not found" with the name of what was missing.
    pub fn or_not_found(self, what: &'static str) -> Self {
        match self {
            ServerError::NotFound(_) => ServerError::NotFound(what),
            other => other,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Precondition(_) | ServerError::CapacityExceeded { .. } => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::UploadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string())
            }
            ServerError::FileStorage(detail) => {
                tracing::error!(error = %detail, "file storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "File storage error".to_string())
            }
            ServerError::Store(e) => {
                tracing::error!(error = %e, "database failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
