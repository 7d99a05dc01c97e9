//! API error taxonomy.
//!
//! Maps domain failures to HTTP status codes and renders the wire shape
//! the dashboard expects: a JSON object with a single `msg` field. Store
//! failures surface a short description only; the underlying error text
//! goes to the log, never to the client.

use crate::repo::RepoError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad input: unknown field, wrong type, missing required field (400).
    #[error("{0}")]
    Validation(String),

    /// Failed login (401).
    #[error("Invalid credentials")]
    BadCredentials,

    /// Protected route hit without a bearer token (401).
    #[error("Missing bearer token")]
    MissingToken,

    /// Bearer token present but failed verification (403).
    #[error("Invalid token")]
    InvalidToken,

    /// Authenticated but not allowed, or a disabled feature (403).
    #[error("{0}")]
    Forbidden(String),

    /// Unknown entity tag or record id (404).
    #[error("Not found")]
    NotFound,

    /// Duplicate username (409).
    #[error("{0}")]
    Conflict(String),

    /// Store, hashing, or signing failure (500). The payload is logged,
    /// not returned.
    #[error("internal error: {0}")]
    Store(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::BadCredentials | Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::InvalidToken | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match &self {
            Self::Store(detail) => {
                tracing::error!(error = %detail, "store failure");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "msg": msg }))).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Validation(msg) => Self::Validation(msg),
            RepoError::Conflict(msg) => Self::Conflict(msg),
            RepoError::Db(msg) => Self::Store(msg),
        }
    }
}
