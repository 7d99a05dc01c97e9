//! Auth gate for the protected API routes.
//!
//! Per request: extract the `Authorization: Bearer` header (missing ->
//! 401), verify the token (invalid -> 403), attach the claim to request
//! extensions, continue. A failed check is final for that request.

use super::error::ApiError;
use super::AppState;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

/// Extract the bearer token from an Authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Reject unauthenticated requests before any handler or store runs.
pub async fn require_claim(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(req.headers()).ok_or(ApiError::MissingToken)?;
    let claim = state.signer.verify(token).ok_or_else(|| {
        tracing::debug!("rejected request with unverifiable bearer token");
        ApiError::InvalidToken
    })?;

    req.extensions_mut().insert(claim);
    Ok(next.run(req).await)
}
