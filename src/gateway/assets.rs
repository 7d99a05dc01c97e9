//! Embedded dashboard assets.
//!
//! The login/register/dashboard pages are compiled into the binary so the
//! server ships as one file; no separate static host or reverse proxy.

use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

/// GET / — the dashboard entry point is the login page.
pub async fn handle_index() -> Redirect {
    Redirect::to("/login.html")
}

/// Fallback handler: serve an embedded asset by path.
pub async fn handle_asset(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    match Assets::get(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                file.data.into_owned(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}
