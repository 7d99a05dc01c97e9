//! Axum HTTP gateway.
//!
//! Routes `/api/login`, `/api/register`, and the generic entity CRUD
//! endpoints, serves the embedded dashboard, and wraps everything in the
//! usual layers: CORS, a 64KB body limit, and a request timeout against
//! slow-loris clients.

pub mod assets;
pub mod error;
pub mod middleware;

use crate::auth::{Claim, CredentialStore, NewUser, TokenSigner};
use crate::config::Config;
use crate::db;
use crate::entity::Entity;
use crate::repo::EntityRepo;
use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Json;
use axum::routing::get;
use axum::{Extension, Router};
use error::ApiError;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: EntityRepo,
    pub creds: CredentialStore,
    /// Token signer holding the server secret; read-only after startup.
    pub signer: Arc<TokenSigner>,
    /// Whether POST /api/register is open.
    pub allow_registration: bool,
}

/// Run the HTTP gateway until the process is stopped.
pub async fn run_gateway(config: Config) -> Result<()> {
    let db_path = config.database.resolved_path()?;
    let pool = db::open_pool(&db_path)?;
    db::init_schema(&pool)?;
    tracing::info!(path = %db_path.display(), "database ready");

    let creds = CredentialStore::new(pool.clone());
    if config.auth.seed_admin {
        creds.seed_admin()?;
    }
    if config.auth.uses_default_secret() {
        tracing::warn!(
            "auth.secret is the built-in default — set LABTRACK_SECRET or [auth] secret"
        );
    }

    let state = AppState {
        repo: EntityRepo::new(pool),
        creds,
        signer: Arc::new(TokenSigner::new(
            &config.auth.secret,
            config.auth.token_ttl_secs,
        )),
        allow_registration: config.auth.allow_registration,
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let display_addr = listener.local_addr()?;

    println!("🧪 labtrack listening on http://{display_addr}");
    println!("  GET  /                    — dashboard (login page)");
    println!("  POST /api/login           — exchange credentials for a bearer token");
    if state.allow_registration {
        println!("  POST /api/register        — create an account");
    }
    println!("  *    /api/{{entity}}[/{{id}}] — CRUD over: users materials gels plates analysis methods proteomes");
    println!("  GET  /health              — health check");
    println!("  Press Ctrl+C to stop.\n");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

/// Assemble the full router. Public so the integration tests can drive
/// the service in-process.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/{entity}",
            get(handle_entity_list).post(handle_entity_create),
        )
        .route(
            "/api/{entity}/{id}",
            get(handle_entity_get)
                .put(handle_entity_update)
                .delete(handle_entity_delete),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_claim,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/login", axum::routing::post(handle_login))
        .route("/api/register", axum::routing::post(handle_register))
        .merge(protected)
        .route("/", get(assets::handle_index))
        .fallback(assets::handle_asset)
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
}

// ══════════════════════════════════════════════════════════════════════
// HANDLERS
// ══════════════════════════════════════════════════════════════════════

/// GET /health — always public (no secrets leaked)
async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    username: String,
    password: String,
    #[serde(default)]
    fullname: Option<String>,
    #[serde(default)]
    affiliation: Option<String>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

/// POST /api/login — verify credentials, issue a signed token.
async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(bad_body)?;

    let user = state
        .creds
        .authenticate(&body.username, &body.password)
        .map_err(|e| ApiError::Store(e.to_string()))?
        .ok_or(ApiError::BadCredentials)?;

    let token = state.signer.issue(&user.username);
    tracing::info!(user = %user.username, "login");
    Ok(Json(json!({ "token": token })))
}

/// POST /api/register — create an account, returns the new user id.
async fn handle_register(
    State(state): State<AppState>,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    if !state.allow_registration {
        return Err(ApiError::Forbidden("Registration is disabled".into()));
    }
    let Json(body) = body.map_err(bad_body)?;

    let id = state
        .creds
        .create(&NewUser {
            username: body.username,
            password: body.password,
            fullname: body.fullname,
            affiliation: body.affiliation,
            note: body.note,
            role: body.role,
        })
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("already taken") {
                ApiError::Conflict(msg)
            } else {
                ApiError::Validation(msg)
            }
        })?;

    tracing::info!(user_id = id, "registered new user");
    Ok(Json(json!({ "id": id })))
}

/// GET /api/{entity} — list all rows.
async fn handle_entity_list(
    State(state): State<AppState>,
    Path(entity): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let entity = resolve_entity(&entity)?;
    let rows = state.repo.list(entity)?;
    Ok(Json(Value::Array(rows.into_iter().map(Value::Object).collect())))
}

/// GET /api/{entity}/{id} — fetch one row.
async fn handle_entity_get(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let entity = resolve_entity(&entity)?;
    let id = parse_id(&id)?;
    let row = state.repo.get(entity, id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(Value::Object(row)))
}

/// POST /api/{entity} — insert a row, returns the new id.
async fn handle_entity_create(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Extension(claim): Extension<Claim>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let entity = resolve_entity(&entity)?;
    let Json(fields) = body.map_err(bad_body)?;
    let id = state.repo.create(entity, &fields)?;
    tracing::debug!(user = %claim.sub, entity = entity.table(), id, "created record");
    Ok(Json(json!({ "id": id })))
}

/// PUT /api/{entity}/{id} — update a row, returns the changed count.
async fn handle_entity_update(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    Extension(claim): Extension<Claim>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let entity = resolve_entity(&entity)?;
    let id = parse_id(&id)?;
    let Json(fields) = body.map_err(bad_body)?;
    let changes = state.repo.update(entity, id, &fields)?;
    tracing::debug!(user = %claim.sub, entity = entity.table(), id, changes, "updated record");
    Ok(Json(json!({ "changes": changes })))
}

/// DELETE /api/{entity}/{id} — delete a row, returns the changed count.
/// Deleting a missing id reports zero changes, not an error.
async fn handle_entity_delete(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    Extension(claim): Extension<Claim>,
) -> Result<Json<Value>, ApiError> {
    let entity = resolve_entity(&entity)?;
    let id = parse_id(&id)?;
    let changes = state.repo.delete(entity, id)?;
    tracing::debug!(user = %claim.sub, entity = entity.table(), id, changes, "deleted record");
    Ok(Json(json!({ "changes": changes })))
}

/// The allow-list gate: unknown tags 404 before any store access.
fn resolve_entity(tag: &str) -> Result<Entity, ApiError> {
    Entity::from_tag(tag).ok_or(ApiError::NotFound)
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::Validation(format!("Invalid id '{raw}'")))
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(format!("Invalid request body: {rejection}"))
}
