//! HTTP gateway.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/healthz` | Liveness probe |
//! | `POST` | `/v1/search` | Access-filtered retrieval |
//! | `POST` | `/v1/chat/completions` | OpenAI-compatible chat, grounded in retrieved context |
//! | `POST` | `/admin/ingest?path=` | Run the ingestion job in-process |
//!
//! # Authorization
//!
//! When `server.api_key` is set, every endpoint except `/healthz` requires
//! `Authorization: Bearer <key>`. Group memberships come from a trusted
//! upstream header (`server.groups_header`, comma-separated); without the
//! header, searches are unrestricted.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `forbidden` (403),
//! `llm_not_configured` (503), `bad_gateway` (502), `internal` (500).

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use docgate_core::engine::RetrievalEngine;
use docgate_core::models::ScoredHit;

use crate::config::Config;
use crate::engine;
use crate::ingest::{ingest_path, resolve_target};
use crate::loader::Loader;
use crate::prompt::{build_system_prompt, last_user_message, ChatMessage};

const LLM_ERROR_BODY_CHARS: usize = 500;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    engine: Arc<RetrievalEngine>,
    loader: Arc<Loader>,
    llm: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config, engine: RetrievalEngine, loader: Loader) -> anyhow::Result<Self> {
        let llm = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm.timeout_secs))
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            loader: Arc::new(loader),
            llm,
        })
    }
}

/// Bootstraps the collection, binds `server.bind`, and serves until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = engine::connect(config).await?;
    let loader = Loader::from_config(config)?;
    let state = AppState::new(config.clone(), engine, loader)?;

    let listener = TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "docgate listening");
    serve(listener, state).await
}

/// Serve on an already-bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(handle_health))
        .route("/v1/search", post(handle_search))
        .route("/v1/chat/completions", post(handle_chat))
        .route("/admin/ingest", post(handle_admin_ingest))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into the JSON error envelope.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        warn!(error = %format!("{:#}", err), "request failed");
        internal(format!("{:#}", err))
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

fn forbidden(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::FORBIDDEN, "forbidden", message)
}

fn bad_gateway(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_GATEWAY, "bad_gateway", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

// ============ Authorization ============

/// Enforce the shared API key, if configured.
fn authorize(config: &Config, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = config.server.api_key.as_deref() else {
        return Ok(());
    };
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| unauthorized("Missing Bearer token"))?;
    if token != expected {
        return Err(forbidden("Invalid API key"));
    }
    Ok(())
}

/// Caller groups from the trusted groups header; `None` only when absent.
///
/// Group names may be non-ASCII UTF-8. A header that is not valid UTF-8 is
/// rejected rather than treated as absent.
fn caller_groups(config: &Config, headers: &HeaderMap) -> Result<Option<Vec<String>>, AppError> {
    let Some(value) = headers.get(config.server.groups_header.as_str()) else {
        return Ok(None);
    };
    let raw = std::str::from_utf8(value.as_bytes()).map_err(|_| {
        bad_request(format!(
            "{} header is not valid UTF-8",
            config.server.groups_header
        ))
    })?;
    Ok(Some(
        raw.split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect(),
    ))
}

// ============ GET /healthz ============

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

// ============ POST /v1/search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    hits: Vec<ScoredHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    authorize(&state.config, &headers)?;
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let groups = caller_groups(&state.config, &headers)?;
    let hits = state
        .engine
        .search(&req.query, req.top_k, groups.as_deref())
        .await?;
    Ok(Json(SearchResponse { hits }))
}

// ============ POST /v1/chat/completions ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    model: Option<String>,
    messages: Vec<ChatMessage>,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_top_p")]
    top_p: f32,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.2
}
fn default_top_p() -> f32 {
    0.9
}
fn default_max_tokens() -> u32 {
    512
}

#[derive(Serialize)]
struct RetrievedRef<'a> {
    source: &'a str,
    page_number: Option<u32>,
    chunk_index: usize,
    score: f32,
    doc_group: Option<&'a str>,
}

async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    authorize(&state.config, &headers)?;
    let base_url = state
        .config
        .llm
        .base_url
        .as_deref()
        .map(|u| u.trim_end_matches('/'))
        .ok_or_else(|| {
            AppError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "llm_not_configured",
                "llm.base_url is not configured",
            )
        })?;

    let request_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    let started = Instant::now();

    let query = last_user_message(&req.messages);
    let groups = caller_groups(&state.config, &headers)?;
    let hits = state.engine.search(query, None, groups.as_deref()).await?;
    debug!(request_id = %request_id, hits = hits.len(), "retrieved context");

    let mut messages = Vec::with_capacity(req.messages.len() + 1);
    messages.push(ChatMessage {
        role: "system".to_string(),
        content: build_system_prompt(&hits),
    });
    messages.extend(req.messages.iter().cloned());

    let payload = json!({
        "model": req.model.clone().unwrap_or_else(|| state.config.llm.model.clone()),
        "messages": messages,
        "temperature": req.temperature,
        "top_p": req.top_p,
        "max_tokens": req.max_tokens,
    });

    let response = state
        .llm
        .post(format!("{}/chat/completions", base_url))
        .json(&payload)
        .send()
        .await
        .map_err(|e| bad_gateway(format!("LLM request failed: {}", e)))?;

    let status = response.status();
    if status.as_u16() >= 400 {
        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(LLM_ERROR_BODY_CHARS).collect();
        warn!(request_id = %request_id, status = status.as_u16(), "LLM error");
        return Err(bad_gateway(format!("LLM error {}: {}", status.as_u16(), excerpt)));
    }

    let mut data: serde_json::Value = response
        .json()
        .await
        .map_err(|e| bad_gateway(format!("invalid LLM response: {}", e)))?;

    let retrieved: Vec<RetrievedRef<'_>> = hits
        .iter()
        .map(|h| RetrievedRef {
            source: &h.source,
            page_number: h.page_number,
            chunk_index: h.chunk_index,
            score: h.score,
            doc_group: h.doc_group.as_deref(),
        })
        .collect();
    let mut rag_meta = json!({
        "request_id": request_id,
        "retrieved": retrieved,
        "latency_ms": started.elapsed().as_millis() as u64,
    });
    if let Some(groups) = &groups {
        rag_meta["groups"] = json!(groups);
    }

    match data.as_object_mut() {
        Some(obj) => {
            obj.insert("rag_meta".to_string(), rag_meta);
        }
        None => return Err(bad_gateway("LLM response is not a JSON object")),
    }

    info!(
        request_id = %request_id,
        retrieved = hits.len(),
        latency_ms = started.elapsed().as_millis() as u64,
        "chat completed"
    );
    Ok(Json(data))
}

// ============ POST /admin/ingest ============

#[derive(Deserialize)]
struct IngestQuery {
    #[serde(default)]
    path: Option<String>,
}

async fn handle_admin_ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<IngestQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    authorize(&state.config, &headers)?;
    if let Some(admin) = state.config.server.admin_group.as_deref() {
        let groups = caller_groups(&state.config, &headers)?.unwrap_or_default();
        if !groups.iter().any(|g| g == admin) {
            return Err(forbidden(format!(
                "{} group required for ingest operations",
                admin
            )));
        }
    }

    let docs_root = &state.config.paths.docs_root;
    let target = resolve_target(docs_root, query.path.as_deref().map(Path::new));
    info!(target = %target.display(), "admin ingest");
    let report = ingest_path(&state.engine, &state.loader, docs_root, &target).await?;

    Ok(Json(json!({
        "ok": true,
        "units": report.units,
        "chunks": report.chunks,
        "skipped": report.skipped,
        "target": target.display().to_string(),
    })))
}
