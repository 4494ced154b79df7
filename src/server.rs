//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Welcome message |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/stats` | Pipeline counters and last failure |
//! | `POST` | `/api/chat` | `{query}` → `{response, augmentedQuery}` |
//! | `POST` | `/api/upload` | Multipart PDF upload (field `file`) |
//!
//! # Error Contract
//!
//! Every error response has the shape:
//!
//! ```json
//! { "error": "No query provided" }
//! ```
//!
//! Validation failures are `400`; generation, save and ingestion failures
//! are `500`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! served from another origin can call the API.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::augment::Augmenter;
use crate::extract::is_pdf_path;
use crate::generate::ChatModel;
use crate::ingest::{IngestCommand, IngestHandle};
use crate::stats::{FailureClass, PipelineStats, StatsSnapshot};

pub const WELCOME_MESSAGE: &str = "Welcome to the RAG Chatbot API!";
pub const UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded and processed successfully";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub augmenter: Arc<Augmenter>,
    pub chat: Arc<dyn ChatModel>,
    pub ingest: IngestHandle,
    pub upload_dir: PathBuf,
    pub stats: Arc<PipelineStats>,
}

/// Build the router with CORS and the upload body limit applied.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/api/stats", get(handle_stats))
        .route("/api/chat", post(handle_chat))
        .route("/api/upload", post(handle_upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Serve `router` on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, router: Router) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "HTTP server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Converts into an `{error}` JSON response with the given status.
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

// ============ GET / ============

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn handle_root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: WELCOME_MESSAGE.to_string(),
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/stats ============

async fn handle_stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    response: String,
    augmented_query: String,
}

/// The body is read as raw bytes so that malformed JSON gets the same
/// `400 No query provided` as a missing query.
async fn handle_chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatResponse>, AppError> {
    let query = serde_json::from_slice::<ChatRequest>(&body)
        .ok()
        .and_then(|r| r.query)
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("No query provided"))?;

    let augmented = state.augmenter.augment(&query).await;

    let response = state.chat.generate(&augmented).await.map_err(|e| {
        error!(error = %e, "generation failed");
        state
            .stats
            .record_failure(FailureClass::Generation, e.to_string());
        internal("Failed to generate response")
    })?;

    Ok(Json(ChatResponse {
        response,
        augmented_query: augmented,
    }))
}

// ============ POST /api/upload ============

async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let mut multipart = multipart.map_err(|_| bad_request("No file part"))?;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| AppError {
                status: e.status(),
                message: e.body_text(),
            })?
            .ok_or_else(|| bad_request("No file part"))?;

        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .and_then(sanitize_file_name)
            .ok_or_else(|| bad_request("No selected file"))?;

        if !is_pdf_path(Path::new(&file_name)) {
            return Err(bad_request("Invalid file type. Only PDF files are allowed"));
        }

        let bytes = field.bytes().await.map_err(|e| AppError {
            status: e.status(),
            message: e.body_text(),
        })?;

        let path = state.upload_dir.join(&file_name);
        save_upload(&state.upload_dir, &path, &bytes)
            .await
            .map_err(|e| {
                error!(file = %file_name, error = %e, "failed to save upload");
                internal(e.to_string())
            })?;
        info!(file = %file_name, bytes = bytes.len(), "upload saved");

        state
            .ingest
            .submit_and_wait(IngestCommand::Add(path))
            .await
            .map_err(|e| {
                warn!(file = %file_name, error = %e, "uploaded file was not indexed");
                internal(e.to_string())
            })?;

        return Ok(Json(MessageResponse {
            message: UPLOAD_SUCCESS_MESSAGE.to_string(),
        }));
    }
}

async fn save_upload(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, bytes).await
}

/// Keep only the final path component of a client-supplied file name.
/// Returns `None` when nothing usable is left.
fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if last.is_empty() || last == "." || last == ".." {
        None
    } else {
        Some(last.to_string())
    }
}
