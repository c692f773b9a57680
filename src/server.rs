//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Upload one document (base64 body) and index it |
//! | `POST` | `/ask` | Ask a question; returns the answer, citations and memory writes |
//! | `GET`  | `/memory` | List persisted memory (optionally `?partition=user\|organization`) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `parse_failure` (422),
//! `embedding_failure` (502), `generation_failure` (502), `internal` (500).

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use doc_assistant_core::models::{Citation, MemoryEntry, Partition, Turn};
use doc_assistant_core::AssistantError;

use crate::assistant::{Assistant, UNAVAILABLE_MESSAGE};
use crate::config::Config;
use crate::ingest::DocumentReport;

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let assistant = Assistant::open(config).await?;
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Doc Assistant listening on http://{}", bind_addr);
    info!(bind = %bind_addr, "server started");

    axum::serve(listener, router(Arc::new(assistant))).await?;
    Ok(())
}

pub fn router(assistant: Arc<Assistant>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/ask", post(handle_ask))
        .route("/memory", get(handle_memory))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { assistant })
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

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<AssistantError> for AppError {
    fn from(err: AssistantError) -> Self {
        let status = match &err {
            AssistantError::ParseFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AssistantError::EmbeddingFailure(_) | AssistantError::GenerationFailure(_) => {
                StatusCode::BAD_GATEWAY
            }
            AssistantError::MemoryWriteFailure(_) | AssistantError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match &err {
            AssistantError::GenerationFailure(_) => UNAVAILABLE_MESSAGE.to_string(),
            other => other.to_string(),
        };
        AppError {
            status,
            code: err.code().to_string(),
            message,
        }
    }
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

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    filename: String,
    /// File bytes, standard base64.
    content_base64: String,
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<DocumentReport>, AppError> {
    let filename = req.filename.trim();
    if filename.is_empty() {
        return Err(bad_request("filename must not be empty"));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(req.content_base64.trim())
        .map_err(|e| bad_request(format!("content_base64 is not valid base64: {}", e)))?;

    let report = state.assistant.ingest_bytes(filename, &bytes).await;
    classify_ingest(&report)?;
    Ok(Json(report))
}

/// Whole-document failures become errors; partial success is a 200 report.
fn classify_ingest(report: &DocumentReport) -> Result<(), AppError> {
    if report.is_ok() || report.indexed > 0 {
        return Ok(());
    }
    let message = report.errors.join("; ");
    if report.chunks == 0 {
        Err(AppError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            code: "parse_failure".to_string(),
            message,
        })
    } else {
        Err(AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "embedding_failure".to_string(),
            message,
        })
    }
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    history: Vec<Turn>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    grounded: bool,
    citations: Vec<Citation>,
    memory_written: Vec<MemoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_error: Option<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let outcome = state.assistant.turn(&req.question, &req.history).await;
    let answer = outcome.answer?;

    Ok(Json(AskResponse {
        answer: answer.text,
        grounded: answer.grounded,
        citations: answer.citations,
        memory_written: outcome.memory.written,
        memory_error: outcome.memory.error,
    }))
}

// ============ GET /memory ============

#[derive(Deserialize)]
struct MemoryQuery {
    partition: Option<String>,
}

#[derive(Serialize)]
struct MemoryResponse {
    entries: Vec<MemoryEntry>,
}

async fn handle_memory(
    State(state): State<AppState>,
    Query(query): Query<MemoryQuery>,
) -> Result<Json<MemoryResponse>, AppError> {
    let partitions: Vec<Partition> = match query.partition.as_deref() {
        None => Partition::ALL.to_vec(),
        Some(label) => vec![Partition::from_label(label)
            .ok_or_else(|| bad_request(format!("unknown partition: {}", label)))?],
    };

    let mut entries = Vec::new();
    for partition in partitions {
        let found = state
            .assistant
            .memory()
            .entries(partition)
            .await
            .map_err(|e| AssistantError::MemoryWriteFailure(e.to_string()))?;
        entries.extend(found);
    }
    Ok(Json(MemoryResponse { entries }))
}
