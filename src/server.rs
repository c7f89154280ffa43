//! HTTP layer.
//!
//! Exposes the query pipeline and index stats as a small JSON API:
//!
//! | Method | Path      | Description                               |
//! |--------|-----------|-------------------------------------------|
//! | `POST` | `/query`  | Answer a question with cited sources      |
//! | `GET`  | `/stats`  | Index name and chunk count                |
//! | `GET`  | `/health` | Health check (returns version)            |
//!
//! Error responses use the shape
//! `{ "error": { "code": "...", "message": "..." } }` with codes
//! `bad_request` (400), `index_not_found` (404), `upstream_timeout` (504),
//! `upstream_failure` (502), and `internal` (500). Messages carry the
//! error display text only; no internal stack detail.
//!
//! All origins, methods, and headers are permitted so browser-based
//! clients can call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::Error;
use crate::generate::{AnthropicGenerator, Generator};
use crate::query::{self, QueryResponse};
use crate::stats::{self, IndexStats};
use crate::store::{sqlite::SqliteStore, VectorStore};

/// Shared application state, cheap to clone across handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn VectorStore> = Arc::new(SqliteStore::from_config(config).await?);
    let generator: Arc<dyn Generator> = Arc::new(AnthropicGenerator::new(&config.generation)?);

    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        generator,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/query", post(handle_query))
        .route("/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("ragbase server listening on http://{bind_addr}");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error responses ============

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
    code: &'static str,
    message: String,
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Map a core error onto the HTTP contract.
fn classify(err: Error) -> AppError {
    let message = err.to_string();
    let (status, code) = match err {
        Error::InvalidConfiguration(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        Error::IndexNotFound(_) => (StatusCode::NOT_FOUND, "index_not_found"),
        Error::UpstreamTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout"),
        Error::Upstream { .. } => (StatusCode::BAD_GATEWAY, "upstream_failure"),
        Error::EmptyIngestion | Error::Extraction { .. } | Error::Store(_) | Error::Io(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };
    AppError {
        status,
        code,
        message,
    }
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    top_k: Option<usize>,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if request.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let top_k = request.top_k.unwrap_or(state.config.retrieval.top_k);
    if top_k == 0 {
        return Err(bad_request("top_k must be > 0"));
    }

    let response = query::answer_question(
        &state.config,
        state.store.as_ref(),
        state.generator.as_ref(),
        &request.question,
        top_k,
        state.config.retrieval.summary_preview_chars,
    )
    .await
    .map_err(classify)?;

    Ok(Json(response))
}

// ============ GET /stats ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<IndexStats>, AppError> {
    let stats = stats::index_stats(&state.config, state.store.as_ref())
        .await
        .map_err(classify)?;
    Ok(Json(stats))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_maps_taxonomy_to_statuses() {
        let cases = [
            (
                classify(Error::InvalidConfiguration("bad".into())),
                StatusCode::BAD_REQUEST,
                "bad_request",
            ),
            (
                classify(Error::IndexNotFound("kb".into())),
                StatusCode::NOT_FOUND,
                "index_not_found",
            ),
            (
                classify(Error::UpstreamTimeout {
                    service: "generation",
                }),
                StatusCode::GATEWAY_TIMEOUT,
                "upstream_timeout",
            ),
            (
                classify(Error::Upstream {
                    service: "embedding",
                    reason: "HTTP 500".into(),
                }),
                StatusCode::BAD_GATEWAY,
                "upstream_failure",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status, status);
            assert_eq!(err.code, code);
        }
    }
}
