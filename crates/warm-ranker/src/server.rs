//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Liveness banner |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/rank` | Rank an uploaded CSV against an idea |
//!
//! `POST /api/rank` takes `multipart/form-data` with a text field `idea`
//! and a file field `csv`, and returns a JSON array: every column of each
//! ranked contact plus `score` and `reason`, highest score first.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "missing form field: idea" } }
//! ```
//!
//! Error codes: `bad_request` (400), `ranking_failed` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front ends
//! can upload directly.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use warm_ranker_core::models::RankedContact;

use crate::context::RankerContext;
use crate::dataset::load_contacts_from_reader;
use crate::pipeline::rank_contacts;

/// Uploads larger than this are rejected before parsing.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    ctx: Arc<RankerContext>,
}

/// Build the router over a shared context.
pub fn router(ctx: Arc<RankerContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/api/rank", post(handle_rank))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(AppState { ctx })
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(ctx: Arc<RankerContext>) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Warm Ranker API listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
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

fn ranking_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "ranking_failed".to_string(),
        message: message.into(),
    }
}

// ============ GET / and GET /health ============

#[derive(Serialize)]
struct RootResponse {
    status: &'static str,
    message: &'static str,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok",
        message: "Warm Ranker API is running",
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/rank ============

async fn handle_rank(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<RankedContact>>, AppError> {
    let mut idea: Option<String> = None;
    let mut csv: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("idea") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("unreadable idea field: {}", e)))?;
                idea = Some(text);
            }
            Some("csv") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("unreadable csv field: {}", e)))?;
                csv = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let idea = idea
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("missing form field: idea"))?;
    let csv = csv.ok_or_else(|| bad_request("missing form field: csv"))?;

    let rows = load_contacts_from_reader(csv.as_slice())
        .map_err(|e| bad_request(format!("invalid CSV: {:#}", e)))?;

    let run = rank_contacts(&state.ctx, &idea, rows, None)
        .await
        .map_err(|e| {
            tracing::error!(error = %format!("{:#}", e), "ranking request failed");
            ranking_failed(format!("{:#}", e))
        })?;

    Ok(Json(run.ranked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedding::HashEmbedder;
    use anyhow::Result;
    use async_trait::async_trait;
    use warm_ranker_core::agent::ProfileEnricher;
    use warm_ranker_core::index::memory::InMemoryIndex;

    struct NoEnricher;

    #[async_trait]
    impl ProfileEnricher for NoEnricher {
        async fn enrich(&self, _url: &str) -> Result<String> {
            anyhow::bail!("offline")
        }
    }

    async fn spawn_app() -> String {
        let ctx = RankerContext::from_parts(
            Config::minimal(),
            Arc::new(InMemoryIndex::new()),
            Arc::new(HashEmbedder::new(32)),
            None,
            None,
            Arc::new(NoEnricher),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(Arc::new(ctx))).await.unwrap();
        });
        format!("http://{}", addr)
    }

    const CSV: &str = "First Name,URL,Company,Position\n\
        John,https://example.com/john,AI Marketing Inc,CTO\n\
        Jane,https://example.com/jane,Tech Startup,Marketer\n";

    #[tokio::test]
    async fn test_root_and_health() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let root: serde_json::Value = client.get(&base).send().await.unwrap().json().await.unwrap();
        assert_eq!(root["status"], "ok");
        assert_eq!(root["message"], "Warm Ranker API is running");

        let health: serde_json::Value = client
            .get(format!("{}/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_rank_returns_neutral_scores_without_llm() {
        let base = spawn_app().await;
        let form = reqwest::multipart::Form::new()
            .text("idea", "AI marketing tool")
            .part(
                "csv",
                reqwest::multipart::Part::bytes(CSV.as_bytes().to_vec()).file_name("contacts.csv"),
            );

        let resp = reqwest::Client::new()
            .post(format!("{}/api/rank", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Vec<serde_json::Value> = resp.json().await.unwrap();
        assert_eq!(body.len(), 2);
        for contact in &body {
            assert_eq!(contact["score"], 5);
            assert!(contact["First Name"].is_string());
            assert!(contact.get("enriched_bio").is_none());
        }
    }

    #[tokio::test]
    async fn test_rank_missing_idea_is_bad_request() {
        let base = spawn_app().await;
        let form = reqwest::multipart::Form::new().part(
            "csv",
            reqwest::multipart::Part::bytes(CSV.as_bytes().to_vec()).file_name("contacts.csv"),
        );

        let resp = reqwest::Client::new()
            .post(format!("{}/api/rank", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(body["error"]["message"].as_str().unwrap().contains("idea"));
    }

    #[tokio::test]
    async fn test_rank_missing_csv_is_bad_request() {
        let base = spawn_app().await;
        let form = reqwest::multipart::Form::new().text("idea", "AI marketing tool");

        let resp = reqwest::Client::new()
            .post(format!("{}/api/rank", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"]["message"].as_str().unwrap().contains("csv"));
    }

    #[tokio::test]
    async fn test_rank_duplicate_columns_is_bad_request() {
        let base = spawn_app().await;
        let form = reqwest::multipart::Form::new()
            .text("idea", "AI marketing tool")
            .text("csv", "Company,URL,Company\nAcme,,Globex\n");

        let resp = reqwest::Client::new()
            .post(format!("{}/api/rank", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Duplicate CSV column"));
    }

    #[tokio::test]
    async fn test_rank_embedding_failure_is_server_error() {
        let ctx = RankerContext::from_parts(
            Config::minimal(),
            Arc::new(InMemoryIndex::new()),
            Arc::new(crate::embedding::DisabledEmbedder),
            None,
            None,
            Arc::new(NoEnricher),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(Arc::new(ctx))).await.unwrap();
        });

        let form = reqwest::multipart::Form::new()
            .text("idea", "AI marketing tool")
            .text("csv", CSV);
        let resp = reqwest::Client::new()
            .post(format!("http://{}/api/rank", addr))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "ranking_failed");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("disabled"));
    }
}
