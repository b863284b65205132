//! HTTP API.
//!
//! Maps JSON requests onto [`SnippetService`](snipvault_core::SnippetService)
//! and the AI [`Assistant`](crate::assist::Assistant). Authentication is
//! delegated to an upstream gateway, which passes the caller's identity in the
//! `X-User-Id` header.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/snippets` | Create a snippet (201) |
//! | `GET`  | `/api/snippets?q=&tag=&page=&limit=` | Keyword listing, newest first |
//! | `GET`  | `/api/snippets/search?q=` | Semantic search |
//! | `GET`  | `/api/snippets/{id}` | Fetch one snippet |
//! | `PATCH`, `PUT` | `/api/snippets/{id}` | Partial update |
//! | `DELETE` | `/api/snippets/{id}` | Delete (204) |
//! | `POST` | `/api/ai/explain` | Explain code |
//! | `POST` | `/api/ai/translate` | Translate code |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid data provided", "details": ["Title must be a string"] } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `internal` (500), `assistant_disabled` (503).

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use snipvault_core::models::{ListQuery, NewSnippet, SemanticQuery, Snippet, SnippetPage, SnippetPatch};
use snipvault_core::SnippetError;

use crate::assist::AssistError;
use crate::config::Config;
use crate::factory::{AppContext, AppFactory};

/// Header carrying the authenticated caller's identifier.
pub const OWNER_HEADER: &str = "x-user-id";

/// Build the router over an assembled [`AppContext`].
pub fn router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/api/snippets",
            post(handle_create).get(handle_list),
        )
        .route("/api/snippets/search", get(handle_search))
        .route(
            "/api/snippets/{id}",
            get(handle_get)
                .patch(handle_update)
                .put(handle_update)
                .delete(handle_delete),
        )
        .route("/api/ai/explain", post(handle_explain))
        .route("/api/ai/translate", post(handle_translate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ctx = AppFactory::create_context(config).await?;
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "snipvault server listening");
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
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Vec<String>>,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn internal(err: &anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{err:#}"), "request failed");
    AppError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "internal server error",
    )
}

impl From<SnippetError> for AppError {
    fn from(err: SnippetError) -> Self {
        match err {
            SnippetError::Validation(v) => AppError {
                details: Some(v.problems),
                ..bad_request("invalid data provided")
            },
            SnippetError::NotFound => {
                AppError::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            SnippetError::Upstream(e) => internal(&e),
        }
    }
}

impl From<AssistError> for AppError {
    fn from(err: AssistError) -> Self {
        match err {
            AssistError::Disabled => AppError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "assistant_disabled",
                err.to_string(),
            ),
            AssistError::InvalidInput(message) => bad_request(message),
            AssistError::Upstream(e) => internal(&e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ Owner extraction ============

/// The caller's owner identifier, taken from [`OWNER_HEADER`].
struct Owner(String);

impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Owner(v.to_string()))
            .ok_or_else(|| {
                AppError::new(
                    StatusCode::UNAUTHORIZED,
                    "unauthorized",
                    "missing X-User-Id header",
                )
            })
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ Snippets ============

async fn handle_create(
    State(ctx): State<AppContext>,
    Owner(owner): Owner,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Snippet>), AppError> {
    let Json(body) = body?;
    let input = NewSnippet::from_json(&body).map_err(SnippetError::from)?;
    let snippet = ctx.service.create_snippet(&owner, input).await?;
    Ok((StatusCode::CREATED, Json(snippet)))
}

async fn handle_list(
    State(ctx): State<AppContext>,
    Owner(owner): Owner,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<SnippetPage>, AppError> {
    let Query(query) = query?;
    Ok(Json(ctx.service.get_all_snippets(&owner, query).await?))
}

async fn handle_search(
    State(ctx): State<AppContext>,
    Owner(owner): Owner,
    query: Result<Query<SemanticQuery>, QueryRejection>,
) -> Result<Json<SnippetPage>, AppError> {
    let Query(query) = query?;
    Ok(Json(ctx.service.semantic_search(&owner, query).await?))
}

async fn handle_get(
    State(ctx): State<AppContext>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Snippet>, AppError> {
    Ok(Json(ctx.service.get_snippet_by_id(&owner, &id).await?))
}

async fn handle_update(
    State(ctx): State<AppContext>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Snippet>, AppError> {
    let Json(body) = body?;
    let patch = SnippetPatch::from_json(&body).map_err(SnippetError::from)?;
    Ok(Json(ctx.service.update_snippet(&owner, &id, patch).await?))
}

async fn handle_delete(
    State(ctx): State<AppContext>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ctx.service.delete_snippet(&owner, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ AI assistant ============

#[derive(Deserialize)]
struct ExplainRequest {
    #[serde(default)]
    code: String,
}

#[derive(Serialize)]
struct ExplainResponse {
    explanation: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest {
    #[serde(default)]
    code: String,
    #[serde(default)]
    source_language: Option<String>,
    #[serde(default)]
    target_language: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_code: String,
}

async fn handle_explain(
    State(ctx): State<AppContext>,
    Owner(_owner): Owner,
    body: Result<Json<ExplainRequest>, JsonRejection>,
) -> Result<Json<ExplainResponse>, AppError> {
    let Json(req) = body?;
    let explanation = ctx.assistant.explain(&req.code).await?;
    Ok(Json(ExplainResponse { explanation }))
}

async fn handle_translate(
    State(ctx): State<AppContext>,
    Owner(_owner): Owner,
    body: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslateResponse>, AppError> {
    let Json(req) = body?;
    let translated_code = ctx
        .assistant
        .translate(
            &req.code,
            req.source_language.as_deref(),
            &req.target_language,
        )
        .await?;
    Ok(Json(TranslateResponse { translated_code }))
}
