//! HTTP API over the resolver.
//!
//! | Method | Path | |
//! |--------|------|-|
//! | `GET`  | `/health` | liveness |
//! | `GET`  | `/books/:isbn` | resolve and return the merged record |
//! | `POST` | `/books/:isbn` | resolve, then file into Notion |

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, NotionConfig};
use crate::isbn::{self, IsbnError};
use crate::notion::{NotionClient, Review, UpsertOutcome};
use crate::pipeline::{LookupError, Resolver};
use crate::providers;
use crate::record::CanonicalRecord;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed ISBN or request body (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No provider knows the book (404)
    #[error(transparent)]
    NotFound(#[from] LookupError),

    /// Notion credentials missing (503)
    #[error("Notion is not configured")]
    NotionUnavailable,

    /// Notion rejected or failed the upsert (502)
    #[error("Notion request failed: {0:#}")]
    Notion(anyhow::Error),
}

impl From<IsbnError> for ApiError {
    fn from(e: IsbnError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::NotionUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "NOTION_UNAVAILABLE"),
            ApiError::Notion(_) => (StatusCode::BAD_GATEWAY, "NOTION_ERROR"),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    resolver: Arc<Resolver>,
    client: Client,
    notion: NotionConfig,
    notion_base_url: Option<String>,
}

impl AppState {
    pub fn new(resolver: Resolver, client: Client, notion: NotionConfig) -> Self {
        Self {
            resolver: Arc::new(resolver),
            client,
            notion,
            notion_base_url: None,
        }
    }

    pub fn with_notion_base_url(mut self, url: impl Into<String>) -> Self {
        self.notion_base_url = Some(url.into());
        self
    }
}

/// Optional body of `POST /books/:isbn`. Empty fields fall back to configuration.
#[derive(Debug, Default, Deserialize)]
pub struct AddBookRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub database_id: Option<String>,
    #[serde(default)]
    pub review: Option<Review>,
}

#[derive(Debug, Serialize)]
pub struct AddBookResponse {
    pub status: &'static str,
    pub outcome: UpsertOutcome,
    pub record: CanonicalRecord,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/books/:isbn", get(get_book).post(add_book))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(config: &Config, addr: &str) -> Result<()> {
    let client = providers::http_client(&config.http)?;
    let resolver = Resolver::from_config(config)?;
    log::info!("Provider chain: {}", resolver.provider_names().join(" → "));
    if !config.notion.is_configured() {
        log::warn!("Notion is not configured; POST /books requires token and database_id in the body");
    }

    let state = AppState::new(resolver, client, config.notion.clone());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .await
        .context("HTTP server error")
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_book(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<CanonicalRecord>> {
    let isbn = isbn::canonical(&raw)?;
    let record = state.resolver.resolve(&isbn).await?;
    Ok(Json(record))
}

async fn add_book(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> ApiResult<Json<AddBookResponse>> {
    let isbn = isbn::canonical(&raw)?;
    let request: AddBookRequest = if body.iter().all(u8::is_ascii_whitespace) {
        AddBookRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let mut notion = state.notion.clone();
    if let Some(token) = request.token.filter(|t| !t.is_empty()) {
        notion.token = token;
    }
    if let Some(id) = request.database_id.filter(|d| !d.is_empty()) {
        notion.database_id = id;
    }
    if !notion.is_configured() {
        return Err(ApiError::NotionUnavailable);
    }

    let record = state.resolver.resolve(&isbn).await?;

    let mut client = NotionClient::new(state.client.clone(), &notion);
    if let Some(url) = &state.notion_base_url {
        client = client.with_base_url(url.clone());
    }
    let outcome = client
        .upsert(&record, request.review.as_ref())
        .await
        .map_err(ApiError::Notion)?;

    Ok(Json(AddBookResponse {
        status: "ok",
        outcome,
        record,
    }))
}
