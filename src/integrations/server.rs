//! HTTP front door
//!
//! Exposes the hub operations and the inbound webhook routes over axum.
//! Provider failures come back as `200` with an error envelope; only missing
//! parameters (`400`) and a bad Sentry signature (`401`) change the status.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::envelope::SyncResult;
use super::github::FileChange;
use super::registry::{HubStatus, IntegrationHub};
use super::traits::IntegrationError;
use super::webhooks::{SentrySignatureVerifier, WebhookPayload, SIGNATURE_HEADER};
use super::workflow::WorkflowRecord;
use crate::config::{IntegrationConfig, ServerConfig};

/// Service name reported by `/health`
pub const SERVICE_NAME: &str = "integration-hub";

/// Shared state for every route
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<IntegrationHub>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(hub: Arc<IntegrationHub>, config: ServerConfig) -> Self {
        Self { hub, config }
    }
}

/// Request-level failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Invalid or missing Sentry signature
    #[error("Invalid or missing webhook signature")]
    InvalidSignature,
    /// A required body or query field is absent
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    /// The request body is not the expected JSON
    #[error("Failed to parse request body: {0}")]
    ParseError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidSignature => StatusCode::UNAUTHORIZED,
            ApiError::MissingParameter(_) | ApiError::ParseError(_) => StatusCode::BAD_REQUEST,
        };

        (status, Json(SyncResult::error(self.to_string()))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    #[serde(alias = "api_key")]
    pub credential: Option<String>,
    #[serde(default)]
    pub base_url: String,
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LinearSyncRequest {
    pub api_key: Option<String>,
    pub team_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GitHubSyncRequest {
    pub repo: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestRequest {
    pub token: Option<String>,
    pub repo: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub files: Option<Vec<FileChange>>,
}

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub webhook_url: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AirtableExportRequest {
    pub base_id: Option<String>,
    pub table_name: Option<String>,
    pub api_key: Option<String>,
    pub workflows: Option<Vec<WorkflowRecord>>,
}

#[derive(Debug, Deserialize)]
pub struct NotionSyncRequest {
    pub database_id: Option<String>,
    pub token: Option<String>,
    pub workflows: Option<Vec<WorkflowRecord>>,
}

#[derive(Debug, Deserialize)]
pub struct SupabaseHealthQuery {
    pub access_token: Option<String>,
    pub project_ref: Option<String>,
}

fn required<T>(value: Option<T>, name: &'static str) -> ApiResult<T> {
    value.ok_or(ApiError::MissingParameter(name))
}

/// Parse a JSON body; rejections use the envelope shape instead of axum's
/// plain-text extractor errors
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::ParseError(e.to_string()))
}

/// Create the router with every hub route
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/integrations/status", get(status_handler))
        .route("/integrations/register", post(register_handler))
        .route("/integrations/linear/sync", post(linear_sync_handler))
        .route("/integrations/github/sync", post(github_sync_handler))
        .route("/integrations/github/pr", post(github_pr_handler))
        .route("/integrations/slack/notify", post(slack_notify_handler))
        .route("/integrations/discord/notify", post(discord_notify_handler))
        .route("/integrations/airtable/export", post(airtable_export_handler))
        .route("/integrations/notion/sync", post(notion_sync_handler))
        .route("/integrations/supabase/health", get(supabase_health_handler))
        .route("/webhooks/sentry", post(sentry_webhook_handler))
        .route("/webhooks/{endpoint}", post(webhook_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `config.socket_addr()` and serve until the process stops
pub async fn serve(hub: Arc<IntegrationHub>, config: ServerConfig) -> std::io::Result<()> {
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Integration hub listening");

    let app = create_router(AppState::new(hub, config));
    axum::serve(listener, app).await
}

/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /integrations/status
pub async fn status_handler(State(state): State<AppState>) -> Json<HubStatus> {
    Json(state.hub.status().await)
}

/// POST /integrations/register
pub async fn register_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SyncResult>> {
    let request: RegisterRequest = parse_body(&body)?;
    let name = required(request.name, "name")?;
    let credential = required(request.credential, "api_key")?;

    let config = IntegrationConfig {
        name: name.clone(),
        credential,
        base_url: request.base_url,
        enabled: request.enabled.unwrap_or(true),
    };
    state.hub.register(config).await;

    Ok(Json(
        SyncResult::success(format!("Integration {} registered", name)).with("name", name),
    ))
}

/// POST /integrations/linear/sync
pub async fn linear_sync_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SyncResult>> {
    let request: LinearSyncRequest = parse_body(&body)?;
    let api_key = required(request.api_key, "api_key")?;

    Ok(Json(
        state
            .hub
            .sync_with_linear(&api_key, request.team_key.as_deref())
            .await,
    ))
}

/// POST /integrations/github/sync
pub async fn github_sync_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SyncResult>> {
    let request: GitHubSyncRequest = parse_body(&body)?;
    let repo = required(request.repo, "repo")?;
    let token = required(request.token, "token")?;

    Ok(Json(state.hub.sync_with_github(&repo, &token).await))
}

/// POST /integrations/github/pr
pub async fn github_pr_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SyncResult>> {
    let request: PullRequestRequest = parse_body(&body)?;
    let token = required(request.token, "token")?;
    let repo = required(request.repo, "repo")?;
    let title = required(request.title, "title")?;
    let files = required(request.files, "files")?;

    Ok(Json(
        state
            .hub
            .create_github_pr(&token, &repo, &title, request.description.as_deref(), files)
            .await,
    ))
}

/// POST /integrations/slack/notify
pub async fn slack_notify_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SyncResult>> {
    let request: NotifyRequest = parse_body(&body)?;
    let webhook_url = required(request.webhook_url, "webhook_url")?;
    let message = required(request.message, "message")?;

    Ok(Json(state.hub.notify_slack(&webhook_url, &message).await))
}

/// POST /integrations/discord/notify
pub async fn discord_notify_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SyncResult>> {
    let request: NotifyRequest = parse_body(&body)?;
    let webhook_url = required(request.webhook_url, "webhook_url")?;
    let message = required(request.message, "message")?;

    Ok(Json(state.hub.notify_discord(&webhook_url, &message).await))
}

/// POST /integrations/airtable/export
pub async fn airtable_export_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SyncResult>> {
    let request: AirtableExportRequest = parse_body(&body)?;
    let base_id = required(request.base_id, "base_id")?;
    let table_name = required(request.table_name, "table_name")?;
    let api_key = required(request.api_key, "api_key")?;
    let workflows = required(request.workflows, "workflows")?;

    Ok(Json(
        state
            .hub
            .export_to_airtable(&base_id, &table_name, &api_key, &workflows)
            .await,
    ))
}

/// POST /integrations/notion/sync
pub async fn notion_sync_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SyncResult>> {
    let request: NotionSyncRequest = parse_body(&body)?;
    let database_id = required(request.database_id, "database_id")?;
    let token = required(request.token, "token")?;
    let workflows = required(request.workflows, "workflows")?;

    Ok(Json(
        state
            .hub
            .sync_with_notion(&database_id, &token, &workflows)
            .await,
    ))
}

/// GET /integrations/supabase/health?access_token=..&project_ref=..
pub async fn supabase_health_handler(
    State(state): State<AppState>,
    Query(query): Query<SupabaseHealthQuery>,
) -> ApiResult<Json<SyncResult>> {
    let access_token = required(query.access_token, "access_token")?;
    let project_ref = required(query.project_ref, "project_ref")?;

    Ok(Json(
        state
            .hub
            .check_supabase_health(&access_token, &project_ref)
            .await,
    ))
}

/// Returns Ok(()) if the signature is valid or no secret is configured
fn verify_sentry_signature(
    secret: Option<&str>,
    payload: &[u8],
    headers: &HeaderMap,
) -> ApiResult<()> {
    let Some(secret) = secret else {
        return Ok(());
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::InvalidSignature)?;

    if SentrySignatureVerifier::new(secret).verify_signature(payload, signature) {
        Ok(())
    } else {
        Err(ApiError::InvalidSignature)
    }
}

/// POST /webhooks/sentry
pub async fn sentry_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<SyncResult>> {
    verify_sentry_signature(state.config.sentry_secret.as_deref(), &body, &headers)?;

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Unreadable Sentry webhook body");
            return Ok(Json(IntegrationError::MalformedPayload(e.to_string()).into()));
        }
    };

    Ok(Json(state.hub.handle_sentry_alert(&payload).await))
}

/// POST /webhooks/{endpoint}
pub async fn webhook_handler(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    body: Bytes,
) -> Json<SyncResult> {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "Unreadable webhook body");
            return Json(IntegrationError::MalformedPayload(e.to_string()).into());
        }
    };

    Json(state.hub.dispatch(&endpoint, payload).await)
}
