//! HTTP triggers for the automation service.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use background_service::{
    Authenticator, AutomationAction, BackgroundService, BatchRequest, Credentials, Pipeline,
    MAX_BATCH_COUNT,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use trendpost_core::{CoreError, ErrorExt};

pub const SESSION_HEADER: &str = "x-session-token";
const DEFAULT_PREVIEW_COUNT: usize = 1;

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<BackgroundService>,
    pub auth: Arc<Authenticator>,
}

impl ApiState {
    pub fn new(service: Arc<BackgroundService>, auth: Arc<Authenticator>) -> Self {
        Self { service, auth }
    }

    fn pipeline(&self) -> &Arc<Pipeline> {
        self.service.automation().pipeline()
    }
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/cron/automation",
            get(automation_status).post(run_automation),
        )
        .route("/api/ai-trends/generate", post(generate))
        .route("/api/ai-trends/auto-post", post(auto_post))
        .with_state(state)
}

/// Failure envelope. Never a bare string.
pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::Auth(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::UNAUTHORIZED)
            }
            CoreError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            self.0.log_error();
        } else {
            warn!("Request rejected: {}", self.0);
        }
        let body = json!({
            "success": false,
            "message": self.0.user_friendly_message(),
            "error": self.0.error_code(),
        });
        (status, Json(body)).into_response()
    }
}

fn credentials(headers: &HeaderMap) -> Credentials {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    Credentials {
        bearer: Credentials::from_authorization(header("authorization")),
        session_token: header(SESSION_HEADER)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
    }
}

#[instrument(skip_all)]
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "healthy", "timestamp": chrono::Utc::now() })),
    )
}

#[derive(Debug, Deserialize)]
struct AutomationBody {
    action: String,
}

#[instrument(skip_all)]
async fn automation_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    state
        .auth
        .authorize_cron(&credentials(&headers))
        .map_err(CoreError::from)?;
    let status = state.service.status();
    Ok(Json(json!({
        "success": true,
        "message": "Automation status",
        "data": status,
    })))
}

#[instrument(skip_all)]
async fn run_automation(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<AutomationBody>,
) -> Result<Json<Value>, ApiError> {
    let principal = state
        .auth
        .authorize_cron(&credentials(&headers))
        .map_err(CoreError::from)?;
    let action = AutomationAction::parse(&body.action).ok_or_else(|| CoreError::InvalidInput {
        message: format!("Unknown action '{}'", body.action),
    })?;

    info!("Automation trigger: {}", action);
    let outcome = state.service.run_action(action, &principal).await?;
    Ok(Json(json!({
        "success": outcome.success,
        "message": outcome.message,
        "data": outcome.data,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateBody {
    count: Option<usize>,
}

#[instrument(skip_all)]
async fn generate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Option<Json<GenerateBody>>,
) -> Result<Json<Value>, ApiError> {
    let principal = state.auth.authorize(&credentials(&headers)).await?;
    let count = body
        .and_then(|Json(b)| b.count)
        .filter(|c| *c > 0)
        .unwrap_or(DEFAULT_PREVIEW_COUNT)
        .min(MAX_BATCH_COUNT);

    let contents = state.pipeline().generate_preview(&principal, count).await?;
    Ok(Json(json!({
        "success": true,
        "generated": contents.len(),
        "contents": contents,
    })))
}

#[instrument(skip_all)]
async fn auto_post(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Option<Json<BatchRequest>>,
) -> Result<Json<Value>, ApiError> {
    let principal = state.auth.authorize(&credentials(&headers)).await?;
    let request = body.map(|Json(b)| b).unwrap_or_default();

    let report = state.pipeline().run_batch(&principal, &request).await?;
    Ok(Json(json!({
        "success": report.success,
        "message": report.message,
        "posts": report.posts,
        "errors": report.errors,
        "stats": {
            "generated": report.generated,
            "saved": report.saved,
            "failed": report.failed,
            "status": report.status,
        },
    })))
}
