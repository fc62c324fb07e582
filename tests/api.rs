use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use database::Database;
use llm_interface::TextGenerator;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use trendpost::{create_router, ApiState, App};
use trendpost_core::{AppConfig, Clock, CoreError, ManualClock, SessionRecord};

struct FixedGenerator {
    configured: bool,
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    fn provider_name(&self) -> &str {
        "fixed"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn generate(&self, _prompt: &str) -> Result<String, CoreError> {
        Ok(json!({
            "title": "Cursor AI Guide",
            "summary": "요약",
            "sections": [{ "heading": "개요", "content": "<p>본문</p>" }],
            "tags": ["Cursor"]
        })
        .to_string())
    }
}

struct TestServer {
    router: Router,
    app: App,
    clock: Arc<ManualClock>,
}

async fn setup_test_server(configured: bool) -> TestServer {
    let mut config = AppConfig::default();
    config.auth.cron_secret = Some("s3cret".to_string());
    config.generation.item_delay_ms = 0;
    config.retry.max_attempts = 1;

    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap()));
    let database = Database::connect_in_memory().await.unwrap();
    let app = App::assemble(
        &config,
        database,
        Arc::new(FixedGenerator { configured }),
        clock.clone(),
    )
    .await
    .unwrap();

    let router = create_router(ApiState::new(app.service.clone(), app.authenticator.clone()));
    TestServer { router, app, clock }
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

const BEARER: (&str, &str) = ("authorization", "Bearer s3cret");

#[tokio::test]
async fn test_health() {
    let server = setup_test_server(true).await;
    let (status, body) = send(&server.router, "GET", "/health", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_cron_requires_secret() {
    let server = setup_test_server(true).await;
    let action = json!({ "action": "health_check" });

    let (status, body) = send(
        &server.router,
        "POST",
        "/api/cron/automation",
        &[],
        Some(action.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "AUTH");

    let (status, _) = send(
        &server.router,
        "POST",
        "/api/cron/automation",
        &[("authorization", "Bearer wrong")],
        Some(action),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_action_is_bad_request() {
    let server = setup_test_server(true).await;
    let (status, body) = send(
        &server.router,
        "POST",
        "/api/cron/automation",
        &[BEARER],
        Some(json!({ "action": "reboot" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_health_check_action() {
    let server = setup_test_server(true).await;
    let (status, body) = send(
        &server.router,
        "POST",
        "/api/cron/automation",
        &[BEARER],
        Some(json!({ "action": "health_check" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // No notification channels are configured
    assert_eq!(body["data"]["status"], "degraded");

    let (status, body) = send(&server.router, "GET", "/api/cron/automation", &[BEARER], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tasks"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_auto_post_with_admin_session() {
    let server = setup_test_server(true).await;
    let now = server.clock.now();
    for (token, role) in [("admin-token", "admin"), ("user-token", "user")] {
        server
            .app
            .database
            .create_session(
                &SessionRecord {
                    token: token.to_string(),
                    user_id: format!("{role}-1"),
                    role: role.to_string(),
                    expires_at: Some(now + Duration::hours(1)),
                },
                now,
            )
            .await
            .unwrap();
    }

    let (status, _) = send(
        &server.router,
        "POST",
        "/api/ai-trends/auto-post",
        &[("x-session-token", "user-token")],
        Some(json!({ "count": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &server.router,
        "POST",
        "/api/ai-trends/auto-post",
        &[("x-session-token", "admin-token")],
        Some(json!({ "count": 2, "autoPublish": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["stats"]["saved"], 2);
    assert_eq!(body["stats"]["status"], "draft");
    assert_eq!(body["posts"][0]["slug"], "cursor-ai-guide");
    assert_ne!(body["posts"][1]["slug"], "cursor-ai-guide");
}

#[tokio::test]
async fn test_generate_preview() {
    let server = setup_test_server(true).await;
    let (status, body) = send(
        &server.router,
        "POST",
        "/api/ai-trends/generate",
        &[BEARER],
        Some(json!({ "count": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generated"], 2);
    assert_eq!(body["contents"][0]["title"], "Cursor AI Guide");
}

#[tokio::test]
async fn test_missing_credentials_is_server_error_envelope() {
    let server = setup_test_server(false).await;
    let (status, body) = send(
        &server.router,
        "POST",
        "/api/ai-trends/auto-post",
        &[BEARER],
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "GENERATION");
}

#[tokio::test]
async fn test_auto_post_rejects_oversized_count() {
    let server = setup_test_server(true).await;
    let (status, body) = send(
        &server.router,
        "POST",
        "/api/ai-trends/auto-post",
        &[BEARER],
        Some(json!({ "count": u64::MAX, "category": "MCP 추천" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "INVALID_INPUT");

    let (status, _) = send(
        &server.router,
        "POST",
        "/api/ai-trends/auto-post",
        &[BEARER],
        Some(json!({ "count": 11 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
