use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use llm_interface::{build_generator, ClaudeProvider, GeminiProvider, OpenAiProvider, TextGenerator};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use trendpost_core::{CoreError, GenerationError, GenerationSettings, ProviderKind, ProviderOverrides};

async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/generate", addr)
}

fn at(endpoint: String) -> ProviderOverrides {
    ProviderOverrides {
        model: None,
        endpoint: Some(endpoint),
    }
}

fn settings_for(endpoint: String) -> GenerationSettings {
    GenerationSettings {
        gemini: at(endpoint.clone()),
        openai: at(endpoint.clone()),
        claude: at(endpoint),
        gemini_api_key: Some("gemini-key".to_string()),
        openai_api_key: Some("openai-key".to_string()),
        anthropic_api_key: Some("claude-key".to_string()),
        timeout_secs: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_gemini_sends_decoding_config_and_returns_text() {
    let router = Router::new().route(
        "/generate",
        post(
            |Query(query): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                assert_eq!(query.get("key").map(String::as_str), Some("gemini-key"));
                let config = &body["generationConfig"];
                assert_eq!(config["maxOutputTokens"], 2048);
                assert_eq!(config["topK"], 40);
                let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or("");
                Json(json!({
                    "candidates": [{ "content": { "parts": [{ "text": format!("echo: {prompt}") }] } }]
                }))
            },
        ),
    );
    let endpoint = spawn_stub(router).await;

    let provider = GeminiProvider::from_settings(&settings_for(endpoint)).unwrap();
    let text = provider.generate("hello").await.unwrap();
    assert_eq!(text, "echo: hello");
}

#[tokio::test]
async fn test_upstream_error_carries_status_and_body() {
    let router = Router::new().route(
        "/generate",
        post(|| async { (StatusCode::BAD_REQUEST, "quota project missing") }),
    );
    let endpoint = spawn_stub(router).await;

    let provider = GeminiProvider::from_settings(&settings_for(endpoint)).unwrap();
    let err = tokio_test::assert_err!(provider.generate("hello").await);
    match err {
        CoreError::Generation(GenerationError::UpstreamStatus { status, body, .. }) => {
            assert_eq!(status, 400);
            assert!(body.contains("quota project missing"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_honours_retry_after() {
    let router = Router::new().route(
        "/generate",
        post(|| async {
            let mut headers = HeaderMap::new();
            headers.insert("retry-after", "7".parse().unwrap());
            (StatusCode::TOO_MANY_REQUESTS, headers, "slow down").into_response()
        }),
    );
    let endpoint = spawn_stub(router).await;

    let provider = OpenAiProvider::from_settings(&settings_for(endpoint)).unwrap();
    let err = tokio_test::assert_err!(provider.generate("hello").await);
    assert!(matches!(
        err,
        CoreError::Generation(GenerationError::RateLimitExceeded { retry_after: 7, .. })
    ));
}

#[tokio::test]
async fn test_openai_uses_bearer_and_persona() {
    let router = Router::new().route(
        "/generate",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            assert_eq!(auth, "Bearer openai-key");
            assert_eq!(body["messages"][0]["role"], "system");
            assert_eq!(body["messages"][1]["content"], "hello");
            Json(json!({ "choices": [{ "message": { "content": "{\"title\":\"t\"}" } }] }))
        }),
    );
    let endpoint = spawn_stub(router).await;

    let provider = OpenAiProvider::from_settings(&settings_for(endpoint)).unwrap();
    assert_eq!(provider.generate("hello").await.unwrap(), "{\"title\":\"t\"}");
}

#[tokio::test]
async fn test_claude_sends_version_header() {
    let router = Router::new().route(
        "/generate",
        post(|headers: HeaderMap| async move {
            assert_eq!(
                headers.get("x-api-key").and_then(|v| v.to_str().ok()),
                Some("claude-key")
            );
            assert!(headers.contains_key("anthropic-version"));
            Json(json!({ "content": [{ "type": "text", "text": "done" }] }))
        }),
    );
    let endpoint = spawn_stub(router).await;

    let provider = ClaudeProvider::from_settings(&settings_for(endpoint)).unwrap();
    assert_eq!(provider.generate("hello").await.unwrap(), "done");
}

#[tokio::test]
async fn test_missing_key_fails_before_network() {
    // Port 9 (discard) is never served here; reaching it would surface a different error
    let settings = GenerationSettings {
        gemini: at("http://127.0.0.1:9/generate".to_string()),
        ..Default::default()
    };

    let provider = GeminiProvider::from_settings(&settings).unwrap();
    assert!(!provider.is_configured());
    let err = tokio_test::assert_err!(provider.generate("hello").await);
    assert!(matches!(
        err,
        CoreError::Generation(GenerationError::MissingApiKey { .. })
    ));
}

#[tokio::test]
async fn test_empty_candidates_is_invalid_format() {
    let router = Router::new().route(
        "/generate",
        post(|| async { Json(json!({ "candidates": [] })) }),
    );
    let endpoint = spawn_stub(router).await;

    let provider = GeminiProvider::from_settings(&settings_for(endpoint)).unwrap();
    let err = tokio_test::assert_err!(provider.generate("hello").await);
    assert!(matches!(
        err,
        CoreError::Generation(GenerationError::InvalidResponseFormat { .. })
    ));
}

#[tokio::test]
async fn test_rotation_keeps_each_providers_model_and_endpoint() {
    let seen: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let openai_seen = seen.clone();
    let claude_seen = seen.clone();
    let router = Router::new()
        .route(
            "/openai",
            post(move |Json(body): Json<Value>| {
                let seen = openai_seen.clone();
                async move {
                    seen.lock()
                        .unwrap()
                        .push(("openai".to_string(), body["model"].clone()));
                    Json(json!({ "choices": [{ "message": { "content": "from openai" } }] }))
                }
            }),
        )
        .route(
            "/claude",
            post(move |Json(body): Json<Value>| {
                let seen = claude_seen.clone();
                async move {
                    seen.lock()
                        .unwrap()
                        .push(("claude".to_string(), body["model"].clone()));
                    Json(json!({ "content": [{ "type": "text", "text": "from claude" }] }))
                }
            }),
        );
    let base = spawn_stub(router).await.replace("/generate", "");

    let settings = GenerationSettings {
        rotation: vec![ProviderKind::OpenAi, ProviderKind::Claude],
        openai: ProviderOverrides {
            model: Some("gpt-4o".to_string()),
            endpoint: Some(format!("{base}/openai")),
        },
        claude: at(format!("{base}/claude")),
        openai_api_key: Some("openai-key".to_string()),
        anthropic_api_key: Some("claude-key".to_string()),
        timeout_secs: 5,
        ..Default::default()
    };
    let generator = build_generator(&settings).unwrap();

    let mut replies = vec![
        generator.generate("one").await.unwrap(),
        generator.generate("two").await.unwrap(),
    ];
    replies.sort();
    assert_eq!(replies, vec!["from claude", "from openai"]);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    for (provider, model) in seen {
        match provider.as_str() {
            "openai" => assert_eq!(model, "gpt-4o"),
            _ => assert_eq!(model, "claude-3-sonnet-20240229"),
        }
    }
}
