//! GeminiTextProvider against a local stand-in for the Gemini REST API.

mod common;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use common::{test_config, TestApp, TEST_API_KEY};
use gemini_relay::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use gemini_relay::services::{ProviderError, TextProvider};
use gemini_relay::AppState;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct RecordedCall {
    method: String,
    api_key: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct StubState {
    status: StatusCode,
    reply: String,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

async fn generate_content(
    State(stub): State<StubState>,
    Path(method): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    stub.calls.lock().unwrap().push(RecordedCall {
        method,
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string()),
        body,
    });

    if let Some(delay) = stub.delay {
        tokio::time::sleep(delay).await;
    }

    (
        stub.status,
        [("content-type", "application/json")],
        stub.reply.clone(),
    )
}

struct GeminiStub {
    base_url: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl GeminiStub {
    async fn spawn(status: StatusCode, reply: impl Into<String>, delay: Option<Duration>) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            status,
            reply: reply.into(),
            delay,
            calls: calls.clone(),
        };

        let router = Router::new()
            .route("/v1beta/models/:method", post(generate_content))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        GeminiStub {
            base_url: format!("http://127.0.0.1:{}/v1beta", port),
            calls,
        }
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

fn provider_for(base_url: &str, timeout: Option<Duration>) -> GeminiTextProvider {
    let mut settings = test_config(Some(TEST_API_KEY)).gemini;
    settings.base_url = base_url.to_string();
    let mut config = GeminiConfig::from_settings(&settings).unwrap();
    config.timeout = timeout;
    GeminiTextProvider::new(config).unwrap()
}

fn candidate(text: &str) -> String {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2}
    })
    .to_string()
}

#[tokio::test]
async fn sends_prompt_and_key_and_returns_candidate_text() {
    let stub = GeminiStub::spawn(StatusCode::OK, candidate("Hi there!"), None).await;
    let provider = provider_for(&stub.base_url, None);

    let text = provider.generate("Say hi").await.unwrap();

    assert_eq!(text, "Hi there!");
    let calls = stub.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "gemini-pro:generateContent");
    assert_eq!(calls[0].api_key.as_deref(), Some(TEST_API_KEY));
    assert_eq!(
        calls[0].body,
        json!({"contents": [{"role": "user", "parts": [{"text": "Say hi"}]}]})
    );
}

#[tokio::test]
async fn rate_limit_status_maps_to_rate_limited() {
    let stub = GeminiStub::spawn(StatusCode::TOO_MANY_REQUESTS, "{}", None).await;
    let provider = provider_for(&stub.base_url, None);

    assert_eq!(
        provider.generate("x").await.unwrap_err(),
        ProviderError::RateLimited
    );
}

#[tokio::test]
async fn api_error_message_is_extracted() {
    let reply = json!({
        "error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}
    })
    .to_string();
    let stub = GeminiStub::spawn(StatusCode::BAD_REQUEST, reply, None).await;
    let provider = provider_for(&stub.base_url, None);

    assert_eq!(
        provider.generate("x").await.unwrap_err(),
        ProviderError::ApiError("Gemini API error 400 Bad Request: API key not valid.".to_string())
    );
}

#[tokio::test]
async fn unparseable_success_body_is_an_api_error() {
    let stub = GeminiStub::spawn(StatusCode::OK, "definitely not json", None).await;
    let provider = provider_for(&stub.base_url, None);

    match provider.generate("x").await.unwrap_err() {
        ProviderError::ApiError(msg) => assert!(msg.starts_with("Failed to parse response")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let provider = provider_for(&format!("http://127.0.0.1:{}/v1beta", port), None);

    assert!(matches!(
        provider.generate("x").await.unwrap_err(),
        ProviderError::NetworkError(_)
    ));
}

#[tokio::test]
async fn configured_timeout_applies() {
    let stub = GeminiStub::spawn(
        StatusCode::OK,
        candidate("too late"),
        Some(Duration::from_secs(3)),
    )
    .await;
    let provider = provider_for(&stub.base_url, Some(Duration::from_millis(200)));

    assert!(matches!(
        provider.generate("x").await.unwrap_err(),
        ProviderError::NetworkError(_)
    ));
}

#[tokio::test]
async fn relay_end_to_end_against_stubbed_gemini() {
    let stub = GeminiStub::spawn(StatusCode::OK, candidate("Paris"), None).await;
    let provider = Arc::new(provider_for(&stub.base_url, None));
    let state = AppState::new(test_config(Some(TEST_API_KEY)), provider);
    let app = TestApp::spawn(state).await;

    let response = reqwest::Client::new()
        .post(format!("{}/ask-gemini", app.address))
        .header("origin", "https://example.com")
        .json(&json!({"prompt": "Capital of France?"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"response": "Paris"}));
    assert_eq!(stub.calls().len(), 1);
}

#[tokio::test]
async fn relay_surfaces_gemini_failure_as_500() {
    let stub = GeminiStub::spawn(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({"error": {"code": 503, "message": "The model is overloaded."}}).to_string(),
        None,
    )
    .await;
    let provider = Arc::new(provider_for(&stub.base_url, None));
    let state = AppState::new(test_config(Some(TEST_API_KEY)), provider);
    let app = TestApp::spawn(state).await;

    let response = reqwest::Client::new()
        .post(format!("{}/ask-gemini", app.address))
        .json(&json!({"prompt": "Hello"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "error": "Failed to get response from Gemini: API error: Gemini API error 503 Service Unavailable: The model is overloaded."
        })
    );
}
