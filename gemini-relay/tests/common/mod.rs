//! Shared helpers for gemini-relay integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use gemini_relay::config::{GeminiSettings, RelayConfig};
use gemini_relay::services::providers::mock::MockTextProvider;
use gemini_relay::services::TextProvider;
use gemini_relay::{build_router, AppState, Application};
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_API_KEY: &str = "test-api-key";

/// Config bound to an ephemeral localhost port, with or without an API key.
pub fn test_config(api_key: Option<&str>) -> RelayConfig {
    let mut gemini = GeminiSettings::without_key();
    if let Some(key) = api_key {
        gemini = gemini.with_api_key(key);
    }

    RelayConfig {
        common: CoreConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            log_level: "error".to_string(),
        },
        gemini,
    }
}

pub fn state_with(config: RelayConfig, provider: Arc<MockTextProvider>) -> AppState {
    AppState::new(config, provider as Arc<dyn TextProvider>)
}

pub fn router_with(api_key: Option<&str>, provider: Arc<MockTextProvider>) -> Router {
    build_router(state_with(test_config(api_key), provider))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

/// Send one request through the router and decode the JSON body.
pub async fn send(router: Router, request: Request<Body>) -> TestResponse {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is not JSON")
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

/// `POST /ask-gemini` with an `application/json` body.
pub fn ask_json(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/ask-gemini")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// `POST /ask-gemini` with no content type at all.
pub fn ask_raw(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/ask-gemini")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A running server on a random port.
pub struct TestApp {
    pub address: String,
    pub port: u16,
}

impl TestApp {
    pub async fn spawn(state: AppState) -> Self {
        let app = Application::with_state(state)
            .await
            .expect("Failed to build test application");
        let port = app.port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let address = format!("http://127.0.0.1:{}", port);

        // Wait for the server to accept connections.
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", address))
                .send()
                .await
                .is_ok()
            {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp { address, port }
    }
}
