use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::startup::AppState;

/// Liveness probe. Also reports whether prompts go to the provider or are simulated.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let mode = if state.config.api_key_present() {
        "live"
    } else {
        "simulated"
    };

    Json(json!({
        "status": "ok",
        "service": "gemini-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "mode": mode
    }))
}
