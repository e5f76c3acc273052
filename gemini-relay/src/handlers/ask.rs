use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use std::time::Instant;
use validator::Validate;

use crate::startup::AppState;

pub const NOT_JSON_MESSAGE: &str = "Request must be JSON";
pub const MISSING_PROMPT_MESSAGE: &str = "Missing 'prompt' in request data";

/// Prefix of the 500 body when the provider call fails.
pub const PROVIDER_FAILURE_PREFIX: &str = "Failed to get response from Gemini";

#[derive(Debug, Deserialize, Validate)]
pub struct PromptRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub prompt: String,
}

impl PromptRequest {
    /// Accepts only an object whose `prompt` is a non-empty string.
    fn from_body(body: Value) -> Result<Self, AppError> {
        let missing = || AppError::BadRequest(MISSING_PROMPT_MESSAGE.to_string());

        // serde would happily read a struct out of a JSON array.
        if !body.is_object() {
            return Err(missing());
        }

        let request: PromptRequest = serde_json::from_value(body).map_err(|_| missing())?;
        request.validate().map_err(|_| missing())?;
        Ok(request)
    }
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub response: String,
}

/// Placeholder answer used when no API key is configured.
pub fn simulated_answer(prompt: &str) -> String {
    format!("Simulated answer to: {}", prompt)
}

/// `POST /ask-gemini`
#[tracing::instrument(skip_all)]
pub async fn ask_gemini(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PromptResponse>, AppError> {
    let Json(body) = payload.map_err(|rejection| {
        tracing::debug!(reason = %rejection.body_text(), "Rejected request body");
        AppError::BadRequest(NOT_JSON_MESSAGE.to_string())
    })?;

    let PromptRequest { prompt } = PromptRequest::from_body(body)?;

    if !state.config.api_key_present() {
        tracing::warn!("API key not set, returning simulated response");
        counter!("relay_prompts_total", "outcome" => "simulated").increment(1);
        return Ok(Json(PromptResponse {
            response: simulated_answer(&prompt),
        }));
    }

    let provider = state.text_provider.name().to_string();
    let start = Instant::now();
    let result = state.text_provider.generate(&prompt).await;
    histogram!("relay_provider_latency_seconds", "provider" => provider.clone())
        .record(start.elapsed().as_secs_f64());

    match result {
        Ok(text) => {
            counter!("relay_prompts_total", "outcome" => "success").increment(1);
            Ok(Json(PromptResponse { response: text }))
        }
        Err(e) => {
            tracing::error!(provider = %provider, error = %e, "Error calling generation provider");
            counter!("relay_prompts_total", "outcome" => "failure").increment(1);
            Err(AppError::UpstreamFailure(format!(
                "{}: {}",
                PROVIDER_FAILURE_PREFIX, e
            )))
        }
    }
}
