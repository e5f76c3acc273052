//! Application startup and lifecycle management.
//!
//! Builds the provider once from configuration, wires the router and its
//! middleware stack, and serves it until a shutdown signal arrives.

use crate::config::RelayConfig;
use crate::handlers::{ask_gemini, health_check, metrics::metrics};
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::mock::MockTextProvider;
use crate::services::{ProviderError, TextProvider};
use axum::{
    body::Body,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{http_request_span, metrics_middleware, request_id_middleware};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub text_provider: Arc<dyn TextProvider>,
}

impl AppState {
    pub fn new(config: RelayConfig, text_provider: Arc<dyn TextProvider>) -> Self {
        Self {
            config: Arc::new(config),
            text_provider,
        }
    }

    /// Pick the provider for `config`: Gemini when a key is configured,
    /// otherwise an inert placeholder that the handler never reaches.
    pub fn from_config(config: RelayConfig) -> Result<Self, AppError> {
        let text_provider: Arc<dyn TextProvider> =
            match GeminiConfig::from_settings(&config.gemini) {
                Some(gemini_config) => {
                    let provider = GeminiTextProvider::new(gemini_config).map_err(|e| {
                        tracing::error!("Could not configure Gemini client: {}", e);
                        AppError::ConfigError(anyhow::anyhow!(e))
                    })?;
                    tracing::info!(model = %provider.model(), "Initialized Gemini text provider");
                    Arc::new(provider)
                }
                None => {
                    tracing::error!(
                        "Gemini API key not set (GEMINI_API_KEY); prompts will get simulated responses"
                    );
                    Arc::new(MockTextProvider::failing(ProviderError::NotConfigured(
                        "GEMINI_API_KEY not set".to_string(),
                    )))
                }
            };

        Ok(Self::new(config, text_provider))
    }
}

/// CORS policy: any origin, method and header.
///
/// Fine for local tools talking to the relay from the browser. Restrict the
/// origin list before exposing the relay publicly.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the HTTP router with the full middleware stack.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ask-gemini", post(ask_gemini))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(http_request_span::<Body>))
        .layer(from_fn(request_id_middleware))
        .layer(cors_layer())
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: RelayConfig) -> Result<Self, AppError> {
        let state = AppState::from_config(config)?;
        Self::with_state(state).await
    }

    /// Bind the listener for an already-assembled state (port 0 = random port).
    pub async fn with_state(state: AppState) -> Result<Self, AppError> {
        let address = state.config.common.bind_address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::warn!("CORS allows any origin; restrict it before exposing the relay publicly");
        tracing::info!(
            "Starting server on http://{}:{}",
            state.config.common.host,
            port
        );

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal is received.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("Server error: {}", e);
                e
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
