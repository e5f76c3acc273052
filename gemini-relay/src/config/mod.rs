use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Model used when `GEMINI_MODEL` is not set.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

/// Public Gemini REST endpoint.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub common: core_config::Config,
    pub gemini: GeminiSettings,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    /// `None` puts the relay in simulated mode.
    pub api_key: Option<Secret<String>>,
    pub model: String,
    pub base_url: String,
    /// Outbound request timeout. No timeout when unset.
    pub timeout_secs: Option<u64>,
}

impl RelayConfig {
    pub fn load() -> Result<Self, AppError> {
        // Also loads .env, so the GEMINI_* lookups below see it.
        let common = core_config::Config::load()?;
        let gemini = GeminiSettings::from_lookup(|key| env::var(key).ok())?;

        Ok(RelayConfig { common, gemini })
    }

    /// Whether a provider credential was supplied at startup.
    pub fn api_key_present(&self) -> bool {
        self.gemini.api_key.is_some()
    }
}

impl GeminiSettings {
    /// Build settings from a variable lookup, normally `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(Secret::new);

        let model = lookup("GEMINI_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let base_url = lookup("GEMINI_API_BASE")
            .filter(|u| !u.trim().is_empty())
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());

        let timeout_secs = match lookup("GEMINI_TIMEOUT_SECS") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "GEMINI_TIMEOUT_SECS must be a whole number of seconds, got '{}': {}",
                    raw,
                    e
                ))
            })?),
            None => None,
        };

        Ok(GeminiSettings {
            api_key,
            model,
            base_url,
            timeout_secs,
        })
    }

    /// Settings for simulated mode against the default endpoint.
    pub fn without_key() -> Self {
        GeminiSettings {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout_secs: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(Secret::new(key.into()));
        self
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|k| k.expose_secret().as_str())
    }
}
