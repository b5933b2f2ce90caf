use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub soniox_api_key: String,
    pub soniox_ws_url: String,
    pub soniox_model: String,
    pub language_hints: Vec<String>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let soniox_api_key = std::env::var("SONIOX_API_KEY")
            .map_err(|_| ConfigError::MissingVar("SONIOX_API_KEY".to_string()))?;

        let soniox_ws_url = std::env::var("SONIOX_WS_URL")
            .unwrap_or_else(|_| "wss://stt-rt.soniox.com/transcribe-websocket".to_string());

        let soniox_model =
            std::env::var("SONIOX_MODEL").unwrap_or_else(|_| "stt-rt-preview".to_string());

        let hints_str = std::env::var("LANGUAGE_HINTS").unwrap_or_else(|_| "en,ro".to_string());
        let language_hints: Vec<String> = hints_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if language_hints.is_empty() {
            return Err(ConfigError::InvalidValue(
                "LANGUAGE_HINTS".to_string(),
                format!("'{}' contains no language codes", hints_str),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            soniox_api_key,
            soniox_ws_url,
            soniox_model,
            language_hints,
            log_level,
        })
    }
}
