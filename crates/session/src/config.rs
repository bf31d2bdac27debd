//! Session client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//! - `PHARMADESK_API_BASE_URL` - REST API root (default: `http://localhost:8080/api`)
//! - `PHARMADESK_STORAGE_PATH` - Durable token store file (default: `.pharmadesk/storage.json`)
//! - `PHARMADESK_HTTP_TIMEOUT_SECONDS` - Per-request timeout (default: 15)
//! - `PHARMADESK_VERIFY_ON_STARTUP` - Check a rehydrated token against `/auth/profile` (default: false)
//! - `PHARMADESK_GOOGLE_CLIENT_ID` - OAuth client ID used to obtain Google ID tokens

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_STORAGE_PATH: &str = ".pharmadesk/storage.json";
const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 15;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Session client configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// REST API root; always ends with `/` so endpoint paths join beneath it
    pub api_base_url: Url,
    /// File backing the durable token store
    pub storage_path: PathBuf,
    /// Timeout applied to every backend request
    pub http_timeout: Duration,
    /// Whether startup rehydration is followed by a profile check
    pub verify_on_startup: bool,
    /// Google OAuth client ID for social login
    pub google_client_id: Option<String>,
}

impl SessionConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a value is present but cannot be parsed.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_base_url = get("PHARMADESK_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = normalize_base_url(&api_base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("PHARMADESK_API_BASE_URL".to_string(), e)
        })?;

        let storage_path = get("PHARMADESK_STORAGE_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from);

        let http_timeout = match get("PHARMADESK_HTTP_TIMEOUT_SECONDS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "PHARMADESK_HTTP_TIMEOUT_SECONDS".to_string(),
                        e.to_string(),
                    )
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidEnvVar(
                        "PHARMADESK_HTTP_TIMEOUT_SECONDS".to_string(),
                        "must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS),
        };

        let verify_on_startup = match get("PHARMADESK_VERIFY_ON_STARTUP") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "PHARMADESK_VERIFY_ON_STARTUP".to_string(),
                    format!("expected true/false, got {raw:?}"),
                )
            })?,
            None => false,
        };

        Ok(Self {
            api_base_url,
            storage_path,
            http_timeout,
            verify_on_startup,
            google_client_id: get("PHARMADESK_GOOGLE_CLIENT_ID"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a base URL, requiring http(s) and a trailing slash on the path.
fn normalize_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {:?}", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
