//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV_VAR: &str = "DISCOGS_TOKEN";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Discogs account and token
    #[serde(default)]
    pub auth: AuthConfig,

    /// API endpoint and rate limit settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Retry and backoff behavior for page fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// Asset enrichment settings
    #[serde(default)]
    pub enrich: EnrichConfig,

    /// Checkpoint persistence settings
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// CSV export settings
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        if !path.as_ref().exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::validation("api.user_agent is empty"));
        }
        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(AppError::validation("api.base_url is not a valid URL"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::validation("api.timeout_secs must be > 0"));
        }
        if self.api.page_size == 0 || self.api.page_size > 100 {
            return Err(AppError::validation("api.page_size must be in 1..=100"));
        }
        if self.api.rate_quota == 0 {
            return Err(AppError::validation("api.rate_quota must be > 0"));
        }
        if self.api.rate_window_secs == 0 {
            return Err(AppError::validation("api.rate_window_secs must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if self.retry.base_delay_ms == 0 {
            return Err(AppError::validation("retry.base_delay_ms must be > 0"));
        }
        if self.enrich.max_concurrent == 0 {
            return Err(AppError::validation("enrich.max_concurrent must be > 0"));
        }
        if self.enrich.qr_version == 0 || self.enrich.qr_version > 40 {
            return Err(AppError::validation("enrich.qr_version must be in 1..=40"));
        }
        if self.enrich.qr_module_px == 0 {
            return Err(AppError::validation("enrich.qr_module_px must be > 0"));
        }
        if self.checkpoint.save_every_records == 0 {
            return Err(AppError::validation(
                "checkpoint.save_every_records must be > 0",
            ));
        }
        if self.checkpoint.save_every_secs == 0 {
            return Err(AppError::validation(
                "checkpoint.save_every_secs must be > 0",
            ));
        }
        if self.export.delimiter.len() != 1 {
            return Err(AppError::validation(
                "export.delimiter must be a single character",
            ));
        }
        Ok(())
    }
}

/// Discogs account settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Discogs username whose collection is dumped
    #[serde(default)]
    pub username: String,

    /// Personal access token; falls back to the DISCOGS_TOKEN env var
    #[serde(default)]
    pub token: String,
}

impl AuthConfig {
    /// Resolve the credentials, consulting the environment for the token.
    pub fn resolve(&self) -> Result<Credentials> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(AppError::config(
                "No username configured. Set auth.username in the config file.",
            ));
        }

        let token = if self.token.trim().is_empty() {
            std::env::var(TOKEN_ENV_VAR).unwrap_or_default()
        } else {
            self.token.trim().to_string()
        };
        if token.is_empty() {
            return Err(AppError::config(format!(
                "No API token configured. Set auth.token or the {} env var.",
                TOKEN_ENV_VAR
            )));
        }

        Ok(Credentials {
            username: username.to_string(),
            token,
        })
    }
}

/// Resolved account credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

/// API endpoint and throttling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the catalog API
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header, required by the API
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Collection folder to dump, 0 for everything
    #[serde(default)]
    pub folder: u32,

    /// Items requested per page, capped at 100 by the API
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Requests admitted per rate window
    #[serde(default = "defaults::rate_quota")]
    pub rate_quota: usize,

    /// Rate window length in seconds
    #[serde(default = "defaults::rate_window")]
    pub rate_window_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            folder: 0,
            page_size: defaults::page_size(),
            rate_quota: defaults::rate_quota(),
            rate_window_secs: defaults::rate_window(),
        }
    }
}

/// Retry and backoff settings for page fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per page, including the first
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "defaults::max_delay")]
    pub max_delay_ms: u64,

    /// Maximum extra jitter in milliseconds
    #[serde(default = "defaults::jitter")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay(),
            max_delay_ms: defaults::max_delay(),
            jitter_ms: defaults::jitter(),
        }
    }
}

/// Asset enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Maximum concurrent enrichment tasks
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Directory for generated QR images
    #[serde(default = "defaults::qr_dir")]
    pub qr_dir: String,

    /// Directory for downloaded cover art
    #[serde(default = "defaults::cover_dir")]
    pub cover_dir: String,

    /// Download attempts per cover, including the first
    #[serde(default = "defaults::download_attempts")]
    pub download_attempts: u32,

    /// QR code version (symbol size)
    #[serde(default = "defaults::qr_version")]
    pub qr_version: i16,

    /// Pixels per QR module
    #[serde(default = "defaults::qr_module_px")]
    pub qr_module_px: u32,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            qr_dir: defaults::qr_dir(),
            cover_dir: defaults::cover_dir(),
            download_attempts: defaults::download_attempts(),
            qr_version: defaults::qr_version(),
            qr_module_px: defaults::qr_module_px(),
        }
    }
}

/// Checkpoint persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory holding the progress file
    #[serde(default = "defaults::state_dir")]
    pub state_dir: String,

    /// Save after this many records
    #[serde(default = "defaults::save_every_records")]
    pub save_every_records: u64,

    /// Save after this many seconds
    #[serde(default = "defaults::save_every_secs")]
    pub save_every_secs: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            state_dir: defaults::state_dir(),
            save_every_records: defaults::save_every_records(),
            save_every_secs: defaults::save_every_secs(),
        }
    }
}

/// CSV export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output file path
    #[serde(default = "defaults::output_path")]
    pub output_path: String,

    /// Field delimiter, tab by default
    #[serde(default = "defaults::delimiter")]
    pub delimiter: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: defaults::output_path(),
            delimiter: defaults::delimiter(),
        }
    }
}

mod defaults {
    // API defaults
    pub fn base_url() -> String {
        "https://api.discogs.com".into()
    }
    pub fn user_agent() -> String {
        "discodump/0.1 +https://github.com/discodump/discodump".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn page_size() -> u32 {
        100
    }
    pub fn rate_quota() -> usize {
        60
    }
    pub fn rate_window() -> u64 {
        60
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        4
    }
    pub fn base_delay() -> u64 {
        500
    }
    pub fn max_delay() -> u64 {
        16_000
    }
    pub fn jitter() -> u64 {
        250
    }

    // Enrichment defaults
    pub fn max_concurrent() -> usize {
        10
    }
    pub fn qr_dir() -> String {
        "qr".into()
    }
    pub fn cover_dir() -> String {
        "Cover-Art".into()
    }
    pub fn download_attempts() -> u32 {
        2
    }
    pub fn qr_version() -> i16 {
        4
    }
    pub fn qr_module_px() -> u32 {
        5
    }

    // Checkpoint defaults
    pub fn state_dir() -> String {
        ".discodump".into()
    }
    pub fn save_every_records() -> u64 {
        50
    }
    pub fn save_every_secs() -> u64 {
        30
    }

    // Export defaults
    pub fn output_path() -> String {
        "discogs_collection.csv".into()
    }
    pub fn delimiter() -> String {
        "\t".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.api.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_page() {
        let mut config = Config::default();
        config.api.page_size = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.enrich.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_multi_char_delimiter() {
        let mut config = Config::default();
        config.export.delimiter = ";;".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [auth]
            username = "collector"

            [api]
            page_size = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.auth.username, "collector");
        assert_eq!(config.api.page_size, 50);
        assert_eq!(config.api.rate_quota, 60);
        assert_eq!(config.enrich.cover_dir, "Cover-Art");
    }

    #[test]
    fn resolve_requires_username() {
        let auth = AuthConfig::default();
        assert!(matches!(auth.resolve(), Err(AppError::Config(_))));
    }

    #[test]
    fn resolve_uses_configured_token() {
        let auth = AuthConfig {
            username: "collector".to_string(),
            token: "  secret  ".to_string(),
        };
        let creds = auth.resolve().unwrap();
        assert_eq!(creds.username, "collector");
        assert_eq!(creds.token, "secret");
    }
}
