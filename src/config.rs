use std::time::Duration;

use crate::errors::{ServiceError, ServiceResult};
use crate::types::Language;
use crate::validation::ValidationBuilder;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
/// 10 MiB, the drop-zone limit
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Connection and behaviour settings for the client core
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL including the API prefix, e.g. `https://api.example.com/api/v1`
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub language: Language,
    pub request_timeout: Duration,
    /// Timeout for multipart uploads and file downloads
    pub upload_timeout: Duration,
    pub connect_timeout: Duration,
    /// Extra attempts for idempotent requests failing with network/5xx errors
    pub retry_attempts: u32,
    pub poll_interval: Duration,
    pub max_upload_bytes: u64,
}

impl ClientConfig {
    pub fn new(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_token: None,
            language: Language::En,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.api_token = Some(token.to_string());
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Loads settings from the environment, reading a `.env` file first if
    /// one exists.
    ///
    /// `BACKOFFICE_API_URL` is required; `BACKOFFICE_API_TOKEN`,
    /// `BACKOFFICE_LANGUAGE`, `BACKOFFICE_POLL_INTERVAL_MS` and
    /// `BACKOFFICE_RETRY_ATTEMPTS` are optional.
    pub fn from_env() -> ServiceResult<Self> {
        let _ = dotenv::dotenv();

        let base_url = std::env::var("BACKOFFICE_API_URL")
            .map_err(|_| ServiceError::Configuration("BACKOFFICE_API_URL is not set".to_string()))?;
        let mut config = Self::new(&base_url);

        if let Ok(token) = std::env::var("BACKOFFICE_API_TOKEN") {
            if !token.is_empty() {
                config.api_token = Some(token);
            }
        }
        if let Ok(lang) = std::env::var("BACKOFFICE_LANGUAGE") {
            config.language = Language::from_str(&lang)
                .ok_or_else(|| ServiceError::Configuration(format!("Unknown language: {}", lang)))?;
        }
        if let Ok(ms) = std::env::var("BACKOFFICE_POLL_INTERVAL_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| ServiceError::Configuration(format!("Invalid poll interval: {}", ms)))?;
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Ok(attempts) = std::env::var("BACKOFFICE_RETRY_ATTEMPTS") {
            config.retry_attempts = attempts
                .parse()
                .map_err(|_| ServiceError::Configuration(format!("Invalid retry attempts: {}", attempts)))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ServiceResult<()> {
        ValidationBuilder::new("api_base_url", Some(self.api_base_url.clone()))
            .required()
            .http_url()
            .validate()?;
        ValidationBuilder::new("retry_attempts", Some(self.retry_attempts))
            .range(0, 10)
            .validate()?;
        ValidationBuilder::new("poll_interval_ms", Some(self.poll_interval.as_millis() as u64))
            .range(10, 60_000)
            .validate()?;
        ValidationBuilder::new("max_upload_bytes", Some(self.max_upload_bytes))
            .range(1, 512 * 1024 * 1024)
            .validate()?;
        Ok(())
    }
}
