use crate::config::ClientConfig;
use crate::errors::{ApiError, FieldError, ServiceError, ServiceResult};
use crate::types::Language;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::header::{HeaderMap, ACCEPT_LANGUAGE, AUTHORIZATION, RETRY_AFTER};
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wait when a 429 carries no usable Retry-After
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const MAX_BACKOFF_MS: f64 = 8000.0;

/// HTTP transport shared by the domain services.
///
/// Adds bearer auth and `Accept-Language`, applies tiered timeouts, retries
/// idempotent requests on network/5xx failures with jittered exponential
/// backoff, unwraps `{success, data}` envelopes and normalises error bodies
/// into [`ApiError`].
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    language: Language,
    request_timeout: Duration,
    upload_timeout: Duration,
    retry_attempts: u32,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("language", &self.language)
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

/// Whether a failed request may be sent again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Idempotency {
    Retry,
    Once,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> ServiceResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ServiceError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            language: config.language,
            request_timeout: config.request_timeout,
            upload_timeout: config.upload_timeout,
            retry_attempts: config.retry_attempts,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn language(&self) -> Language {
        self.language
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn decorate(&self, builder: RequestBuilder, timeout: Duration) -> RequestBuilder {
        let builder = builder
            .timeout(timeout)
            .header(ACCEPT_LANGUAGE, self.language.as_str());
        match &self.api_token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// GET returning JSON
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ServiceResult<T> {
        let url = self.url(path);
        let response = self
            .send(&format!("GET {}", path), Idempotency::Retry, || {
                self.decorate(self.client.get(&url).query(query), self.request_timeout)
            })
            .await?;
        read_json(response).await
    }

    /// POST with a JSON body returning JSON. Not retried: the backend creates
    /// a job per call.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> ServiceResult<T> {
        let url = self.url(path);
        let response = self
            .send(&format!("POST {}", path), Idempotency::Once, || {
                self.decorate(self.client.post(&url).json(body), self.request_timeout)
            })
            .await?;
        read_json(response).await
    }

    /// Multipart POST returning JSON, with the upload timeout. Sent once.
    pub async fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> ServiceResult<T> {
        let url = self.url(path);
        let response = self
            .send_once(
                &format!("POST {}", path),
                self.decorate(self.client.post(&url).multipart(form), self.upload_timeout),
            )
            .await?;
        read_json(response).await
    }

    /// GET returning the raw body, used for file downloads
    pub async fn get_bytes(&self, path: &str, query: &[(&str, String)]) -> ServiceResult<Vec<u8>> {
        let url = self.url(path);
        let response = self
            .send(&format!("GET {}", path), Idempotency::Retry, || {
                self.decorate(self.client.get(&url).query(query), self.upload_timeout)
            })
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Network(format!("Failed to read response body: {}", e)))?;
        Ok(bytes.to_vec())
    }

    async fn send<F>(&self, label: &str, idempotency: Idempotency, build: F) -> ServiceResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = match idempotency {
            Idempotency::Retry => self.retry_attempts + 1,
            Idempotency::Once => 1,
        };
        let mut attempt = 1;
        loop {
            match self.send_once(label, build()).await {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = backoff_delay(attempt);
                    warn!("{} failed (attempt {}/{}): {}; retrying in {:?}", label, attempt, max_attempts, err, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send_once(&self, label: &str, request: RequestBuilder) -> ServiceResult<Response> {
        debug!("{}", label);
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout(format!("{}: {}", label, e))
            } else {
                ServiceError::Network(format!("{}: {}", label, e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to get error details".to_string());
        let err = normalize_error(status, &headers, &body);
        debug!("{} returned {}: {}", label, status, err);
        Err(err)
    }
}

/// Delay before retry `attempt` (1-based): 1s·2^(n-1) plus up to 30% jitter,
/// capped at 8s.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let base = 1000.0 * 2f64.powi(attempt.saturating_sub(1) as i32);
    let jitter = base * 0.3 * rand::random::<f64>();
    Duration::from_millis((base + jitter).min(MAX_BACKOFF_MS) as u64)
}

/// `Retry-After` as delta-seconds or an HTTP date
pub(crate) fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = (date.with_timezone(&Utc) - now).num_seconds();
    Some(delta.max(1) as u64)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
    message_ar: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorMeta {
    request_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: Option<ErrorDetail>,
    message: Option<String>,
    message_ar: Option<String>,
    code: Option<String>,
    request_id: Option<String>,
    meta: Option<ErrorMeta>,
    #[serde(default)]
    errors: Vec<FieldError>,
}

/// Maps a non-2xx response onto the client error taxonomy
pub(crate) fn normalize_error(status: StatusCode, headers: &HeaderMap, body: &str) -> ServiceError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()))
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return ServiceError::RateLimited { retry_after };
    }

    // `error` may also be a bare `true` flag; fall back to the root fields then
    let parsed: ErrorBody = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .map(|mut value| {
            if value.get("error").map_or(false, |e| !e.is_object()) {
                if let Some(obj) = value.as_object_mut() {
                    obj.remove("error");
                }
            }
            serde_json::from_value(value).unwrap_or_default()
        })
        .unwrap_or_default();

    let detail = parsed.error.unwrap_or_default();
    let message = detail
        .message
        .or(parsed.message)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_default();

    ServiceError::Api(ApiError {
        status: status.as_u16(),
        code: detail.code.or(parsed.code),
        message,
        message_ar: detail.message_ar.or(parsed.message_ar),
        request_id: parsed.meta.and_then(|m| m.request_id).or(parsed.request_id),
        field_errors: parsed.errors,
        retry_after: None,
    })
}

/// Unwraps `{ "success": .., "data": .. }` envelopes; bare bodies pass through.
pub(crate) fn unwrap_envelope(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(mut map) if map.contains_key("data") && map.contains_key("success") => {
            map.remove("data").unwrap_or(serde_json::Value::Null)
        }
        other => other,
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ServiceResult<T> {
    let value: serde_json::Value = response
        .json()
        .await
        .map_err(|e| ServiceError::Decode(format!("Response is not JSON: {}", e)))?;
    serde_json::from_value(unwrap_envelope(value))
        .map_err(|e| ServiceError::Decode(format!("Unexpected response shape: {}", e)))
}
