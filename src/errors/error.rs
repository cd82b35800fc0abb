use std::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field-level validation failure reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Backend error normalised from whatever body shape the server sent.
///
/// Hosts must render `message` / `message_ar` (or `ServiceError::user_message`),
/// never the raw response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// HTTP status, `0` when no response was received
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
    pub message_ar: Option<String>,
    pub request_id: Option<String>,
    pub field_errors: Vec<FieldError>,
    /// Seconds to wait before retrying (rate limiting)
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: u16, message: &str) -> Self {
        Self {
            status,
            code: None,
            message: message.to_string(),
            message_ar: None,
            request_id: None,
            field_errors: Vec::new(),
            retry_after: None,
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} [{}]: {}", self.status, code, self.message),
            None => write!(f, "{}: {}", self.status, self.message),
        }
    }
}

/// Validation errors raised before any request leaves the client
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required {
        field: String,
    },

    #[error("Field '{field}' must be between {min} and {max}")]
    Range {
        field: String,
        min: String,
        max: String,
    },

    #[error("Field '{field}' contains invalid format: {reason}")]
    Format {
        field: String,
        reason: String,
    },

    #[error("Field '{field}' contains an invalid value: {reason}")]
    InvalidValue {
        field: String,
        reason: String,
    },

    #[error("File '{file_name}' is not a supported type (xlsx, csv, json)")]
    UnsupportedFileType {
        file_name: String,
    },

    #[error("File '{file_name}' is {size} bytes, larger than the {max} byte limit")]
    FileTooLarge {
        file_name: String,
        size: u64,
        max: u64,
    },

    #[error("Validation error: {0}")]
    Custom(String),
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }

    pub fn range<T: fmt::Display>(field: &str, min: T, max: T) -> Self {
        Self::Range {
            field: field.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    pub fn format(field: &str, reason: &str) -> Self {
        Self::Format {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn unsupported_file(file_name: &str) -> Self {
        Self::UnsupportedFileType {
            file_name: file_name.to_string(),
        }
    }

    pub fn custom(message: &str) -> Self {
        Self::Custom(message.to_string())
    }
}

/// Domain-level errors
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    #[error("Invariant violated: {0}")]
    InvariantViolated(String),

    #[error("File error: {0}")]
    File(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Service-level errors, the only error type hosts see
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum ServiceError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("API error {0}")]
    Api(ApiError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited {
        retry_after: u64,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Request already in progress: {0}")]
    AlreadyPending(String),

    #[error("Result discarded, the dialog was closed")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Service not initialized: {0}")]
    NotInitialized(String),
}

impl From<ValidationError> for ServiceError {
    fn from(error: ValidationError) -> Self {
        ServiceError::Domain(DomainError::Validation(error))
    }
}

impl ServiceError {
    /// Stable machine-readable code, used for message lookup
    pub fn code(&self) -> &str {
        match self {
            ServiceError::Domain(DomainError::Validation(ValidationError::UnsupportedFileType { .. })) => "UNSUPPORTED_FILE_TYPE",
            ServiceError::Domain(DomainError::Validation(ValidationError::FileTooLarge { .. })) => "FILE_TOO_LARGE",
            ServiceError::Domain(DomainError::Validation(_)) => "VALIDATION_ERROR",
            ServiceError::Domain(_) => "INTERNAL_ERROR",
            ServiceError::Api(api) => match (&api.code, api.status) {
                (Some(code), _) => code.as_str(),
                (None, 400) | (None, 422) => "VALIDATION_ERROR",
                (None, 401) => "UNAUTHORIZED",
                (None, 403) => "FORBIDDEN",
                (None, 404) => "NOT_FOUND",
                (None, 413) => "FILE_TOO_LARGE",
                (None, status) if status >= 500 => "SERVER_ERROR",
                _ => "UNKNOWN_ERROR",
            },
            ServiceError::Network(_) => "NETWORK_ERROR",
            ServiceError::Timeout(_) => "TIMEOUT",
            ServiceError::RateLimited { .. } => "RATE_LIMITED",
            ServiceError::Decode(_) => "INVALID_RESPONSE",
            ServiceError::AlreadyPending(_) => "ALREADY_PENDING",
            ServiceError::Cancelled => "CANCELLED",
            ServiceError::Configuration(_) => "CONFIGURATION_ERROR",
            ServiceError::NotInitialized(_) => "NOT_INITIALIZED",
        }
    }

    /// Transport failures worth retrying for idempotent requests
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Network(_) | ServiceError::Timeout(_) => true,
            ServiceError::Api(api) => api.is_server_error(),
            _ => false,
        }
    }
}
