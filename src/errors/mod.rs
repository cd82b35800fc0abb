mod error;
mod messages;

pub use error::{ApiError, DomainError, FieldError, ServiceError, ValidationError};
pub use messages::LocalizedMessage;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
