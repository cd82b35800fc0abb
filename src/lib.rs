// Public modules
pub mod config;
pub mod domains;
pub mod errors;
pub mod globals;
pub mod types;
pub mod validation;

pub use config::ClientConfig;
pub use errors::{DomainError, ServiceError, ServiceResult, ValidationError};
pub use types::{EntityType, Language, UploadFile};

/// Initialize the library with the given client configuration.
/// This function must be called before any of the `globals` accessors.
pub async fn initialize(config: ClientConfig) -> ServiceResult<()> {
    globals::initialize(config).await
}

/// Initialize from `BACKOFFICE_*` environment variables (and `.env`)
pub async fn initialize_from_env() -> ServiceResult<()> {
    let config = ClientConfig::from_env()?;
    globals::initialize(config).await
}

pub async fn shutdown() {
    globals::shutdown().await
}
