pub mod api_client;
pub mod format;

pub use api_client::ApiClient;
