use lazy_static::lazy_static;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::ClientConfig;
use crate::domains::consolidated_report::panel::ConsolidatedReportPanel;
use crate::domains::consolidated_report::service::{ApiConsolidatedReportService, ConsolidatedReportService};
use crate::domains::core::api_client::ApiClient;
use crate::domains::data_export::export_dialog::ExportDialog;
use crate::domains::data_export::history::JobHistory;
use crate::domains::data_export::import_dialog::ImportDialog;
use crate::domains::data_export::service::{ApiDataExportService, DataExportService};
use crate::errors::{ServiceError, ServiceResult};
use crate::types::EntityType;

// Global state definitions
lazy_static! {
    static ref INIT_MUTEX: tokio::sync::Mutex<()> = tokio::sync::Mutex::new(());
    static ref INITIALIZED: AtomicBool = AtomicBool::new(false);

    static ref CONFIG: Mutex<Option<ClientConfig>> = Mutex::new(None);
    static ref API_CLIENT: Mutex<Option<ApiClient>> = Mutex::new(None);

    static ref DATA_EXPORT_SERVICE: Mutex<Option<Arc<dyn DataExportService>>> = Mutex::new(None);
    static ref CONSOLIDATED_REPORT_SERVICE: Mutex<Option<Arc<dyn ConsolidatedReportService>>> = Mutex::new(None);
}

fn get_slot<T: Clone>(slot: &Mutex<Option<T>>, name: &str) -> ServiceResult<T> {
    slot.lock()
        .map_err(|_| ServiceError::Configuration(format!("{} lock poisoned", name)))?
        .clone()
        .ok_or_else(|| ServiceError::NotInitialized(format!("{} not initialized", name)))
}

fn set_slot<T>(slot: &Mutex<Option<T>>, value: Option<T>) {
    let mut guard = slot.lock().unwrap_or_else(|p| p.into_inner());
    *guard = value;
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

pub fn get_config() -> ServiceResult<ClientConfig> {
    get_slot(&CONFIG, "Config")
}

pub fn get_api_client() -> ServiceResult<ApiClient> {
    get_slot(&API_CLIENT, "API client")
}

pub fn get_data_export_service() -> ServiceResult<Arc<dyn DataExportService>> {
    get_slot(&DATA_EXPORT_SERVICE, "Data export service")
}

pub fn get_consolidated_report_service() -> ServiceResult<Arc<dyn ConsolidatedReportService>> {
    get_slot(&CONSOLIDATED_REPORT_SERVICE, "Consolidated report service")
}

/// Export dialog preselected on `entity_type`, in the configured language
pub fn export_dialog(entity_type: EntityType) -> ServiceResult<ExportDialog> {
    let config = get_config()?;
    Ok(ExportDialog::new(get_data_export_service()?, entity_type, config.language))
}

pub fn import_dialog(entity_type: EntityType) -> ServiceResult<ImportDialog> {
    let config = get_config()?;
    Ok(ImportDialog::new(get_data_export_service()?, entity_type)
        .with_poll_interval(config.poll_interval)
        .with_max_upload_bytes(config.max_upload_bytes))
}

pub fn job_history() -> ServiceResult<JobHistory> {
    let config = get_config()?;
    Ok(JobHistory::new(get_data_export_service()?, config.language))
}

pub fn report_panel() -> ServiceResult<ConsolidatedReportPanel> {
    let config = get_config()?;
    Ok(ConsolidatedReportPanel::new(get_consolidated_report_service()?, config.language))
}

/// Builds the shared HTTP client and services. Calling it again after a
/// successful run is a no-op; call `shutdown` first to reconfigure.
pub async fn initialize(config: ClientConfig) -> ServiceResult<()> {
    let _guard = INIT_MUTEX.lock().await;

    if INITIALIZED.load(Ordering::Acquire) {
        log::debug!("Already initialized, skipping");
        return Ok(());
    }

    let result = initialize_internal(config);
    if result.is_ok() {
        INITIALIZED.store(true, Ordering::Release);
    }
    result
}

fn initialize_internal(config: ClientConfig) -> ServiceResult<()> {
    if std::env::var("RUST_LOG").is_err() {
        #[cfg(debug_assertions)]
        std::env::set_var("RUST_LOG", "debug");
        #[cfg(not(debug_assertions))]
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = env_logger::try_init();

    log::info!("Initializing back-office client core");
    log::debug!("API base URL: {}", config.api_base_url);
    log::debug!("Language: {}", config.language.as_str());

    let client = ApiClient::new(&config)?;

    let data_export: Arc<dyn DataExportService> = Arc::new(ApiDataExportService::new(client.clone()));
    let reports: Arc<dyn ConsolidatedReportService> = Arc::new(ApiConsolidatedReportService::new(client.clone()));

    set_slot(&API_CLIENT, Some(client));
    set_slot(&DATA_EXPORT_SERVICE, Some(data_export));
    set_slot(&CONSOLIDATED_REPORT_SERVICE, Some(reports));
    set_slot(&CONFIG, Some(config));

    log::info!("Initialization complete");
    Ok(())
}

/// Clears every registered service
pub async fn shutdown() {
    let _guard = INIT_MUTEX.lock().await;
    set_slot(&CONSOLIDATED_REPORT_SERVICE, None);
    set_slot(&DATA_EXPORT_SERVICE, None);
    set_slot(&API_CLIENT, None);
    set_slot(&CONFIG, None);
    INITIALIZED.store(false, Ordering::Release);
    log::info!("Shut down");
}

#[cfg(test)]
mod tests {
    use super::*;

    // The registry is process-wide, so every lifecycle check lives in one test.
    #[tokio::test]
    async fn test_lifecycle() {
        shutdown().await;
        assert!(!is_initialized());
        assert_eq!(get_data_export_service().err().map(|e| e.code().to_string()).as_deref(), Some("NOT_INITIALIZED"));
        assert!(report_panel().is_err());

        let bad = initialize(ClientConfig::new("not a url")).await;
        assert!(bad.is_err());
        assert!(!is_initialized());

        initialize(ClientConfig::new("https://api.example.com/api/v1").with_token("t")).await.unwrap();
        assert!(is_initialized());
        assert!(import_dialog(EntityType::Clients).is_ok());
        assert!(export_dialog(EntityType::Invoices).is_ok());
        assert!(job_history().is_ok());
        assert!(report_panel().is_ok());

        // second call keeps the first configuration
        initialize(ClientConfig::new("https://other.example.com")).await.unwrap();
        assert_eq!(get_config().unwrap().api_base_url, "https://api.example.com/api/v1");

        shutdown().await;
        assert!(get_api_client().is_err());
    }
}
