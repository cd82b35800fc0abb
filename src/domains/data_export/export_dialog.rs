use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domains::data_export::service::DataExportService;
use crate::domains::data_export::types::{ColumnSelection, ExportFormat, ExportJob, StartExportRequest};
use crate::errors::{ServiceError, ServiceResult, ValidationError};
use crate::types::{EntityType, Language};

#[derive(Debug, Clone, PartialEq)]
pub struct ExportState {
    pub open: bool,
    pub entity_type: EntityType,
    pub format: ExportFormat,
    pub columns: ColumnSelection,
    pub include_related: bool,
    pub language: Language,
    pub pending: bool,
}

impl ExportState {
    fn new(entity_type: EntityType, language: Language) -> Self {
        Self {
            open: false,
            entity_type,
            format: ExportFormat::default(),
            columns: ColumnSelection::All,
            include_related: false,
            language,
            pending: false,
        }
    }

    pub fn to_request(&self) -> StartExportRequest {
        StartExportRequest {
            entity_type: self.entity_type,
            format: self.format,
            columns: self.columns.to_request(),
            include_related: self.include_related,
            language: self.language,
        }
    }
}

/// A checkbox in the column picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnOption {
    pub field: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

struct Inner {
    state: ExportState,
    session: u64,
}

/// Export dialog: collects parameters and submits one export at a time
#[derive(Clone)]
pub struct ExportDialog {
    service: Arc<dyn DataExportService>,
    default_entity: EntityType,
    inner: Arc<Mutex<Inner>>,
}

impl ExportDialog {
    pub fn new(service: Arc<dyn DataExportService>, default_entity: EntityType, language: Language) -> Self {
        Self {
            service,
            default_entity,
            inner: Arc::new(Mutex::new(Inner {
                state: ExportState::new(default_entity, language),
                session: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> ExportState {
        self.lock().state.clone()
    }

    /// Opens with fresh defaults, keeping the active language
    pub fn open(&self) {
        let mut inner = self.lock();
        let language = inner.state.language;
        inner.state = ExportState::new(self.default_entity, language);
        inner.state.open = true;
    }

    /// Closes and forgets any submission still in flight
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.session += 1;
        inner.state.open = false;
        inner.state.pending = false;
    }

    pub fn select_entity_type(&self, entity_type: EntityType) {
        let mut inner = self.lock();
        inner.state.entity_type = entity_type;
        inner.state.columns = ColumnSelection::All;
    }

    pub fn set_format(&self, format: ExportFormat) {
        self.lock().state.format = format;
    }

    pub fn set_include_related(&self, include: bool) {
        self.lock().state.include_related = include;
    }

    pub fn set_language(&self, language: Language) {
        self.lock().state.language = language;
    }

    pub fn toggle_column(&self, field: &str) {
        let mut inner = self.lock();
        let entity_type = inner.state.entity_type;
        inner.state.columns.toggle(entity_type, field);
    }

    pub fn select_all(&self) {
        let mut inner = self.lock();
        let entity_type = inner.state.entity_type;
        inner.state.columns.select_all(entity_type);
    }

    pub fn is_all_selected(&self) -> bool {
        let inner = self.lock();
        inner.state.columns.is_all_selected(inner.state.entity_type)
    }

    /// Column picker rows, labelled in the dialog's language
    pub fn column_options(&self) -> Vec<ColumnOption> {
        let inner = self.lock();
        let state = &inner.state;
        state
            .entity_type
            .columns()
            .iter()
            .map(|c| ColumnOption {
                field: c.field,
                label: c.label(state.language),
                selected: state.columns.is_selected(c.field),
            })
            .collect()
    }

    /// Sends the export. A second call while one is in flight is rejected.
    /// Success closes the dialog; failure leaves it open for another try.
    pub async fn submit_export(&self) -> ServiceResult<ExportJob> {
        let (session, request) = {
            let mut inner = self.lock();
            if !inner.state.open {
                return Err(ValidationError::custom("export dialog is not open").into());
            }
            if inner.state.pending {
                return Err(ServiceError::AlreadyPending("export".to_string()));
            }
            inner.state.pending = true;
            (inner.session, inner.state.to_request())
        };

        let result = self.service.start_export(&request).await;

        let mut inner = self.lock();
        if inner.session != session {
            debug!("Discarding export response that arrived after close");
            return Err(ServiceError::Cancelled);
        }
        inner.state.pending = false;
        let job = result?;
        info!("Export {} queued ({} as {})", job.id, request.entity_type, request.format.as_str());
        inner.state.open = false;
        Ok(job)
    }

    /// Blank template for the selected entity type and format
    pub async fn download_template(&self) -> ServiceResult<Vec<u8>> {
        let (entity_type, format) = {
            let inner = self.lock();
            (inner.state.entity_type, inner.state.format)
        };
        self.service.download_template(entity_type, format).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::data_export::service::MockDataExportService;
    use crate::domains::data_export::types::JobStatus;
    use std::time::Duration;

    fn export_job() -> ExportJob {
        serde_json::from_value(serde_json::json!({
            "_id": "exp-7",
            "entityType": "clients",
            "format": "csv",
            "status": "pending"
        }))
        .unwrap()
    }

    fn open_dialog(mock: &Arc<MockDataExportService>) -> ExportDialog {
        let dialog = ExportDialog::new(mock.clone(), EntityType::Cases, Language::Ar);
        dialog.open();
        dialog
    }

    #[test]
    fn test_defaults() {
        let mock = Arc::new(MockDataExportService::new());
        let state = open_dialog(&mock).snapshot();
        assert!(state.open);
        assert_eq!(state.entity_type, EntityType::Cases);
        assert_eq!(state.format, ExportFormat::Xlsx);
        assert_eq!(state.columns, ColumnSelection::All);
        assert!(!state.include_related);
        assert_eq!(state.language, Language::Ar);
    }

    #[test]
    fn test_entity_change_resets_columns() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = open_dialog(&mock);
        dialog.toggle_column("court");
        assert!(!dialog.is_all_selected());

        dialog.select_entity_type(EntityType::Invoices);
        assert_eq!(dialog.snapshot().columns, ColumnSelection::All);
        assert!(dialog.column_options().iter().all(|c| c.selected));
        // a field of the old entity type does nothing
        dialog.toggle_column("court");
        assert_eq!(dialog.snapshot().columns, ColumnSelection::All);
    }

    #[test]
    fn test_toggle_off_then_on_is_explicit_full_list() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = open_dialog(&mock);
        dialog.toggle_column("judge");
        dialog.toggle_column("judge");
        let state = dialog.snapshot();
        assert_ne!(state.columns, ColumnSelection::All);
        assert!(dialog.is_all_selected());
        assert_eq!(state.to_request().columns.map(|c| c.len()), Some(EntityType::Cases.columns().len()));
    }

    #[test]
    fn test_column_labels_follow_language() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = open_dialog(&mock);
        assert_eq!(dialog.column_options()[0].label, "رقم القضية");
        dialog.set_language(Language::En);
        assert_eq!(dialog.column_options()[0].label, "Case Number");
    }

    #[tokio::test]
    async fn test_submit_without_columns_omits_them() {
        let mock = Arc::new(MockDataExportService::new());
        *mock.export_result.lock().unwrap() = Ok(export_job());
        let dialog = open_dialog(&mock);
        dialog.select_entity_type(EntityType::Clients);
        dialog.set_format(ExportFormat::Csv);

        let job = dialog.submit_export().await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let sent = mock.export_requests.lock().unwrap()[0].clone();
        assert_eq!(sent.entity_type, EntityType::Clients);
        assert_eq!(sent.format, ExportFormat::Csv);
        assert_eq!(sent.columns, None);
        assert!(!dialog.snapshot().open);
    }

    #[tokio::test]
    async fn test_failed_submit_stays_open() {
        let mock = Arc::new(MockDataExportService::new());
        *mock.export_result.lock().unwrap() = Err(ServiceError::Network("offline".into()));
        let dialog = open_dialog(&mock);

        assert!(dialog.submit_export().await.is_err());
        let state = dialog.snapshot();
        assert!(state.open);
        assert!(!state.pending);

        *mock.export_result.lock().unwrap() = Ok(export_job());
        assert!(dialog.submit_export().await.is_ok());
        assert_eq!(mock.export_requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_double_submit_rejected() {
        let mock = Arc::new(MockDataExportService::new());
        *mock.export_result.lock().unwrap() = Ok(export_job());
        mock.set_latency(Duration::from_millis(50));
        let dialog = open_dialog(&mock);

        let first = tokio::spawn({
            let dialog = dialog.clone();
            async move { dialog.submit_export().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(dialog.submit_export().await, Err(ServiceError::AlreadyPending(_))));
        assert!(first.await.unwrap().is_ok());
        assert_eq!(mock.export_requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_response_after_close_is_ignored() {
        let mock = Arc::new(MockDataExportService::new());
        *mock.export_result.lock().unwrap() = Ok(export_job());
        mock.set_latency(Duration::from_millis(40));
        let dialog = open_dialog(&mock);

        let pending = tokio::spawn({
            let dialog = dialog.clone();
            async move { dialog.submit_export().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        dialog.close();
        dialog.open();
        assert!(matches!(pending.await.unwrap(), Err(ServiceError::Cancelled)));
        // the reopened dialog was not closed by the stale success
        assert!(dialog.snapshot().open);
    }

    #[tokio::test]
    async fn test_template_uses_current_selection() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = open_dialog(&mock);
        dialog.select_entity_type(EntityType::Staff);
        dialog.set_format(ExportFormat::Csv);
        let bytes = dialog.download_template().await.unwrap();
        assert_eq!(bytes, b"template:staff:csv".to_vec());
    }
}
