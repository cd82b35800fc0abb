use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;

use crate::config::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_POLL_INTERVAL};
use crate::domains::data_export::poller::{PollControl, PollSnapshot, StatusPoller};
use crate::domains::data_export::service::DataExportService;
use crate::domains::data_export::types::{
    derive_step, ImportJob, ImportPreview, ImportStep, ImportSummary, StartImportRequest,
};
use crate::errors::{DomainError, ServiceError, ServiceResult, ValidationError};
use crate::types::{ColumnDef, EntityType, UploadFile};
use crate::validation::{accept_import_file, Validate};

/// Everything the import wizard shows
#[derive(Debug, Clone, PartialEq)]
pub struct ImportState {
    pub step: ImportStep,
    pub entity_type: EntityType,
    pub file: Option<UploadFile>,
    pub preview: Option<ImportPreview>,
    /// Source column -> destination field, empty destination = skip
    pub mapping: HashMap<String, String>,
    pub skip_duplicates: bool,
    pub update_existing: bool,
    pub job_id: Option<String>,
    pub job: Option<ImportJob>,
    pub pending: bool,
}

impl ImportState {
    fn new(entity_type: EntityType) -> Self {
        Self {
            step: ImportStep::Upload,
            entity_type,
            file: None,
            preview: None,
            mapping: HashMap::new(),
            skip_duplicates: true,
            update_existing: false,
            job_id: None,
            job: None,
            pending: false,
        }
    }

    /// Applies one polled job. Returns `Stop` once nothing more can change.
    fn apply_job(&mut self, mut job: ImportJob) -> PollControl {
        if let Some(current) = &self.job {
            if !current.status.can_transition_to(job.status) {
                warn!("Ignoring import {} going from {} back to {}", job.id, current.status, job.status);
                return PollControl::Continue;
            }
            if job.progress < current.progress {
                job.progress = current.progress;
            }
        }
        if let Err(e) = job.check_invariants() {
            warn!("Import status breaks an invariant: {}", e);
        }
        self.step = derive_step(job.status);
        let control = if job.status.is_terminal() { PollControl::Stop } else { PollControl::Continue };
        if job.status.is_terminal() {
            info!("Import {} finished as {}", job.id, job.status);
        }
        self.job = Some(job);
        control
    }
}

/// One row of the column-mapping editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRow {
    pub source: String,
    pub destination: Option<String>,
    pub skipped: bool,
}

struct Inner {
    state: ImportState,
    /// Bumped on close; responses from an older session are dropped
    session: u64,
    poller: Option<StatusPoller>,
}

/// Import wizard: upload → preview → importing → complete.
///
/// Cheap to clone; clones share the same dialog.
#[derive(Clone)]
pub struct ImportDialog {
    service: Arc<dyn DataExportService>,
    inner: Arc<Mutex<Inner>>,
    poll_interval: Duration,
    max_upload_bytes: u64,
}

impl ImportDialog {
    pub fn new(service: Arc<dyn DataExportService>, entity_type: EntityType) -> Self {
        Self {
            service,
            inner: Arc::new(Mutex::new(Inner {
                state: ImportState::new(entity_type),
                session: 0,
                poller: None,
            })),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_upload_bytes(mut self, max: u64) -> Self {
        self.max_upload_bytes = max;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn expect_step(state: &ImportState, expected: ImportStep, to: ImportStep) -> ServiceResult<()> {
        if state.step != expected {
            return Err(DomainError::InvalidTransition {
                from: state.step.as_str().to_string(),
                to: to.as_str().to_string(),
            }
            .into());
        }
        if state.pending {
            return Err(ServiceError::AlreadyPending(format!("import dialog ({})", state.step.as_str())));
        }
        Ok(())
    }

    pub fn snapshot(&self) -> ImportState {
        self.lock().state.clone()
    }

    pub fn step(&self) -> ImportStep {
        self.lock().state.step
    }

    /// Handles a drop/select of files. Only the first file is used; an empty
    /// drop does nothing. Returns the preview once the dialog moved to
    /// `Preview`.
    pub async fn drop_files(&self, files: Vec<UploadFile>) -> ServiceResult<Option<ImportPreview>> {
        let Some(file) = files.into_iter().next() else {
            debug!("Ignoring empty file drop");
            return Ok(None);
        };

        let (session, entity_type) = {
            let mut inner = self.lock();
            Self::expect_step(&inner.state, ImportStep::Upload, ImportStep::Preview)?;
            accept_import_file(&file, self.max_upload_bytes)?;
            inner.state.pending = true;
            (inner.session, inner.state.entity_type)
        };

        let result = self.service.preview_import(&file, entity_type).await;

        let mut inner = self.lock();
        if inner.session != session {
            debug!("Discarding preview of {} that arrived after close", file.file_name);
            return Err(ServiceError::Cancelled);
        }
        inner.state.pending = false;
        let preview = result?;
        info!(
            "Previewed {}: {} columns, {} rows",
            file.file_name,
            preview.columns.len(),
            preview.total_rows
        );
        inner.state.mapping = preview.initial_mapping();
        inner.state.preview = Some(preview.clone());
        inner.state.file = Some(file);
        inner.state.step = ImportStep::Preview;
        Ok(Some(preview))
    }

    /// Back to the drop zone, discarding the current file
    pub fn change_file(&self) -> ServiceResult<()> {
        let mut inner = self.lock();
        Self::expect_step(&inner.state, ImportStep::Preview, ImportStep::Upload)?;
        inner.state.file = None;
        inner.state.preview = None;
        inner.state.mapping.clear();
        inner.state.step = ImportStep::Upload;
        Ok(())
    }

    /// Maps a source column to a destination field; an empty destination
    /// skips the column. Fields of the entity and any field the server
    /// suggested are accepted.
    pub fn set_mapping(&self, source: &str, destination: &str) -> ServiceResult<()> {
        let mut inner = self.lock();
        let state = &mut inner.state;
        if state.step != ImportStep::Preview {
            return Err(DomainError::InvalidTransition {
                from: state.step.as_str().to_string(),
                to: ImportStep::Preview.as_str().to_string(),
            }
            .into());
        }
        let known = state.preview.as_ref().map_or(false, |p| p.columns.iter().any(|c| c == source));
        if !known {
            return Err(ValidationError::invalid_value("mapping", &format!("'{}' is not a column of the file", source)).into());
        }
        let suggested = state
            .preview
            .as_ref()
            .map_or(false, |p| p.suggested_mapping.values().any(|d| d == destination));
        if !destination.is_empty() && !suggested && !state.entity_type.has_column(destination) {
            return Err(ValidationError::invalid_value(
                "mapping",
                &format!("'{}' is not a field of {}", destination, state.entity_type),
            )
            .into());
        }
        state.mapping.insert(source.to_string(), destination.to_string());
        Ok(())
    }

    pub fn set_skip_duplicates(&self, skip: bool) {
        self.lock().state.skip_duplicates = skip;
    }

    pub fn set_update_existing(&self, update: bool) {
        self.lock().state.update_existing = update;
    }

    /// Submits the import and starts polling its status
    pub async fn start_import(&self) -> ServiceResult<ImportJob> {
        let (session, request) = {
            let mut inner = self.lock();
            Self::expect_step(&inner.state, ImportStep::Preview, ImportStep::Importing)?;
            let state = &inner.state;
            let file = state.file.clone().ok_or_else(|| ValidationError::required("file"))?;
            let request = StartImportRequest {
                entity_type: state.entity_type,
                file,
                mapping: state.mapping.clone(),
                skip_duplicates: state.skip_duplicates,
                update_existing: state.update_existing,
            };
            request.validate()?;
            inner.state.pending = true;
            (inner.session, request)
        };

        let result = self.service.start_import(&request).await;

        let mut inner = self.lock();
        if inner.session != session {
            debug!("Discarding import submission that arrived after close");
            return Err(ServiceError::Cancelled);
        }
        inner.state.pending = false;
        let job = result?;
        info!("Import {} queued for {}", job.id, request.entity_type);

        inner.state.job_id = Some(job.id.clone());
        inner.state.step = ImportStep::Importing;
        if inner.state.apply_job(job.clone()) == PollControl::Continue {
            let weak = Arc::downgrade(&self.inner);
            let poller = StatusPoller::spawn(self.service.clone(), &job.id, self.poll_interval, move |polled| {
                apply_polled(&weak, session, polled)
            });
            inner.poller = Some(poller);
        }
        Ok(job)
    }

    /// Closes the dialog from any step: stops polling and resets everything.
    /// Responses still in flight are discarded when they arrive.
    pub fn close(&self) {
        let mut inner = self.lock();
        if let Some(poller) = inner.poller.take() {
            poller.cancel();
            debug!("Cancelled polling of import {}", poller.job_id());
        }
        inner.session += 1;
        let entity_type = inner.state.entity_type;
        inner.state = ImportState::new(entity_type);
    }

    pub fn is_polling(&self) -> bool {
        self.lock().poller.as_ref().map_or(false, |p| !p.is_cancelled() && !p.is_finished())
    }

    pub fn poll_updates(&self) -> Option<watch::Receiver<PollSnapshot>> {
        self.lock().poller.as_ref().map(|p| p.subscribe())
    }

    /// Destination choices for the mapping editor
    pub fn destination_fields(&self) -> &'static [ColumnDef] {
        self.lock().state.entity_type.columns()
    }

    /// Mapping editor rows in file column order
    pub fn mapping_rows(&self) -> Vec<MappingRow> {
        let inner = self.lock();
        let state = &inner.state;
        let Some(preview) = &state.preview else {
            return Vec::new();
        };
        preview
            .columns
            .iter()
            .map(|source| {
                let destination = state.mapping.get(source).filter(|d| !d.is_empty()).cloned();
                MappingRow {
                    source: source.clone(),
                    skipped: destination.is_none(),
                    destination,
                }
            })
            .collect()
    }

    /// Result counters once the job finished
    pub fn summary(&self) -> Option<ImportSummary> {
        let inner = self.lock();
        match (&inner.state.step, &inner.state.job) {
            (ImportStep::Complete, Some(job)) => Some(job.summary()),
            _ => None,
        }
    }
}

fn apply_polled(inner: &Weak<Mutex<Inner>>, session: u64, job: &ImportJob) -> PollControl {
    let Some(inner) = inner.upgrade() else {
        return PollControl::Stop;
    };
    let mut inner = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if inner.session != session {
        return PollControl::Stop;
    }
    let control = inner.state.apply_job(job.clone());
    debug!("Import {} at {:.0}% ({})", job.id, job.progress, job.status);
    control
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::data_export::service::MockDataExportService;
    use crate::domains::data_export::types::{ImportOutcome, JobStatus};
    use crate::errors::ApiError;

    const TICK: Duration = Duration::from_millis(5);

    fn csv_file() -> UploadFile {
        UploadFile::new("clients.csv", b"Name,Email,Phone\nAli,ali@example.com,0500000000\n".to_vec())
    }

    fn preview() -> ImportPreview {
        serde_json::from_value(serde_json::json!({
            "columns": ["Name", "Email", "Phone"],
            "totalRows": 1,
            "suggestedMapping": {"Name": "fullName", "Email": "email", "Phone": ""}
        }))
        .unwrap()
    }

    fn job(status: JobStatus, progress: f64, ok: u64, errors: u64) -> ImportJob {
        serde_json::from_value(serde_json::json!({
            "_id": "imp-42",
            "entityType": "clients",
            "status": status.as_str(),
            "totalRecords": 10,
            "successCount": ok,
            "errorCount": errors,
            "progress": progress
        }))
        .unwrap()
    }

    fn dialog(mock: &Arc<MockDataExportService>) -> ImportDialog {
        ImportDialog::new(mock.clone(), EntityType::Clients).with_poll_interval(TICK)
    }

    async fn dialog_in_preview(mock: &Arc<MockDataExportService>) -> ImportDialog {
        *mock.preview_result.lock().unwrap() = Ok(preview());
        let dialog = dialog(mock);
        dialog.drop_files(vec![csv_file()]).await.unwrap();
        dialog
    }

    async fn wait_for_step(dialog: &ImportDialog, step: ImportStep) {
        for _ in 0..200 {
            if dialog.step() == step {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("dialog never reached {:?}", step);
    }

    #[tokio::test]
    async fn test_empty_drop_is_noop() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = dialog(&mock);
        assert_eq!(dialog.drop_files(Vec::new()).await.unwrap(), None);
        assert_eq!(dialog.step(), ImportStep::Upload);
        assert_eq!(mock.preview_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_preview_sets_suggested_mapping() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = dialog_in_preview(&mock).await;

        let state = dialog.snapshot();
        assert_eq!(state.step, ImportStep::Preview);
        assert_eq!(state.mapping, preview().suggested_mapping);
        let rows = dialog.mapping_rows();
        assert_eq!(rows.iter().map(|r| r.source.as_str()).collect::<Vec<_>>(), vec!["Name", "Email", "Phone"]);
        assert!(rows[2].skipped);
        assert_eq!(rows[0].destination.as_deref(), Some("fullName"));
    }

    #[tokio::test]
    async fn test_only_first_file_is_used() {
        let mock = Arc::new(MockDataExportService::new());
        *mock.preview_result.lock().unwrap() = Ok(preview());
        let dialog = dialog(&mock);
        let second = UploadFile::new("other.csv", b"a,b\n".to_vec());
        dialog.drop_files(vec![csv_file(), second]).await.unwrap();
        assert_eq!(dialog.snapshot().file.map(|f| f.file_name), Some("clients.csv".to_string()));
        assert_eq!(mock.preview_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_file_makes_no_request() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = dialog(&mock);
        let png = UploadFile::new("scan.png", vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        let err = dialog.drop_files(vec![png]).await.unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FILE_TYPE");
        assert_eq!(dialog.step(), ImportStep::Upload);
        assert_eq!(mock.preview_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_preview_stays_in_upload() {
        let mock = Arc::new(MockDataExportService::new());
        *mock.preview_result.lock().unwrap() = Err(ServiceError::Network("offline".into()));
        let dialog = dialog(&mock);
        assert!(dialog.drop_files(vec![csv_file()]).await.is_err());
        let state = dialog.snapshot();
        assert_eq!(state.step, ImportStep::Upload);
        assert!(state.file.is_none());
        assert!(!state.pending);
    }

    #[tokio::test]
    async fn test_set_mapping_and_change_file() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = dialog_in_preview(&mock).await;

        dialog.set_mapping("Phone", "phone").unwrap();
        assert!(!dialog.mapping_rows()[2].skipped);
        dialog.set_mapping("Email", "").unwrap();
        assert!(dialog.mapping_rows()[1].skipped);
        assert!(dialog.set_mapping("Fax", "phone").is_err());
        assert!(dialog.set_mapping("Name", "caseNumber").is_err());

        dialog.change_file().unwrap();
        let state = dialog.snapshot();
        assert_eq!(state.step, ImportStep::Upload);
        assert!(state.file.is_none() && state.preview.is_none() && state.mapping.is_empty());
    }

    #[tokio::test]
    async fn test_suggested_field_outside_catalogue_can_be_restored() {
        let mock = Arc::new(MockDataExportService::new());
        let mut custom = preview();
        custom.columns.push("Ref".to_string());
        custom.suggested_mapping.insert("Ref".to_string(), "legacyRef".to_string());
        *mock.preview_result.lock().unwrap() = Ok(custom);
        let dialog = dialog(&mock);
        dialog.drop_files(vec![csv_file()]).await.unwrap();
        assert_eq!(dialog.snapshot().mapping.get("Ref").map(String::as_str), Some("legacyRef"));

        dialog.set_mapping("Ref", "").unwrap();
        dialog.set_mapping("Ref", "legacyRef").unwrap();
        assert_eq!(dialog.snapshot().mapping.get("Ref").map(String::as_str), Some("legacyRef"));
        // another column may take the suggested field too
        dialog.set_mapping("Phone", "legacyRef").unwrap();
        assert!(dialog.set_mapping("Phone", "salary").is_err());
    }

    #[tokio::test]
    async fn test_import_polls_to_complete() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = dialog_in_preview(&mock).await;
        *mock.import_result.lock().unwrap() = Ok(job(JobStatus::Pending, 0.0, 0, 0));
        mock.push_status(Ok(job(JobStatus::Processing, 50.0, 5, 0)));
        mock.push_status(Ok(job(JobStatus::Partial, 100.0, 8, 2)));

        dialog.set_skip_duplicates(false);
        let queued = dialog.start_import().await.unwrap();
        assert_eq!(queued.id, "imp-42");
        assert_eq!(dialog.snapshot().job_id.as_deref(), Some("imp-42"));

        let sent = mock.import_requests.lock().unwrap()[0].clone();
        assert_eq!(sent.mapping, preview().suggested_mapping);
        assert!(!sent.skip_duplicates);
        assert!(!sent.update_existing);

        wait_for_step(&dialog, ImportStep::Complete).await;
        let summary = dialog.summary().unwrap();
        assert_eq!(summary.outcome, Some(ImportOutcome::Partial));
        assert_eq!((summary.success_count, summary.error_count, summary.skipped_count), (8, 2, 0));
    }

    #[tokio::test]
    async fn test_failed_submission_stays_in_preview() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = dialog_in_preview(&mock).await;
        *mock.import_result.lock().unwrap() = Err(ServiceError::Api(ApiError::new(422, "Invalid mapping")));

        assert!(dialog.start_import().await.is_err());
        let state = dialog.snapshot();
        assert_eq!(state.step, ImportStep::Preview);
        assert!(state.job_id.is_none());
        assert!(!state.pending);
    }

    #[tokio::test]
    async fn test_second_submit_rejected_while_pending() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = dialog_in_preview(&mock).await;
        *mock.import_result.lock().unwrap() = Ok(job(JobStatus::Completed, 100.0, 10, 0));
        mock.set_latency(Duration::from_millis(50));

        let first = tokio::spawn({
            let dialog = dialog.clone();
            async move { dialog.start_import().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = dialog.start_import().await;
        assert!(matches!(second, Err(ServiceError::AlreadyPending(_))));

        assert!(first.await.unwrap().is_ok());
        assert_eq!(mock.import_requests.lock().unwrap().len(), 1);
        // already terminal, so no polling was started
        assert_eq!(dialog.step(), ImportStep::Complete);
        assert!(!dialog.is_polling());
    }

    #[tokio::test]
    async fn test_progress_never_goes_backwards() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = dialog_in_preview(&mock).await;
        *mock.import_result.lock().unwrap() = Ok(job(JobStatus::Processing, 60.0, 6, 0));
        mock.push_status(Ok(job(JobStatus::Processing, 40.0, 6, 0)));

        dialog.start_import().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let progress = dialog.snapshot().job.map(|j| j.progress);
        assert_eq!(progress, Some(60.0));
        dialog.close();
    }

    #[tokio::test]
    async fn test_close_while_importing_stops_polling() {
        let mock = Arc::new(MockDataExportService::new());
        let dialog = dialog_in_preview(&mock).await;
        *mock.import_result.lock().unwrap() = Ok(job(JobStatus::Pending, 0.0, 0, 0));
        mock.push_status(Ok(job(JobStatus::Processing, 10.0, 1, 0)));

        dialog.start_import().await.unwrap();
        assert!(dialog.is_polling());
        tokio::time::sleep(Duration::from_millis(25)).await;

        dialog.close();
        let state = dialog.snapshot();
        assert_eq!(state.step, ImportStep::Upload);
        assert!(state.file.is_none() && state.mapping.is_empty() && state.job_id.is_none() && state.job.is_none());
        assert!(!dialog.is_polling());

        let calls = mock.status_call_count();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(mock.status_call_count(), calls);
    }

    #[tokio::test]
    async fn test_close_from_every_step_resets() {
        let mock = Arc::new(MockDataExportService::new());

        let upload = dialog(&mock);
        upload.close();
        assert_eq!(upload.snapshot(), ImportState::new(EntityType::Clients));

        let previewing = dialog_in_preview(&mock).await;
        previewing.close();
        assert_eq!(previewing.snapshot(), ImportState::new(EntityType::Clients));

        let complete = dialog_in_preview(&mock).await;
        *mock.import_result.lock().unwrap() = Ok(job(JobStatus::Completed, 100.0, 10, 0));
        complete.start_import().await.unwrap();
        assert_eq!(complete.step(), ImportStep::Complete);
        complete.close();
        assert_eq!(complete.snapshot(), ImportState::new(EntityType::Clients));
    }

    #[tokio::test]
    async fn test_preview_arriving_after_close_is_discarded() {
        let mock = Arc::new(MockDataExportService::new());
        *mock.preview_result.lock().unwrap() = Ok(preview());
        mock.set_latency(Duration::from_millis(40));
        let dialog = dialog(&mock);

        let pending = tokio::spawn({
            let dialog = dialog.clone();
            async move { dialog.drop_files(vec![csv_file()]).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        dialog.close();

        assert!(matches!(pending.await.unwrap(), Err(ServiceError::Cancelled)));
        let state = dialog.snapshot();
        assert_eq!(state.step, ImportStep::Upload);
        assert!(state.preview.is_none() && state.mapping.is_empty());
    }
}
