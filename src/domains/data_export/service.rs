use async_trait::async_trait;
use log::{debug, info};
use reqwest::multipart::{Form, Part};

use crate::domains::core::api_client::ApiClient;
use crate::domains::data_export::types::{
    ExportFormat, ExportJob, HistoryQuery, ImportJob, ImportPreview, StartExportRequest, StartImportRequest,
};
use crate::errors::{DomainError, ServiceError, ServiceResult};
use crate::types::{EntityType, UploadFile};
use crate::validation::{ImportFileKind, Validate};

/// Trait for the export/import job endpoints
#[async_trait]
pub trait DataExportService: Send + Sync {
    /// Queue an export job
    async fn start_export(&self, request: &StartExportRequest) -> ServiceResult<ExportJob>;

    /// Upload a file for column analysis without importing anything
    async fn preview_import(&self, file: &UploadFile, entity_type: EntityType) -> ServiceResult<ImportPreview>;

    /// Queue an import job
    async fn start_import(&self, request: &StartImportRequest) -> ServiceResult<ImportJob>;

    /// Current state of an import job
    async fn import_status(&self, job_id: &str) -> ServiceResult<ImportJob>;

    async fn export_history(&self, query: HistoryQuery) -> ServiceResult<Vec<ExportJob>>;

    async fn import_history(&self, query: HistoryQuery) -> ServiceResult<Vec<ImportJob>>;

    /// Bytes of a completed export
    async fn download_export(&self, job_id: &str, file_name: &str) -> ServiceResult<Vec<u8>>;

    /// Blank import template for an entity type
    async fn download_template(&self, entity_type: EntityType, format: ExportFormat) -> ServiceResult<Vec<u8>>;
}

/// Implementation of DataExportService over the REST API
pub struct ApiDataExportService {
    client: ApiClient,
}

impl ApiDataExportService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn file_part(file: &UploadFile) -> ServiceResult<Part> {
        let content_type = file
            .extension()
            .as_deref()
            .and_then(ImportFileKind::from_extension)
            .and_then(|kind| kind.mime_type().parse::<mime::Mime>().ok())
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(content_type.as_ref())
            .map_err(|e| ServiceError::Domain(DomainError::File(format!("Invalid upload type {}: {}", content_type, e))))
    }
}

#[async_trait]
impl DataExportService for ApiDataExportService {
    async fn start_export(&self, request: &StartExportRequest) -> ServiceResult<ExportJob> {
        request.validate()?;
        info!(
            "Starting {} export of {} ({} columns)",
            request.format.as_str(),
            request.entity_type,
            request.columns.as_ref().map_or("all".to_string(), |c| c.len().to_string())
        );
        self.client.post_json("exports", request).await
    }

    async fn preview_import(&self, file: &UploadFile, entity_type: EntityType) -> ServiceResult<ImportPreview> {
        debug!("Requesting preview of {} ({} bytes) for {}", file.file_name, file.size(), entity_type);
        let form = Form::new()
            .text("entityType", entity_type.as_str())
            .part("file", Self::file_part(file)?);
        self.client.post_multipart("imports/preview", form).await
    }

    async fn start_import(&self, request: &StartImportRequest) -> ServiceResult<ImportJob> {
        request.validate()?;
        let mapping = serde_json::to_string(&request.mapping)
            .map_err(|e| ServiceError::Domain(DomainError::Internal(format!("Failed to encode mapping: {}", e))))?;
        info!(
            "Starting import of {} into {} ({} mapped columns)",
            request.file.file_name,
            request.entity_type,
            request.mapping.values().filter(|d| !d.is_empty()).count()
        );
        let form = Form::new()
            .text("entityType", request.entity_type.as_str())
            .text("mapping", mapping)
            .text("skipDuplicates", request.skip_duplicates.to_string())
            .text("updateExisting", request.update_existing.to_string())
            .part("file", Self::file_part(&request.file)?);
        self.client.post_multipart("imports", form).await
    }

    async fn import_status(&self, job_id: &str) -> ServiceResult<ImportJob> {
        let path = format!("imports/{}/status", urlencoding::encode(job_id));
        self.client.get_json(&path, &[]).await
    }

    async fn export_history(&self, query: HistoryQuery) -> ServiceResult<Vec<ExportJob>> {
        self.client.get_json("exports/history", &query.to_query()).await
    }

    async fn import_history(&self, query: HistoryQuery) -> ServiceResult<Vec<ImportJob>> {
        self.client.get_json("imports/history", &query.to_query()).await
    }

    async fn download_export(&self, job_id: &str, file_name: &str) -> ServiceResult<Vec<u8>> {
        let path = format!("exports/{}/download", urlencoding::encode(job_id));
        let bytes = self.client.get_bytes(&path, &[("fileName", file_name.to_string())]).await?;
        info!("Downloaded {} ({} bytes)", file_name, bytes.len());
        Ok(bytes)
    }

    async fn download_template(&self, entity_type: EntityType, format: ExportFormat) -> ServiceResult<Vec<u8>> {
        let query = [
            ("entityType", entity_type.as_str().to_string()),
            ("format", format.as_str().to_string()),
        ];
        self.client.get_bytes("export-templates", &query).await
    }
}

/// Scripted implementation for testing
#[cfg(test)]
pub struct MockDataExportService {
    pub export_result: std::sync::Mutex<ServiceResult<ExportJob>>,
    pub preview_result: std::sync::Mutex<ServiceResult<ImportPreview>>,
    pub import_result: std::sync::Mutex<ServiceResult<ImportJob>>,
    /// Popped per status call; the last entry repeats
    pub status_results: std::sync::Mutex<std::collections::VecDeque<ServiceResult<ImportJob>>>,
    pub export_history_result: std::sync::Mutex<ServiceResult<Vec<ExportJob>>>,
    pub download_result: std::sync::Mutex<ServiceResult<Vec<u8>>>,
    /// Latency added to every call
    pub latency: std::sync::Mutex<std::time::Duration>,
    pub export_requests: std::sync::Mutex<Vec<StartExportRequest>>,
    pub import_requests: std::sync::Mutex<Vec<StartImportRequest>>,
    pub downloads: std::sync::Mutex<Vec<(String, String)>>,
    pub preview_calls: std::sync::atomic::AtomicUsize,
    pub status_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
fn not_scripted<T>() -> ServiceResult<T> {
    Err(ServiceError::Api(crate::errors::ApiError::new(404, "not scripted")))
}

#[cfg(test)]
impl MockDataExportService {
    pub fn new() -> Self {
        Self {
            export_result: std::sync::Mutex::new(not_scripted()),
            preview_result: std::sync::Mutex::new(not_scripted()),
            import_result: std::sync::Mutex::new(not_scripted()),
            status_results: std::sync::Mutex::new(std::collections::VecDeque::new()),
            export_history_result: std::sync::Mutex::new(Ok(Vec::new())),
            download_result: std::sync::Mutex::new(Ok(Vec::new())),
            latency: std::sync::Mutex::new(std::time::Duration::ZERO),
            export_requests: std::sync::Mutex::new(Vec::new()),
            import_requests: std::sync::Mutex::new(Vec::new()),
            downloads: std::sync::Mutex::new(Vec::new()),
            preview_calls: std::sync::atomic::AtomicUsize::new(0),
            status_calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn set_latency(&self, latency: std::time::Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn push_status(&self, result: ServiceResult<ImportJob>) {
        self.status_results.lock().unwrap().push_back(result);
    }

    pub fn status_call_count(&self) -> usize {
        self.status_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[cfg(test)]
#[async_trait]
impl DataExportService for MockDataExportService {
    async fn start_export(&self, request: &StartExportRequest) -> ServiceResult<ExportJob> {
        self.export_requests.lock().unwrap().push(request.clone());
        self.simulate_latency().await;
        self.export_result.lock().unwrap().clone()
    }

    async fn preview_import(&self, _file: &UploadFile, _entity_type: EntityType) -> ServiceResult<ImportPreview> {
        self.preview_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.simulate_latency().await;
        self.preview_result.lock().unwrap().clone()
    }

    async fn start_import(&self, request: &StartImportRequest) -> ServiceResult<ImportJob> {
        self.import_requests.lock().unwrap().push(request.clone());
        self.simulate_latency().await;
        self.import_result.lock().unwrap().clone()
    }

    async fn import_status(&self, _job_id: &str) -> ServiceResult<ImportJob> {
        self.status_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut results = self.status_results.lock().unwrap();
        match results.len() {
            0 => not_scripted(),
            1 => results[0].clone(),
            _ => results.pop_front().unwrap_or_else(|| Err(ServiceError::Cancelled)),
        }
    }

    async fn export_history(&self, _query: HistoryQuery) -> ServiceResult<Vec<ExportJob>> {
        self.export_history_result.lock().unwrap().clone()
    }

    async fn import_history(&self, _query: HistoryQuery) -> ServiceResult<Vec<ImportJob>> {
        Ok(Vec::new())
    }

    async fn download_export(&self, job_id: &str, file_name: &str) -> ServiceResult<Vec<u8>> {
        self.downloads.lock().unwrap().push((job_id.to_string(), file_name.to_string()));
        self.download_result.lock().unwrap().clone()
    }

    async fn download_template(&self, entity_type: EntityType, format: ExportFormat) -> ServiceResult<Vec<u8>> {
        Ok(format!("template:{}:{}", entity_type, format.as_str()).into_bytes())
    }
}
