use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domains::core::format::{format_date, format_file_size};
use crate::domains::data_export::service::DataExportService;
use crate::domains::data_export::types::{
    BadgeTone, ExportFormat, ExportJob, HistoryQuery, ImportJob, ImportSummary, JobStatus,
};
use crate::errors::{DomainError, ServiceResult, ValidationError};
use crate::types::{EntityType, Language};

/// Export history row with display fields resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ExportHistoryRow {
    pub id: String,
    pub entity_type: EntityType,
    pub format: ExportFormat,
    pub status: JobStatus,
    pub status_label: &'static str,
    pub tone: BadgeTone,
    pub total_records: u64,
    pub file_name: Option<String>,
    pub size_display: String,
    pub date_display: String,
    pub can_download: bool,
}

impl ExportHistoryRow {
    pub fn from_job(job: &ExportJob, language: Language) -> Self {
        Self {
            id: job.id.clone(),
            entity_type: job.entity_type,
            format: job.format,
            status: job.status,
            status_label: job.status.label(language),
            tone: job.status.tone(),
            total_records: job.total_records,
            file_name: job.file_name.clone(),
            size_display: format_file_size(job.file_size),
            date_display: job.created_at.as_ref().map_or_else(|| "-".to_string(), |d| format_date(d, language)),
            can_download: job.can_download(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportHistoryRow {
    pub id: String,
    pub entity_type: EntityType,
    pub status: JobStatus,
    pub status_label: &'static str,
    pub tone: BadgeTone,
    pub file_name: Option<String>,
    pub date_display: String,
    pub summary: ImportSummary,
}

impl ImportHistoryRow {
    pub fn from_job(job: &ImportJob, language: Language) -> Self {
        Self {
            id: job.id.clone(),
            entity_type: job.entity_type,
            status: job.status,
            status_label: job.status.label(language),
            tone: job.status.tone(),
            file_name: job.file_name.clone(),
            date_display: job.created_at.as_ref().map_or_else(|| "-".to_string(), |d| format_date(d, language)),
            summary: job.summary(),
        }
    }
}

/// Read-only view over past exports and imports. The two lists load
/// independently.
#[derive(Clone)]
pub struct JobHistory {
    service: Arc<dyn DataExportService>,
    language: Language,
}

impl JobHistory {
    pub fn new(service: Arc<dyn DataExportService>, language: Language) -> Self {
        Self { service, language }
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub async fn load_exports(&self, query: HistoryQuery) -> ServiceResult<Vec<ExportHistoryRow>> {
        let jobs = self.service.export_history(query).await?;
        Ok(jobs.iter().map(|job| ExportHistoryRow::from_job(job, self.language)).collect())
    }

    pub async fn load_imports(&self, query: HistoryQuery) -> ServiceResult<Vec<ImportHistoryRow>> {
        let jobs = self.service.import_history(query).await?;
        Ok(jobs.iter().map(|job| ImportHistoryRow::from_job(job, self.language)).collect())
    }

    /// Fetches a finished export's file
    pub async fn download(&self, job_id: &str, file_name: &str) -> ServiceResult<Vec<u8>> {
        if job_id.is_empty() {
            return Err(ValidationError::required("jobId").into());
        }
        if file_name.is_empty() {
            return Err(ValidationError::required("fileName").into());
        }
        self.service.download_export(job_id, file_name).await
    }

    /// Downloads into `dir`, keeping only the last component of `file_name`.
    /// Returns the written path.
    pub async fn save_download(&self, job_id: &str, file_name: &str, dir: &Path) -> ServiceResult<PathBuf> {
        let bytes = self.download(job_id, file_name).await?;
        let safe_name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| ValidationError::invalid_value("fileName", "must name a file"))?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| DomainError::File(format!("Failed to create {}: {}", dir.display(), e)))?;
        let target = dir.join(safe_name);
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| DomainError::File(format!("Failed to write {}: {}", target.display(), e)))?;
        info!("Saved export {} to {}", job_id, target.display());
        Ok(target)
    }
}
