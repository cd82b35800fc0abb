use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::types::{EntityType, Language, UploadFile};
use crate::validation::Validate;

/// File formats an export can be generated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
    Pdf,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Json => "json",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "xlsx" => Some(ExportFormat::Xlsx),
            "csv" => Some(ExportFormat::Csv),
            "pdf" => Some(ExportFormat::Pdf),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    /// Get file extension for this format
    pub fn file_extension(&self) -> &'static str {
        self.as_str()
    }
}

/// Lifecycle of an export or import job on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Partial,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Partial => "partial",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Partial)
    }

    fn stage(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            _ => 2,
        }
    }

    /// Statuses only move forward; repeating the current status is allowed
    /// (a poll that saw no change).
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        *self == next || (!self.is_terminal() && next.stage() > self.stage())
    }

    pub fn label(&self, language: Language) -> &'static str {
        match (self, language) {
            (JobStatus::Pending, Language::En) => "Pending",
            (JobStatus::Pending, Language::Ar) => "قيد الانتظار",
            (JobStatus::Processing, Language::En) => "Processing",
            (JobStatus::Processing, Language::Ar) => "جاري المعالجة",
            (JobStatus::Completed, Language::En) => "Completed",
            (JobStatus::Completed, Language::Ar) => "مكتمل",
            (JobStatus::Failed, Language::En) => "Failed",
            (JobStatus::Failed, Language::Ar) => "فشل",
            (JobStatus::Partial, Language::En) => "Partial",
            (JobStatus::Partial, Language::Ar) => "جزئي",
        }
    }

    pub fn tone(&self) -> BadgeTone {
        match self {
            JobStatus::Pending => BadgeTone::Neutral,
            JobStatus::Processing => BadgeTone::Info,
            JobStatus::Completed => BadgeTone::Success,
            JobStatus::Partial => BadgeTone::Warning,
            JobStatus::Failed => BadgeTone::Danger,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colour family a host uses for badges and result banners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTone {
    Neutral,
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub entity_type: EntityType,
    pub format: ExportFormat,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub include_related: bool,
    #[serde(default)]
    pub language: Language,
    pub status: JobStatus,
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ExportJob {
    /// `fileName` is present exactly when the job completed
    pub fn check_invariants(&self) -> DomainResult<()> {
        let has_file = self.file_name.as_deref().map_or(false, |n| !n.is_empty());
        if has_file != (self.status == JobStatus::Completed) {
            return Err(DomainError::InvariantViolated(format!(
                "export {} is {} but fileName is {}",
                self.id,
                self.status,
                if has_file { "set" } else { "missing" }
            )));
        }
        Ok(())
    }

    pub fn can_download(&self) -> bool {
        self.status == JobStatus::Completed && self.file_name.as_deref().map_or(false, |n| !n.is_empty())
    }
}

/// One rejected row of an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRowError {
    pub row: u64,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(alias = "error")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub mapping: HashMap<String, String>,
    #[serde(default)]
    pub skip_duplicates: bool,
    #[serde(default)]
    pub update_existing: bool,
    pub status: JobStatus,
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub skipped_count: u64,
    /// 0-100
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub errors: Vec<ImportRowError>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ImportJob {
    pub fn processed_count(&self) -> u64 {
        self.success_count + self.error_count + self.skipped_count
    }

    /// Status the counters call for once the job has finished
    pub fn expected_outcome(&self) -> JobStatus {
        if self.error_count == 0 {
            JobStatus::Completed
        } else if self.error_count < self.total_records {
            JobStatus::Partial
        } else {
            JobStatus::Failed
        }
    }

    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.processed_count() > self.total_records {
            return Err(DomainError::InvariantViolated(format!(
                "import {}: {} processed rows exceed {} total",
                self.id,
                self.processed_count(),
                self.total_records
            )));
        }
        if !(0.0..=100.0).contains(&self.progress) {
            return Err(DomainError::InvariantViolated(format!(
                "import {}: progress {} out of range",
                self.id, self.progress
            )));
        }
        if self.status.is_terminal() && (self.status == JobStatus::Completed) != (self.error_count == 0) {
            return Err(DomainError::InvariantViolated(format!(
                "import {}: status {} with {} errors",
                self.id, self.status, self.error_count
            )));
        }
        if self.status == JobStatus::Partial && self.error_count >= self.total_records {
            return Err(DomainError::InvariantViolated(format!(
                "import {}: partial but every row failed",
                self.id
            )));
        }
        Ok(())
    }

    pub fn outcome(&self) -> Option<ImportOutcome> {
        match self.status {
            JobStatus::Completed => Some(ImportOutcome::Success),
            JobStatus::Partial => Some(ImportOutcome::Partial),
            JobStatus::Failed => Some(ImportOutcome::Failed),
            JobStatus::Pending | JobStatus::Processing => None,
        }
    }

    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            outcome: self.outcome(),
            success_count: self.success_count,
            error_count: self.error_count,
            skipped_count: self.skipped_count,
            total_records: self.total_records,
            unaccounted: self.total_records.saturating_sub(self.processed_count()),
        }
    }
}

/// Server-side analysis of an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub columns: Vec<String>,
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub suggested_mapping: HashMap<String, String>,
    #[serde(default)]
    pub sample_rows: Vec<Vec<String>>,
}

impl ImportPreview {
    /// Suggested mapping restricted to the columns the file actually has
    pub fn initial_mapping(&self) -> HashMap<String, String> {
        self.suggested_mapping
            .iter()
            .filter(|(source, _)| self.columns.contains(source))
            .map(|(source, dest)| (source.clone(), dest.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExportRequest {
    pub entity_type: EntityType,
    pub format: ExportFormat,
    /// Absent means every column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    pub include_related: bool,
    pub language: Language,
}

impl Validate for StartExportRequest {
    fn validate(&self) -> DomainResult<()> {
        if let Some(columns) = &self.columns {
            if columns.is_empty() {
                return Err(ValidationError::invalid_value("columns", "must be omitted rather than empty").into());
            }
            if let Some(unknown) = columns.iter().find(|c| !self.entity_type.has_column(c)) {
                return Err(ValidationError::invalid_value(
                    "columns",
                    &format!("'{}' is not a column of {}", unknown, self.entity_type),
                )
                .into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartImportRequest {
    pub entity_type: EntityType,
    pub file: UploadFile,
    pub mapping: HashMap<String, String>,
    pub skip_duplicates: bool,
    pub update_existing: bool,
}

impl Validate for StartImportRequest {
    fn validate(&self) -> DomainResult<()> {
        if self.mapping.values().all(|d| d.is_empty()) {
            return Err(ValidationError::invalid_value("mapping", "at least one column must be mapped").into());
        }
        Ok(())
    }
}

/// Paging for the history listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

impl HistoryQuery {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(page) = self.page {
            query.push(("page", page.to_string()));
        }
        query
    }
}

/// Columns picked for an export.
///
/// `All` is the untouched state. Once a column is toggled the selection
/// becomes an explicit list, and stays explicit even if every column ends
/// up picked again.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "columns", rename_all = "lowercase")]
pub enum ColumnSelection {
    #[default]
    All,
    Explicit(Vec<String>),
}

impl ColumnSelection {
    pub fn toggle(&mut self, entity: EntityType, field: &str) {
        if !entity.has_column(field) {
            return;
        }
        let next = match std::mem::take(self) {
            ColumnSelection::All => {
                ColumnSelection::Explicit(entity.column_fields().into_iter().filter(|f| f != field).collect())
            }
            ColumnSelection::Explicit(mut fields) => {
                match fields.iter().position(|f| f == field) {
                    Some(index) => {
                        fields.remove(index);
                    }
                    None => fields.push(field.to_string()),
                }
                if fields.is_empty() {
                    ColumnSelection::All
                } else {
                    ColumnSelection::Explicit(fields)
                }
            }
        };
        *self = next;
    }

    pub fn select_all(&mut self, entity: EntityType) {
        let next = match &*self {
            ColumnSelection::Explicit(fields) if fields.len() == entity.columns().len() => ColumnSelection::All,
            _ => ColumnSelection::Explicit(entity.column_fields()),
        };
        *self = next;
    }

    pub fn is_selected(&self, field: &str) -> bool {
        match self {
            ColumnSelection::All => true,
            ColumnSelection::Explicit(fields) => fields.iter().any(|f| f == field),
        }
    }

    pub fn is_all_selected(&self, entity: EntityType) -> bool {
        match self {
            ColumnSelection::All => true,
            ColumnSelection::Explicit(fields) => entity.columns().iter().all(|c| fields.iter().any(|f| f == c.field)),
        }
    }

    /// Payload form: `None` unless an explicit, non-empty list was picked
    pub fn to_request(&self) -> Option<Vec<String>> {
        match self {
            ColumnSelection::Explicit(fields) if !fields.is_empty() => Some(fields.clone()),
            _ => None,
        }
    }
}

/// Import wizard steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStep {
    Upload,
    Preview,
    Importing,
    Complete,
}

impl ImportStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStep::Upload => "upload",
            ImportStep::Preview => "preview",
            ImportStep::Importing => "importing",
            ImportStep::Complete => "complete",
        }
    }
}

/// Step shown for a polled job status
pub fn derive_step(status: JobStatus) -> ImportStep {
    if status.is_terminal() {
        ImportStep::Complete
    } else {
        ImportStep::Importing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportOutcome {
    Success,
    Partial,
    Failed,
}

impl ImportOutcome {
    pub fn tone(&self) -> BadgeTone {
        match self {
            ImportOutcome::Success => BadgeTone::Success,
            ImportOutcome::Partial => BadgeTone::Warning,
            ImportOutcome::Failed => BadgeTone::Danger,
        }
    }
}

/// The three result counters, always reported together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub outcome: Option<ImportOutcome>,
    pub success_count: u64,
    pub error_count: u64,
    pub skipped_count: u64,
    pub total_records: u64,
    /// Rows the counters do not cover yet
    pub unaccounted: u64,
}
