use crate::errors::{ValidationError, DomainResult, DomainError};
use crate::types::UploadFile;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;
use serde::{Serialize, Deserialize};

/// A trait that request types implement for validation.
pub trait Validate {
    /// Validates the value and returns an error if validation fails.
    fn validate(&self) -> DomainResult<()>;
}

// Common regex patterns
fn currency_code_regex() -> &'static Regex {
    static CURRENCY_REGEX: OnceLock<Regex> = OnceLock::new();
    CURRENCY_REGEX.get_or_init(|| Regex::new(r"^[A-Z]{3}$").unwrap())
}

fn http_url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap())
}

/// Struct for configuring validations in a fluent style
#[derive(Default)]
pub struct ValidationBuilder<T> {
    field_name: String,
    value: Option<T>,
    errors: Vec<ValidationError>,
}

/// Generic validation implementations
impl<T> ValidationBuilder<T> {
    pub fn new(field_name: &str, value: Option<T>) -> Self {
        Self {
            field_name: field_name.to_string(),
            value,
            errors: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self
    where T: Default + PartialEq {
        if self.value.is_none() || self.value == Some(T::default()) {
            self.errors.push(ValidationError::required(&self.field_name));
        }
        self
    }

    /// Complete validation and return result
    pub fn validate(self) -> DomainResult<()> {
        match self.errors.into_iter().next() {
            None => Ok(()),
            // Return the first error for simplicity
            Some(err) => Err(DomainError::Validation(err)),
        }
    }
}

/// String-specific validations
impl ValidationBuilder<String> {
    pub fn matches_pattern(mut self, pattern: &Regex, message: &str) -> Self {
        if let Some(value) = &self.value {
            if !pattern.is_match(value) {
                self.errors.push(ValidationError::format(&self.field_name, message));
            }
        }
        self
    }

    pub fn currency_code(self) -> Self {
        self.matches_pattern(currency_code_regex(), "must be a three-letter ISO 4217 code")
    }

    pub fn http_url(self) -> Self {
        self.matches_pattern(http_url_regex(), "must be an http(s) URL")
    }
}

/// Numeric validations
impl<T> ValidationBuilder<T>
where T: PartialOrd + Clone + std::fmt::Display
{
    pub fn range(mut self, min: T, max: T) -> Self {
        if let Some(value) = &self.value {
            if value < &min || value > &max {
                self.errors.push(ValidationError::range(
                    &self.field_name,
                    min.to_string(),
                    max.to_string()
                ));
            }
        }
        self
    }
}

/// Date validation helpers
impl ValidationBuilder<NaiveDate> {
    pub fn not_before(mut self, date: NaiveDate) -> Self {
        if let Some(value) = &self.value {
            if value < &date {
                self.errors.push(ValidationError::invalid_value(
                    &self.field_name,
                    &format!("must not be before {}", date)
                ));
            }
        }
        self
    }
}

/// Helper for validating file sizes
pub fn validate_file_size(size: u64, max_size: u64) -> bool {
    size <= max_size
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// File kinds accepted by the import drop zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportFileKind {
    Xlsx,
    Csv,
    Json,
}

impl ImportFileKind {
    pub const EXTENSIONS: [&'static str; 3] = ["xlsx", "csv", "json"];

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImportFileKind::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ImportFileKind::Csv => "text/csv",
            ImportFileKind::Json => "application/json",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "xlsx" => Some(ImportFileKind::Xlsx),
            "csv" => Some(ImportFileKind::Csv),
            "json" => Some(ImportFileKind::Json),
            _ => None,
        }
    }
}

/// Checks an upload against the drop-zone rules before any request is made:
/// the extension must be xlsx/csv/json, the file non-empty and within
/// `max_bytes`. Only spreadsheets are content-checked (they must be zip
/// containers); csv/json text is left to the server, whatever its encoding.
pub fn accept_import_file(file: &UploadFile, max_bytes: u64) -> DomainResult<ImportFileKind> {
    let kind = file
        .extension()
        .as_deref()
        .and_then(ImportFileKind::from_extension)
        .ok_or_else(|| ValidationError::unsupported_file(&file.file_name))?;

    if file.bytes.is_empty() {
        return Err(ValidationError::invalid_value("file", "file is empty").into());
    }

    if !validate_file_size(file.size(), max_bytes) {
        return Err(ValidationError::FileTooLarge {
            file_name: file.file_name.clone(),
            size: file.size(),
            max: max_bytes,
        }
        .into());
    }

    if kind == ImportFileKind::Xlsx {
        let sniffed = infer::get(&file.bytes).map(|t| t.mime_type());
        if sniffed != Some(ImportFileKind::Xlsx.mime_type()) && !file.bytes.starts_with(ZIP_MAGIC) {
            log::debug!("Rejected {}: content sniffed as {:?}", file.file_name, sniffed);
            return Err(ValidationError::unsupported_file(&file.file_name).into());
        }
    }

    Ok(kind)
}
