use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::errors::{DomainError, DomainResult};

/// UI language; also sent with exports so generated files use it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "en" => Some(Language::En),
            "ar" => Some(Language::Ar),
            _ => None,
        }
    }
}

/// Business-object categories that can be exported and imported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Clients,
    Cases,
    Contacts,
    Organizations,
    Staff,
    Invoices,
    TimeEntries,
    Documents,
    Followups,
    Tags,
}

/// One exportable/importable field of an entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub field: &'static str,
    pub label_en: &'static str,
    pub label_ar: &'static str,
}

impl ColumnDef {
    pub fn label(&self, language: Language) -> &'static str {
        match language {
            Language::En => self.label_en,
            Language::Ar => self.label_ar,
        }
    }
}

const fn col(field: &'static str, label_en: &'static str, label_ar: &'static str) -> ColumnDef {
    ColumnDef { field, label_en, label_ar }
}

const CLIENT_COLUMNS: &[ColumnDef] = &[
    col("fullName", "Full Name", "الاسم الكامل"),
    col("email", "Email", "البريد الإلكتروني"),
    col("phone", "Phone", "الهاتف"),
    col("nationalId", "National ID", "رقم الهوية"),
    col("clientType", "Client Type", "نوع العميل"),
    col("companyName", "Company Name", "اسم الشركة"),
    col("city", "City", "المدينة"),
    col("address", "Address", "العنوان"),
    col("status", "Status", "الحالة"),
    col("createdAt", "Created At", "تاريخ الإنشاء"),
];

const CASE_COLUMNS: &[ColumnDef] = &[
    col("caseNumber", "Case Number", "رقم القضية"),
    col("title", "Title", "العنوان"),
    col("category", "Category", "التصنيف"),
    col("status", "Status", "الحالة"),
    col("priority", "Priority", "الأولوية"),
    col("clientName", "Client", "العميل"),
    col("court", "Court", "المحكمة"),
    col("judge", "Judge", "القاضي"),
    col("filingDate", "Filing Date", "تاريخ الرفع"),
    col("nextHearing", "Next Hearing", "الجلسة القادمة"),
];

const CONTACT_COLUMNS: &[ColumnDef] = &[
    col("firstName", "First Name", "الاسم الأول"),
    col("lastName", "Last Name", "اسم العائلة"),
    col("email", "Email", "البريد الإلكتروني"),
    col("phone", "Phone", "الهاتف"),
    col("organization", "Organization", "الجهة"),
    col("title", "Job Title", "المسمى الوظيفي"),
    col("type", "Type", "النوع"),
    col("notes", "Notes", "ملاحظات"),
];

const ORGANIZATION_COLUMNS: &[ColumnDef] = &[
    col("name", "Name", "الاسم"),
    col("registrationNumber", "Registration Number", "رقم السجل التجاري"),
    col("type", "Type", "النوع"),
    col("email", "Email", "البريد الإلكتروني"),
    col("phone", "Phone", "الهاتف"),
    col("website", "Website", "الموقع الإلكتروني"),
    col("city", "City", "المدينة"),
    col("address", "Address", "العنوان"),
];

const STAFF_COLUMNS: &[ColumnDef] = &[
    col("firstName", "First Name", "الاسم الأول"),
    col("lastName", "Last Name", "اسم العائلة"),
    col("email", "Email", "البريد الإلكتروني"),
    col("phone", "Phone", "الهاتف"),
    col("role", "Role", "الدور"),
    col("department", "Department", "القسم"),
    col("hireDate", "Hire Date", "تاريخ التعيين"),
    col("status", "Status", "الحالة"),
];

const INVOICE_COLUMNS: &[ColumnDef] = &[
    col("invoiceNumber", "Invoice Number", "رقم الفاتورة"),
    col("clientName", "Client", "العميل"),
    col("issueDate", "Issue Date", "تاريخ الإصدار"),
    col("dueDate", "Due Date", "تاريخ الاستحقاق"),
    col("subtotal", "Subtotal", "المجموع الفرعي"),
    col("vatAmount", "VAT", "ضريبة القيمة المضافة"),
    col("totalAmount", "Total", "الإجمالي"),
    col("paidAmount", "Paid", "المدفوع"),
    col("status", "Status", "الحالة"),
];

const TIME_ENTRY_COLUMNS: &[ColumnDef] = &[
    col("date", "Date", "التاريخ"),
    col("description", "Description", "الوصف"),
    col("hours", "Hours", "الساعات"),
    col("rate", "Rate", "السعر"),
    col("amount", "Amount", "المبلغ"),
    col("caseNumber", "Case Number", "رقم القضية"),
    col("staffName", "Staff", "الموظف"),
    col("billable", "Billable", "قابل للفوترة"),
    col("status", "Status", "الحالة"),
];

const DOCUMENT_COLUMNS: &[ColumnDef] = &[
    col("fileName", "File Name", "اسم الملف"),
    col("category", "Category", "التصنيف"),
    col("caseNumber", "Case Number", "رقم القضية"),
    col("uploadedBy", "Uploaded By", "رفع بواسطة"),
    col("fileSize", "File Size", "حجم الملف"),
    col("createdAt", "Created At", "تاريخ الإنشاء"),
];

const FOLLOWUP_COLUMNS: &[ColumnDef] = &[
    col("title", "Title", "العنوان"),
    col("type", "Type", "النوع"),
    col("dueDate", "Due Date", "تاريخ الاستحقاق"),
    col("status", "Status", "الحالة"),
    col("priority", "Priority", "الأولوية"),
    col("assignedTo", "Assigned To", "مسند إلى"),
    col("entityReference", "Reference", "المرجع"),
];

const TAG_COLUMNS: &[ColumnDef] = &[
    col("name", "Name", "الاسم"),
    col("color", "Color", "اللون"),
    col("entityType", "Applies To", "ينطبق على"),
    col("usageCount", "Usage Count", "عدد الاستخدامات"),
];

impl EntityType {
    pub const ALL: [EntityType; 10] = [
        EntityType::Clients,
        EntityType::Cases,
        EntityType::Contacts,
        EntityType::Organizations,
        EntityType::Staff,
        EntityType::Invoices,
        EntityType::TimeEntries,
        EntityType::Documents,
        EntityType::Followups,
        EntityType::Tags,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Clients => "clients",
            EntityType::Cases => "cases",
            EntityType::Contacts => "contacts",
            EntityType::Organizations => "organizations",
            EntityType::Staff => "staff",
            EntityType::Invoices => "invoices",
            EntityType::TimeEntries => "time_entries",
            EntityType::Documents => "documents",
            EntityType::Followups => "followups",
            EntityType::Tags => "tags",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Ordered column catalogue. Column sets are never shared between types.
    pub fn columns(&self) -> &'static [ColumnDef] {
        match self {
            EntityType::Clients => CLIENT_COLUMNS,
            EntityType::Cases => CASE_COLUMNS,
            EntityType::Contacts => CONTACT_COLUMNS,
            EntityType::Organizations => ORGANIZATION_COLUMNS,
            EntityType::Staff => STAFF_COLUMNS,
            EntityType::Invoices => INVOICE_COLUMNS,
            EntityType::TimeEntries => TIME_ENTRY_COLUMNS,
            EntityType::Documents => DOCUMENT_COLUMNS,
            EntityType::Followups => FOLLOWUP_COLUMNS,
            EntityType::Tags => TAG_COLUMNS,
        }
    }

    pub fn column_fields(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.field.to_string()).collect()
    }

    pub fn has_column(&self, field: &str) -> bool {
        self.columns().iter().any(|c| c.field == field)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file picked by the user for upload. Held in memory: import sources are
/// spreadsheets, not bulk media.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl UploadFile {
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> DomainResult<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DomainError::File(format!("Path has no file name: {}", path.display())))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DomainError::File(format!("Failed to read {}: {}", path.display(), e)))?;
        Ok(Self { file_name, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lower-cased extension without the dot
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_wire_names() {
        assert_eq!(serde_json::to_string(&EntityType::TimeEntries).unwrap(), "\"time_entries\"");
        assert_eq!(EntityType::from_str("followups"), Some(EntityType::Followups));
        assert_eq!(EntityType::from_str("payroll"), None);
    }

    #[test]
    fn test_column_catalogue_has_unique_fields() {
        for entity in EntityType::ALL {
            let fields = entity.column_fields();
            let mut deduped = fields.clone();
            deduped.sort();
            deduped.dedup();
            assert_eq!(fields.len(), deduped.len(), "duplicate field in {}", entity);
            assert!(!fields.is_empty());
        }
    }

    #[test]
    fn test_upload_extension_is_lowercased() {
        let file = UploadFile::new("Clients.CSV", b"a,b".to_vec());
        assert_eq!(file.extension().as_deref(), Some("csv"));
        assert_eq!(UploadFile::new("noext", vec![]).extension(), None);
    }
}
