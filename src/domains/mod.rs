pub mod core;
pub mod data_export;
pub mod consolidated_report;

pub use data_export::{DataExportService, ExportDialog, ImportDialog, JobHistory};
pub use consolidated_report::{ConsolidatedReportPanel, ConsolidatedReportService};
