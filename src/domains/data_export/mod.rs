pub mod types;
pub mod service;
pub mod poller;
pub mod export_dialog;
pub mod import_dialog;
pub mod history;

pub use types::*;
pub use service::{ApiDataExportService, DataExportService};
pub use poller::{PollControl, PollSnapshot, StatusPoller};
pub use export_dialog::{ColumnOption, ExportDialog, ExportState};
pub use import_dialog::{ImportDialog, ImportState, MappingRow};
pub use history::{ExportHistoryRow, ImportHistoryRow, JobHistory};
