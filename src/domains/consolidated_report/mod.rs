pub mod types;
pub mod service;
pub mod panel;

pub use types::*;
pub use service::{ApiConsolidatedReportService, ConsolidatedReportService};
pub use panel::{bar_width, build_comparison_rows, ConsolidatedReportPanel};
