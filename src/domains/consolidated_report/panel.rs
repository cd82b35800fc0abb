use chrono::NaiveDate;
use log::{debug, info};
use std::sync::Arc;

use crate::domains::consolidated_report::service::ConsolidatedReportService;
use crate::domains::consolidated_report::types::{
    Company, CompanyComparison, ComparisonMetric, ComparisonRow, ConsolidatedReport, ConsolidationMethod, Medal,
    PeriodPreset, ReportExportFormat, ReportFilter, ReportType, ReportView,
};
use crate::domains::core::format::{format_money, format_percent};
use crate::errors::{ServiceResult, ValidationError};
use crate::types::Language;
use crate::validation::Validate;

/// Bar length as a percentage of the largest value, clamped to [0, 100].
/// A non-positive maximum draws no bars.
pub fn bar_width(value: f64, max: f64) -> f64 {
    if max.is_nan() || max <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / max * 100.0).clamp(0.0, 100.0)
}

/// Sorts by the server's rank (ties keep server order, unranked rows last)
/// and sizes the bars against the largest value of `metric`.
pub fn build_comparison_rows(
    rows: &[CompanyComparison],
    metric: ComparisonMetric,
    currency: &str,
    language: Language,
) -> Vec<ComparisonRow> {
    let mut ranked: Vec<&CompanyComparison> = rows.iter().collect();
    ranked.sort_by_key(|row| if row.rank == 0 { u32::MAX } else { row.rank });

    let max = rows.iter().map(|row| metric.value(row)).fold(f64::NEG_INFINITY, f64::max);

    ranked
        .into_iter()
        .map(|row| {
            let value_display = match metric {
                ComparisonMetric::Revenue => format_money(row.revenue, currency, language),
                ComparisonMetric::Expenses => format_money(row.expenses, currency, language),
                ComparisonMetric::NetIncome => format_money(row.net_income, currency, language),
                ComparisonMetric::ProfitMargin => format_percent(row.profit_margin),
            };
            let company_name = match (language, &row.company_name_ar) {
                (Language::Ar, Some(name)) => name.clone(),
                _ => row.company_name.clone(),
            };
            ComparisonRow {
                company_id: row.company_id.clone(),
                company_name,
                rank: row.rank,
                medal: Medal::for_rank(row.rank),
                value_display,
                bar_width: bar_width(metric.value(row), max),
            }
        })
        .collect()
}

/// Consolidated report panel: holds the filter axes and the last loaded
/// report. Aggregation happens on the server.
pub struct ConsolidatedReportPanel {
    service: Arc<dyn ConsolidatedReportService>,
    filter: ReportFilter,
    metric: ComparisonMetric,
    language: Language,
    companies: Vec<Company>,
    view: ReportView,
}

impl ConsolidatedReportPanel {
    pub fn new(service: Arc<dyn ConsolidatedReportService>, language: Language) -> Self {
        Self {
            service,
            filter: ReportFilter::default(),
            metric: ComparisonMetric::default(),
            language,
            companies: Vec::new(),
            view: ReportView::NoCompaniesSelected,
        }
    }

    pub fn filter(&self) -> &ReportFilter {
        &self.filter
    }

    pub fn view(&self) -> &ReportView {
        &self.view
    }

    pub fn companies(&self) -> &[Company] {
        &self.companies
    }

    pub async fn load_companies(&mut self) -> ServiceResult<&[Company]> {
        self.companies = self.service.entities().await?;
        debug!("Loaded {} consolidation companies", self.companies.len());
        Ok(&self.companies)
    }

    pub fn set_companies(&mut self, firm_ids: Vec<String>) {
        let mut unique = Vec::with_capacity(firm_ids.len());
        for id in firm_ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        self.filter.firm_ids = unique;
    }

    pub fn toggle_company(&mut self, firm_id: &str) {
        match self.filter.firm_ids.iter().position(|id| id == firm_id) {
            Some(index) => {
                self.filter.firm_ids.remove(index);
            }
            None => self.filter.firm_ids.push(firm_id.to_string()),
        }
    }

    pub fn set_period(&mut self, period: PeriodPreset) {
        self.filter.period = period;
    }

    pub fn set_report_type(&mut self, report_type: ReportType) {
        self.filter.report_type = report_type;
    }

    pub fn set_base_currency(&mut self, currency: &str) {
        self.filter.base_currency = currency.trim().to_uppercase();
    }

    pub fn set_consolidation_method(&mut self, method: ConsolidationMethod) {
        self.filter.consolidation_method = method;
    }

    pub fn set_include_eliminations(&mut self, include: bool) {
        self.filter.include_elimination_entries = include;
    }

    pub fn set_metric(&mut self, metric: ComparisonMetric) {
        self.metric = metric;
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    /// Reloads every section for the current filter. With no companies
    /// selected nothing is requested and the placeholder view is shown.
    /// On failure the previous view is kept.
    pub async fn refresh(&mut self, today: NaiveDate) -> ServiceResult<&ReportView> {
        if !self.filter.has_companies() {
            self.view = ReportView::NoCompaniesSelected;
            return Ok(&self.view);
        }
        self.filter.validate()?;

        let filter = &self.filter;
        let service = &self.service;
        let (summary, profit_loss, balance_sheet, inter_company, comparisons) = tokio::try_join!(
            service.summary(filter, today),
            service.profit_loss(filter, today),
            service.balance_sheet(filter, today),
            service.inter_company_transactions(filter, today),
            service.company_comparisons(filter, today),
        )?;

        info!(
            "Loaded consolidated report for {} companies ({} comparisons)",
            filter.firm_ids.len(),
            comparisons.len()
        );
        self.view = ReportView::Loaded(Box::new(ConsolidatedReport {
            summary,
            profit_loss,
            balance_sheet,
            inter_company,
            comparisons,
        }));
        Ok(&self.view)
    }

    /// Ranked comparison rows for the active metric
    pub fn comparison_rows(&self) -> Vec<ComparisonRow> {
        match &self.view {
            ReportView::Loaded(report) => {
                build_comparison_rows(&report.comparisons, self.metric, &self.filter.base_currency, self.language)
            }
            ReportView::NoCompaniesSelected => Vec::new(),
        }
    }

    /// Halalas in the base currency, for display
    pub fn display_money(&self, halalas: i64) -> String {
        format_money(halalas, &self.filter.base_currency, self.language)
    }

    pub async fn export(&self, today: NaiveDate, format: ReportExportFormat) -> ServiceResult<Vec<u8>> {
        if !self.filter.has_companies() {
            return Err(ValidationError::required("firmIds").into());
        }
        self.service.export_report(&self.filter, today, format).await
    }
}
