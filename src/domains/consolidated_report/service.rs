use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;

use crate::domains::consolidated_report::types::{
    BalanceSheetReport, Company, CompanyComparison, ConsolidatedSummary, InterCompanyReport, ProfitLossReport,
    ReportExportFormat, ReportFilter,
};
use crate::domains::core::api_client::ApiClient;
use crate::errors::ServiceResult;

/// Trait for the consolidated-report endpoints. Every call takes the panel
/// filter and the date its period presets are resolved against.
#[async_trait]
pub trait ConsolidatedReportService: Send + Sync {
    async fn summary(&self, filter: &ReportFilter, today: NaiveDate) -> ServiceResult<ConsolidatedSummary>;

    async fn profit_loss(&self, filter: &ReportFilter, today: NaiveDate) -> ServiceResult<ProfitLossReport>;

    async fn balance_sheet(&self, filter: &ReportFilter, today: NaiveDate) -> ServiceResult<BalanceSheetReport>;

    async fn inter_company_transactions(&self, filter: &ReportFilter, today: NaiveDate) -> ServiceResult<InterCompanyReport>;

    /// Per-company figures, ranked server-side
    async fn company_comparisons(&self, filter: &ReportFilter, today: NaiveDate) -> ServiceResult<Vec<CompanyComparison>>;

    /// Companies available for the multi-select
    async fn entities(&self) -> ServiceResult<Vec<Company>>;

    /// The current report as a file
    async fn export_report(
        &self,
        filter: &ReportFilter,
        today: NaiveDate,
        format: ReportExportFormat,
    ) -> ServiceResult<Vec<u8>>;
}

pub struct ApiConsolidatedReportService {
    client: ApiClient,
}

impl ApiConsolidatedReportService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, section: &str, filter: &ReportFilter, today: NaiveDate) -> ServiceResult<T> {
        let query = filter.to_query(today)?;
        debug!("Loading consolidated {} for {} companies", section, filter.firm_ids.len());
        self.client.get_json(&format!("consolidated-reports/{}", section), &query).await
    }
}

#[async_trait]
impl ConsolidatedReportService for ApiConsolidatedReportService {
    async fn summary(&self, filter: &ReportFilter, today: NaiveDate) -> ServiceResult<ConsolidatedSummary> {
        self.fetch("summary", filter, today).await
    }

    async fn profit_loss(&self, filter: &ReportFilter, today: NaiveDate) -> ServiceResult<ProfitLossReport> {
        self.fetch("profit-loss", filter, today).await
    }

    async fn balance_sheet(&self, filter: &ReportFilter, today: NaiveDate) -> ServiceResult<BalanceSheetReport> {
        self.fetch("balance-sheet", filter, today).await
    }

    async fn inter_company_transactions(&self, filter: &ReportFilter, today: NaiveDate) -> ServiceResult<InterCompanyReport> {
        self.fetch("inter-company-transactions", filter, today).await
    }

    async fn company_comparisons(&self, filter: &ReportFilter, today: NaiveDate) -> ServiceResult<Vec<CompanyComparison>> {
        self.fetch("company-comparisons", filter, today).await
    }

    async fn entities(&self) -> ServiceResult<Vec<Company>> {
        self.client.get_json("consolidated-reports/entities", &[]).await
    }

    async fn export_report(
        &self,
        filter: &ReportFilter,
        today: NaiveDate,
        format: ReportExportFormat,
    ) -> ServiceResult<Vec<u8>> {
        let mut query = filter.to_query(today)?;
        query.push(("format", format.as_str().to_string()));
        self.client.get_bytes("consolidated-reports/export", &query).await
    }
}

/// Mock implementation for testing
#[cfg(test)]
#[derive(Default)]
pub struct MockConsolidatedReportService {
    pub report: std::sync::Mutex<crate::domains::consolidated_report::types::ConsolidatedReport>,
    pub companies: std::sync::Mutex<Vec<Company>>,
    /// When set, `profit_loss` fails with this error
    pub profit_loss_error: std::sync::Mutex<Option<crate::errors::ServiceError>>,
    pub calls: std::sync::atomic::AtomicUsize,
    pub filters: std::sync::Mutex<Vec<ReportFilter>>,
}

#[cfg(test)]
impl MockConsolidatedReportService {
    fn record(&self, filter: &ReportFilter) {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.filters.lock().unwrap().push(filter.clone());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl ConsolidatedReportService for MockConsolidatedReportService {
    async fn summary(&self, filter: &ReportFilter, _today: NaiveDate) -> ServiceResult<ConsolidatedSummary> {
        self.record(filter);
        Ok(self.report.lock().unwrap().summary.clone())
    }

    async fn profit_loss(&self, filter: &ReportFilter, _today: NaiveDate) -> ServiceResult<ProfitLossReport> {
        self.record(filter);
        if let Some(err) = self.profit_loss_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.report.lock().unwrap().profit_loss.clone())
    }

    async fn balance_sheet(&self, filter: &ReportFilter, _today: NaiveDate) -> ServiceResult<BalanceSheetReport> {
        self.record(filter);
        Ok(self.report.lock().unwrap().balance_sheet.clone())
    }

    async fn inter_company_transactions(&self, filter: &ReportFilter, _today: NaiveDate) -> ServiceResult<InterCompanyReport> {
        self.record(filter);
        Ok(self.report.lock().unwrap().inter_company.clone())
    }

    async fn company_comparisons(&self, filter: &ReportFilter, _today: NaiveDate) -> ServiceResult<Vec<CompanyComparison>> {
        self.record(filter);
        Ok(self.report.lock().unwrap().comparisons.clone())
    }

    async fn entities(&self) -> ServiceResult<Vec<Company>> {
        Ok(self.companies.lock().unwrap().clone())
    }

    async fn export_report(
        &self,
        filter: &ReportFilter,
        _today: NaiveDate,
        format: ReportExportFormat,
    ) -> ServiceResult<Vec<u8>> {
        self.record(filter);
        Ok(format!("report:{}", format.as_str()).into_bytes())
    }
}
