use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::validation::{Validate, ValidationBuilder};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsolidationMethod {
    #[default]
    Full,
    Proportional,
}

impl ConsolidationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsolidationMethod::Full => "full",
            ConsolidationMethod::Proportional => "proportional",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    #[default]
    Summary,
    ProfitLoss,
    BalanceSheet,
    InterCompany,
    Comparison,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Summary => "summary",
            ReportType::ProfitLoss => "profit_loss",
            ReportType::BalanceSheet => "balance_sheet",
            ReportType::InterCompany => "inter_company",
            ReportType::Comparison => "comparison",
        }
    }
}

/// Formats the current report can be exported as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportExportFormat {
    Csv,
    Xlsx,
    Pdf,
}

impl ReportExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportExportFormat::Csv => "csv",
            ReportExportFormat::Xlsx => "xlsx",
            ReportExportFormat::Pdf => "pdf",
        }
    }
}

/// Reporting period: a preset relative to today, or explicit dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "preset")]
pub enum PeriodPreset {
    #[default]
    ThisMonth,
    LastMonth,
    ThisQuarter,
    ThisYear,
    LastYear,
    Custom {
        start: NaiveDate,
        end: NaiveDate,
    },
}

fn first_of_month(year: i32, month: u32) -> DomainResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| DomainError::Internal(format!("invalid month {}-{}", year, month)))
}

/// Last day of `year-month`
fn last_of_month(year: i32, month: u32) -> DomainResult<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    first_of_month(next_year, next_month)?
        .pred_opt()
        .ok_or_else(|| DomainError::Internal(format!("no day before {}-{}", next_year, next_month)))
}

impl PeriodPreset {
    /// Inclusive date range the preset covers on `today`
    pub fn resolve(&self, today: NaiveDate) -> DomainResult<(NaiveDate, NaiveDate)> {
        let (year, month) = (today.year(), today.month());
        match *self {
            PeriodPreset::ThisMonth => Ok((first_of_month(year, month)?, last_of_month(year, month)?)),
            PeriodPreset::LastMonth => {
                let (y, m) = if month == 1 { (year - 1, 12) } else { (year, month - 1) };
                Ok((first_of_month(y, m)?, last_of_month(y, m)?))
            }
            PeriodPreset::ThisQuarter => {
                let first = (month - 1) / 3 * 3 + 1;
                Ok((first_of_month(year, first)?, last_of_month(year, first + 2)?))
            }
            PeriodPreset::ThisYear => Ok((first_of_month(year, 1)?, last_of_month(year, 12)?)),
            PeriodPreset::LastYear => Ok((first_of_month(year - 1, 1)?, last_of_month(year - 1, 12)?)),
            PeriodPreset::Custom { start, end } => {
                ValidationBuilder::new("endDate", Some(end)).not_before(start).validate()?;
                Ok((start, end))
            }
        }
    }
}

/// Filter sent to every consolidated-report endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    pub firm_ids: Vec<String>,
    pub period: PeriodPreset,
    pub report_type: ReportType,
    pub include_elimination_entries: bool,
    pub base_currency: String,
    pub consolidation_method: ConsolidationMethod,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            firm_ids: Vec::new(),
            period: PeriodPreset::default(),
            report_type: ReportType::default(),
            include_elimination_entries: true,
            base_currency: "SAR".to_string(),
            consolidation_method: ConsolidationMethod::default(),
        }
    }
}

impl Validate for ReportFilter {
    fn validate(&self) -> DomainResult<()> {
        if self.firm_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ValidationError::invalid_value("firmIds", "must not contain blank ids").into());
        }
        ValidationBuilder::new("baseCurrency", Some(self.base_currency.clone()))
            .required()
            .currency_code()
            .validate()
    }
}

impl ReportFilter {
    pub fn has_companies(&self) -> bool {
        !self.firm_ids.is_empty()
    }

    /// Query parameters with the period resolved against `today`
    pub fn to_query(&self, today: NaiveDate) -> DomainResult<Vec<(&'static str, String)>> {
        self.validate()?;
        let (start, end) = self.period.resolve(today)?;
        Ok(vec![
            ("firmIds", self.firm_ids.join(",")),
            ("startDate", start.format(DATE_FORMAT).to_string()),
            ("endDate", end.format(DATE_FORMAT).to_string()),
            ("reportType", self.report_type.as_str().to_string()),
            ("includeEliminationEntries", self.include_elimination_entries.to_string()),
            ("baseCurrency", self.base_currency.clone()),
            ("consolidationMethod", self.consolidation_method.as_str().to_string()),
        ])
    }
}

/// A company that can take part in consolidation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub name_ar: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Ownership percentage
    #[serde(default)]
    pub ownership: Option<f64>,
}

// Money fields below are integer halalas.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsolidatedSummary {
    pub total_revenue: i64,
    pub total_expenses: i64,
    pub net_income: i64,
    pub total_assets: i64,
    pub total_liabilities: i64,
    pub total_equity: i64,
    pub elimination_amount: i64,
    pub inter_company_count: u64,
    pub company_count: u32,
    pub profit_margin: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineItem {
    pub account_code: Option<String>,
    pub name: String,
    pub name_ar: Option<String>,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportSection {
    pub items: Vec<LineItem>,
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfitLossReport {
    pub revenue: ReportSection,
    pub cost_of_sales: ReportSection,
    pub gross_profit: i64,
    pub operating_expenses: ReportSection,
    pub operating_income: i64,
    pub other_income: ReportSection,
    pub other_expenses: ReportSection,
    /// Inter-company amounts removed from the totals
    pub eliminations: i64,
    pub net_income: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BalanceSheetGroup {
    pub current: ReportSection,
    pub non_current: ReportSection,
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BalanceSheetReport {
    pub assets: BalanceSheetGroup,
    pub liabilities: BalanceSheetGroup,
    pub equity: ReportSection,
}

impl BalanceSheetReport {
    /// Assets equal liabilities plus equity
    pub fn is_balanced(&self) -> bool {
        self.assets.total == self.liabilities.total + self.equity.total
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterCompanyTransaction {
    #[serde(alias = "_id")]
    pub id: String,
    pub source_company_id: String,
    pub source_company_name: String,
    pub target_company_id: String,
    pub target_company_name: String,
    pub transaction_type: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub amount: i64,
    pub eliminated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterCompanyReport {
    pub transactions: Vec<InterCompanyTransaction>,
    pub total_amount: i64,
    pub eliminated_amount: i64,
}

impl InterCompanyReport {
    /// Amount still to be eliminated
    pub fn outstanding_amount(&self) -> i64 {
        self.total_amount - self.eliminated_amount
    }
}

/// One company's figures, ranked by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyComparison {
    pub company_id: String,
    pub company_name: String,
    pub company_name_ar: Option<String>,
    pub revenue: i64,
    pub expenses: i64,
    pub net_income: i64,
    /// Percent, pre-computed
    pub profit_margin: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMetric {
    #[default]
    Revenue,
    Expenses,
    NetIncome,
    ProfitMargin,
}

impl ComparisonMetric {
    pub fn value(&self, row: &CompanyComparison) -> f64 {
        match self {
            ComparisonMetric::Revenue => row.revenue as f64,
            ComparisonMetric::Expenses => row.expenses as f64,
            ComparisonMetric::NetIncome => row.net_income as f64,
            ComparisonMetric::ProfitMargin => row.profit_margin,
        }
    }

    pub fn is_money(&self) -> bool {
        !matches!(self, ComparisonMetric::ProfitMargin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
}

impl Medal {
    pub fn for_rank(rank: u32) -> Option<Self> {
        match rank {
            1 => Some(Medal::Gold),
            2 => Some(Medal::Silver),
            3 => Some(Medal::Bronze),
            _ => None,
        }
    }
}

/// Comparison table row ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub company_id: String,
    pub company_name: String,
    pub rank: u32,
    pub medal: Option<Medal>,
    pub value_display: String,
    /// Percent of the largest value, 0-100
    pub bar_width: f64,
}

/// Every section of the consolidated report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidatedReport {
    pub summary: ConsolidatedSummary,
    pub profit_loss: ProfitLossReport,
    pub balance_sheet: BalanceSheetReport,
    pub inter_company: InterCompanyReport,
    pub comparisons: Vec<CompanyComparison>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportView {
    /// Placeholder; no request was made
    NoCompaniesSelected,
    Loaded(Box<ConsolidatedReport>),
}
