use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::utils::{normalize_text, parse_amount};

/// A single spreadsheet cell as delivered by the reading collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }

    /// Text form of the cell. Integral numbers render without a fraction so
    /// that a year typed as a number (2025) reads as "2025".
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Self::Number(n) => Some(n.to_string()),
        }
    }

    /// Numeric amount held by the cell, parsing text cells leniently.
    pub fn as_amount(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Number(_) | Self::Empty => None,
            Self::Text(s) => parse_amount(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(value.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

/// Rows of cells exactly as read from one sheet. Rows may be ragged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(transparent)]
pub struct RawGrid {
    rows: Vec<Vec<CellValue>>,
}

impl RawGrid {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    /// Builds a grid from plain strings; numeric-looking strings stay text and
    /// are parsed on demand.
    pub fn from_strings<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|s| CellValue::from(s.as_ref())).collect())
                .collect(),
        }
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Which pattern produced a period column match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PeriodMatchKind {
    MonthYear,
    MonthSlashYear,
    QuarterYear,
    MonthOnly,
    YearOnly,
    Total,
    External,
}

impl PeriodMatchKind {
    pub fn confidence(self) -> u8 {
        match self {
            Self::MonthYear => 95,
            Self::MonthSlashYear | Self::QuarterYear => 90,
            Self::MonthOnly => 70,
            Self::YearOnly => 60,
            Self::Total => 50,
            Self::External => 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodColumn {
    pub column_index: usize,
    pub label: String,
    #[schemars(description = "Heuristic score from 0 to 100; not a probability")]
    pub confidence: u8,
    #[serde(default)]
    pub is_manually_selected: bool,
    pub kind: PeriodMatchKind,
}

impl PeriodColumn {
    /// Totals and YTD columns are flagged but never treated as reporting periods.
    pub fn is_total(&self) -> bool {
        self.kind == PeriodMatchKind::Total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Month,
    Quarter,
    Year,
    Custom,
}

/// Canonical, locale-independent description of one reporting period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodDefinition {
    pub period_type: PeriodType,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarter: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_value: Option<String>,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    #[schemars(description = "Profit and loss / income statement")]
    ProfitLoss,
    #[schemars(description = "Cash flow statement")]
    CashFlow,
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProfitLoss => write!(f, "profit_loss"),
            Self::CashFlow => write!(f, "cash_flow"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Local,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum LineItemType {
    #[default]
    Detail,
    Subtotal,
    Total,
    Calculated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AccountClassification {
    pub account_name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub confidence: u8,
    pub is_inflow: bool,
    pub source: ClassificationSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Hierarchy flag supplied by the external analysis or a reviewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_item_type: Option<LineItemType>,
}

impl AccountClassification {
    pub fn matches_account(&self, account_name: &str) -> bool {
        normalize_text(&self.account_name) == normalize_text(account_name)
    }
}

/// Classification emitted by the external analysis service for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExternalClassification {
    #[schemars(description = "Account name exactly as it appears in the spreadsheet")]
    pub account_name: String,

    #[schemars(
        description = "Category such as revenue, cogs, opex, taxes, other_income, other_expenses for profit and loss, or operating_inflows, operating_outflows, financing, investing for cash flow"
    )]
    pub suggested_category: String,

    #[serde(default)]
    #[schemars(description = "Optional finer-grained grouping, e.g. payroll or rent")]
    pub suggested_subcategory: Option<String>,

    #[serde(default)]
    #[schemars(
        description = "True if the account brings money in. When omitted it is derived from the category."
    )]
    pub is_inflow: Option<bool>,

    #[schemars(description = "Confidence from 0 to 100")]
    pub confidence: f64,

    #[serde(default)]
    #[schemars(description = "Short explanation of the decision")]
    pub reasoning: Option<String>,

    #[serde(default)]
    #[schemars(
        description = "Set when the row is a subtotal, total or calculated figure rather than a detail account"
    )]
    pub line_item_type: Option<LineItemType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ExternalClassificationBatch {
    pub classifications: Vec<ExternalClassification>,
}

impl ExternalClassificationBatch {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ExternalClassificationBatch)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExternalPeriodColumn {
    pub column_index: usize,
    pub label: String,
}

/// Period header detection performed by the external analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExternalPeriodDetection {
    #[schemars(description = "Columns holding reporting periods, excluding the account column")]
    pub period_columns: Vec<ExternalPeriodColumn>,
    #[schemars(description = "Zero-based index of the row holding the period labels")]
    pub header_row_index: usize,
}

impl ExternalPeriodDetection {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ExternalPeriodDetection)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConceptColumnType {
    AccountName,
    AccountCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConceptColumn {
    pub column_index: usize,
    pub column_type: ConceptColumnType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MappedPeriodColumn {
    pub column_index: usize,
    pub period_label: String,
    /// Reviewer-confirmed definition; parsed from the label when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<PeriodDefinition>,
}

/// Inclusive row range holding account data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DataRange {
    pub start_row: usize,
    pub end_row: usize,
}

/// A reviewed recipe for turning a region of a [`RawGrid`] into line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatrixMapping {
    pub concept_columns: Vec<ConceptColumn>,
    pub period_columns: Vec<MappedPeriodColumn>,
    pub data_range: DataRange,
    #[serde(default)]
    pub account_classifications: Vec<AccountClassification>,
    /// Period labels the reviewer excluded. They never reach the output.
    #[serde(default)]
    pub voided_periods: Vec<String>,
}

impl MatrixMapping {
    pub fn is_voided(&self, label: &str) -> bool {
        let needle = normalize_text(label);
        self.voided_periods
            .iter()
            .any(|v| normalize_text(v) == needle)
    }

    pub fn find_classification(&self, account_name: &str) -> Option<&AccountClassification> {
        self.account_classifications
            .iter()
            .find(|c| c.matches_account(account_name))
    }
}

/// Caller-supplied identity of the statement being imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MappingContext {
    pub company_id: String,
    pub statement_type: StatementType,
    #[serde(default)]
    pub currency: Option<String>,
}

impl MappingContext {
    pub fn new(company_id: impl Into<String>, statement_type: StatementType) -> Self {
        Self {
            company_id: company_id.into(),
            statement_type,
            currency: None,
        }
    }

    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineItemRecord {
    pub account_code: String,
    pub account_name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub is_inflow: bool,
    pub line_item_type: LineItemType,
    /// Name of the section header row this account sits under, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_section: Option<String>,
    pub periods: BTreeMap<String, f64>,
    pub display_order: usize,
    #[schemars(description = "Confidence from 0.0 to 0.99")]
    pub confidence_score: f64,
    pub classification_source: ClassificationSource,
    /// False when the local heuristics disagreed with the external category.
    pub classification_agreement: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatementRecord {
    pub company_id: String,
    pub statement_type: StatementType,
    pub period: PeriodDefinition,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Set when the period label could not be parsed and the dates fell back
    /// to calendar-year bounds.
    pub dates_inferred: bool,
    pub currency: String,
    pub line_items: Vec<LineItemRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_classification_schema_generation() {
        let schema_json = ExternalClassificationBatch::schema_as_json().unwrap();
        assert!(schema_json.contains("account_name"));
        assert!(schema_json.contains("suggested_category"));
        assert!(schema_json.contains("line_item_type"));
    }

    #[test]
    fn test_period_detection_schema_generation() {
        let schema_json = ExternalPeriodDetection::schema_as_json().unwrap();
        assert!(schema_json.contains("header_row_index"));
        assert!(schema_json.contains("period_columns"));
    }

    #[test]
    fn test_grid_deserializes_mixed_cells() {
        let grid: RawGrid =
            serde_json::from_str(r#"[["Account", "Jan-25", null], ["Ventas", 1200.5, "300"]]"#)
                .unwrap();

        assert_eq!(grid.row_count(), 2);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.cell(0, 2), Some(&CellValue::Empty));
        assert_eq!(grid.cell(1, 1).and_then(CellValue::as_amount), Some(1200.5));
        assert_eq!(grid.cell(1, 2).and_then(CellValue::as_amount), Some(300.0));
    }

    #[test]
    fn test_cell_text_rendering() {
        assert_eq!(CellValue::Number(2025.0).as_text().as_deref(), Some("2025"));
        assert_eq!(CellValue::Number(1.5).as_text().as_deref(), Some("1.5"));
        assert_eq!(CellValue::from("   ").as_text(), None);
        assert!(CellValue::Text("  ".to_string()).is_empty());
    }

    #[test]
    fn test_external_classification_defaults() {
        let parsed: ExternalClassification = serde_json::from_str(
            r#"{"account_name": "Ventas", "suggested_category": "revenue", "confidence": 88}"#,
        )
        .unwrap();

        assert_eq!(parsed.is_inflow, None);
        assert_eq!(parsed.line_item_type, None);
        assert_eq!(parsed.confidence, 88.0);
    }

    #[test]
    fn test_mapping_voided_period_lookup_is_normalized() {
        let mapping = MatrixMapping {
            concept_columns: vec![ConceptColumn {
                column_index: 0,
                column_type: ConceptColumnType::AccountName,
            }],
            period_columns: vec![],
            data_range: DataRange {
                start_row: 1,
                end_row: 1,
            },
            account_classifications: vec![],
            voided_periods: vec!["Feb-25".to_string()],
        };

        assert!(mapping.is_voided("FEB-25"));
        assert!(!mapping.is_voided("Mar-25"));
    }
}
