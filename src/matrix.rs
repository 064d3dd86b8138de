use crate::classifier::{AccountClassifier, ClassificationContext};
use crate::config::EngineConfig;
use crate::error::{MappingError, Result};
use crate::period_detector::is_excluded_label;
use crate::reconciler::{find_external, reconcile, ReconciledClassification};
use crate::schema::{
    ConceptColumnType, LineItemRecord, LineItemType, MappedPeriodColumn, MatrixMapping, RawGrid,
    StatementType,
};
use crate::utils::{confidence_to_score, contains_term, normalize_text};
use log::{debug, info};
use std::collections::{BTreeMap, HashSet};

const TOTAL_PREFIXES: &[&str] = &["total", "totales"];
const SUBTOTAL_PREFIXES: &[&str] = &["subtotal", "sub-total", "sub total"];
const CALCULATED_TERMS: &[&str] = &[
    "gross profit",
    "gross margin",
    "operating income",
    "operating profit",
    "ebitda",
    "ebit",
    "net income",
    "net profit",
    "net loss",
    "net cash flow",
    "utilidad bruta",
    "utilidad operacional",
    "utilidad operativa",
    "utilidad neta",
    "perdida neta",
    "resultado neto",
    "margen bruto",
    "flujo neto",
];

/// Line item type implied by the account name alone.
pub fn infer_line_item_type(account_name: &str) -> LineItemType {
    let name = normalize_text(account_name);

    if SUBTOTAL_PREFIXES.iter().any(|p| name.starts_with(p)) {
        LineItemType::Subtotal
    } else if TOTAL_PREFIXES.iter().any(|p| name.starts_with(p)) {
        LineItemType::Total
    } else if CALCULATED_TERMS.iter().any(|t| contains_term(&name, t)) {
        LineItemType::Calculated
    } else {
        LineItemType::Detail
    }
}

/// Checks the structural contract of a mapping against its grid.
pub fn validate_mapping(grid: &RawGrid, mapping: &MatrixMapping) -> Result<()> {
    if mapping.concept_columns.is_empty() {
        return Err(MappingError::NoConceptColumns);
    }

    if mapping.period_columns.is_empty() {
        return Err(MappingError::MissingField("period_columns".to_string()));
    }

    let range = mapping.data_range;
    if range.start_row > range.end_row {
        return Err(MappingError::InvalidDataRange {
            start_row: range.start_row,
            end_row: range.end_row,
        });
    }

    if range.end_row >= grid.row_count() {
        return Err(MappingError::DataRangeOutOfBounds {
            start_row: range.start_row,
            end_row: range.end_row,
            row_count: grid.row_count(),
        });
    }

    let width = grid.width();
    let columns = mapping
        .concept_columns
        .iter()
        .map(|c| c.column_index)
        .chain(mapping.period_columns.iter().map(|p| p.column_index));
    for column in columns {
        if column >= width {
            return Err(MappingError::ColumnOutOfBounds { column, width });
        }
    }

    let mut seen = HashSet::new();
    for period in &mapping.period_columns {
        if !seen.insert(period.column_index) {
            return Err(MappingError::DuplicatePeriodColumn(period.column_index));
        }
    }

    // Line items key amounts by label, so two columns sharing one would
    // overwrite each other.
    let mut labels = HashSet::new();
    for period in &mapping.period_columns {
        if !labels.insert(normalize_text(&period.period_label)) {
            return Err(MappingError::DuplicatePeriodLabel(
                period.period_label.clone(),
            ));
        }
    }

    Ok(())
}

/// Period columns that feed data: neither voided by the reviewer nor
/// aggregate (TOTAL/YTD) columns.
pub fn active_period_columns<'a>(
    mapping: &'a MatrixMapping,
    config: &EngineConfig,
) -> Vec<&'a MappedPeriodColumn> {
    mapping
        .period_columns
        .iter()
        .filter(|p| !mapping.is_voided(&p.period_label))
        .filter(|p| !is_excluded_label(&p.period_label, config))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixOutput {
    pub line_items: Vec<LineItemRecord>,
    /// Local and external classification behind each line item, in the same
    /// order as `line_items`.
    pub reconciliations: Vec<ReconciledClassification>,
    pub warnings: Vec<String>,
    pub skipped_rows: Vec<usize>,
}

pub struct MatrixProcessor<'a> {
    config: &'a EngineConfig,
    classifier: &'a AccountClassifier,
}

impl<'a> MatrixProcessor<'a> {
    pub fn new(config: &'a EngineConfig, classifier: &'a AccountClassifier) -> Self {
        Self { config, classifier }
    }

    /// Produces one line item per data row that names an account. Pure: the
    /// same grid and mapping always yield the same records.
    pub fn process(
        &self,
        grid: &RawGrid,
        mapping: &MatrixMapping,
        statement_type: StatementType,
    ) -> Result<MatrixOutput> {
        validate_mapping(grid, mapping)?;

        let periods = active_period_columns(mapping, self.config);
        if periods.is_empty() {
            return Err(MappingError::MissingField(
                "period_columns (all periods are voided or totals)".to_string(),
            ));
        }

        let context = ClassificationContext::new(statement_type);
        let mut output = MatrixOutput::default();
        let mut current_section: Option<String> = None;

        for row_index in mapping.data_range.start_row..=mapping.data_range.end_row {
            let (name, code) = self.extract_concepts(grid, mapping, row_index);
            let Some(account_name) = name.clone().or_else(|| code.clone()) else {
                debug!("Row {}: no account name or code, skipping", row_index);
                output.skipped_rows.push(row_index);
                continue;
            };

            let mut values = BTreeMap::new();
            let mut first_value = None;
            for (position, period) in periods.iter().enumerate() {
                let amount = grid
                    .cell(row_index, period.column_index)
                    .and_then(|cell| cell.as_amount());
                if let Some(amount) = amount {
                    if position == 0 {
                        first_value = Some(amount);
                    }
                    values.insert(period.period_label.clone(), amount);
                }
            }

            if values.is_empty() {
                // Voided and total columns count here: a row with content
                // anywhere in the mapped periods is an account, not a header.
                let has_mapped_content = mapping.period_columns.iter().any(|p| {
                    grid.cell(row_index, p.column_index)
                        .map_or(false, |cell| !cell.is_empty())
                });
                if has_mapped_content {
                    debug!(
                        "Row {} ('{}'): no amounts in active periods, skipping",
                        row_index, account_name
                    );
                } else {
                    debug!("Row {}: section header '{}'", row_index, account_name);
                    current_section = Some(account_name);
                }
                output.skipped_rows.push(row_index);
                continue;
            }

            let local = self
                .classifier
                .classify(&account_name, first_value, &context);
            let reconciled = reconcile(
                local,
                find_external(&account_name, &mapping.account_classifications),
            );
            if let Some(warning) = reconciled.warning() {
                output.warnings.push(warning);
            }

            let line_item_type = reconciled
                .resolved
                .line_item_type
                .unwrap_or_else(|| infer_line_item_type(&account_name));

            let display_order = output.line_items.len() + 1;
            let account_code = code.unwrap_or_else(|| format!("ROW-{:04}", display_order));
            let parent_section = match line_item_type {
                LineItemType::Detail => current_section.clone(),
                _ => None,
            };

            output.line_items.push(LineItemRecord {
                account_code,
                account_name,
                category: reconciled.resolved.category.clone(),
                subcategory: reconciled.resolved.subcategory.clone(),
                is_inflow: reconciled.resolved.is_inflow,
                line_item_type,
                parent_section,
                periods: values,
                display_order,
                confidence_score: confidence_to_score(reconciled.resolved.confidence),
                classification_source: reconciled.source(),
                classification_agreement: reconciled.agrees(),
            });
            output.reconciliations.push(reconciled);

            if line_item_type == LineItemType::Total {
                current_section = None;
            }
        }

        info!(
            "Mapped {} line items across {} periods ({} rows skipped)",
            output.line_items.len(),
            periods.len(),
            output.skipped_rows.len()
        );

        Ok(output)
    }

    fn extract_concepts(
        &self,
        grid: &RawGrid,
        mapping: &MatrixMapping,
        row_index: usize,
    ) -> (Option<String>, Option<String>) {
        let mut name = None;
        let mut code = None;

        for concept in &mapping.concept_columns {
            let text = grid
                .cell(row_index, concept.column_index)
                .and_then(|c| c.as_text());
            let Some(text) = text else {
                continue;
            };
            match concept.column_type {
                ConceptColumnType::AccountName if name.is_none() => name = Some(text),
                ConceptColumnType::AccountCode if code.is_none() => code = Some(text),
                _ => {}
            }
        }

        (name, code)
    }
}

/// Runs the processor with the default configuration and rule tables.
pub fn process_matrix_mapping(
    grid: &RawGrid,
    mapping: &MatrixMapping,
    statement_type: StatementType,
) -> Result<Vec<LineItemRecord>> {
    let config = EngineConfig::default();
    let classifier = AccountClassifier::new(&config);
    let output = MatrixProcessor::new(&config, &classifier).process(grid, mapping, statement_type)?;
    Ok(output.line_items)
}
