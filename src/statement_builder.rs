use crate::config::EngineConfig;
use crate::date_parser::{parse_period_label, resolve_period_dates};
use crate::error::{MappingError, Result};
use crate::matrix::active_period_columns;
use crate::schema::{
    LineItemRecord, MappingContext, MatrixMapping, PeriodDefinition, StatementRecord,
};
use crate::utils::{clamp_confidence_score, current_year};
use log::{info, warn};
use std::collections::BTreeMap;

/// One confirmed period: the label used as the `periods` key in line items
/// and its canonical definition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementPeriod {
    pub label: String,
    pub definition: PeriodDefinition,
}

/// Resolves the confirmed periods of a mapping in column order, skipping
/// voided and aggregate columns. Reviewer-supplied definitions win over
/// parsing the label.
pub fn resolve_periods(mapping: &MatrixMapping, config: &EngineConfig) -> Vec<StatementPeriod> {
    active_period_columns(mapping, config)
        .into_iter()
        .map(|column| StatementPeriod {
            label: column.period_label.clone(),
            definition: column
                .definition
                .clone()
                .unwrap_or_else(|| parse_period_label(&column.period_label)),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOutput {
    pub statements: Vec<StatementRecord>,
    pub warnings: Vec<String>,
}

pub struct StatementBuilder<'a> {
    config: &'a EngineConfig,
    fallback_year: i32,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            fallback_year: current_year(),
        }
    }

    /// Year used for labels whose dates cannot be parsed.
    #[must_use]
    pub fn with_fallback_year(mut self, year: i32) -> Self {
        self.fallback_year = year;
        self
    }

    /// Fans the mapped line items out into one statement per confirmed period.
    pub fn build(
        &self,
        line_items: &[LineItemRecord],
        mapping: &MatrixMapping,
        context: &MappingContext,
    ) -> Result<BuildOutput> {
        let periods = resolve_periods(mapping, self.config);
        self.build_for_periods(line_items, &periods, context)
    }

    /// Builds statements for an explicit period list. Every period yields a
    /// statement, even one with no line items. Statements come back in
    /// ascending period order.
    pub fn build_for_periods(
        &self,
        line_items: &[LineItemRecord],
        periods: &[StatementPeriod],
        context: &MappingContext,
    ) -> Result<BuildOutput> {
        if context.company_id.trim().is_empty() {
            return Err(MappingError::MissingField("company_id".to_string()));
        }
        if periods.is_empty() {
            return Err(MappingError::MissingField("periods".to_string()));
        }

        let currency = context
            .currency
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.config.default_currency.clone());

        let mut output = BuildOutput::default();
        let mut claimed_ranges = BTreeMap::new();
        for period in periods {
            let (period_start, period_end, dates_inferred) =
                resolve_period_dates(&period.definition, self.fallback_year);
            if dates_inferred {
                let message = format!(
                    "Period '{}' has no recognizable date; using calendar year {} bounds",
                    period.label, self.fallback_year
                );
                warn!("{}", message);
                output.warnings.push(message);
            }

            // Statements are stored by date range, so two periods landing on
            // the same range would overwrite each other downstream.
            if let Some(first) = claimed_ranges.get(&(period_start, period_end)) {
                let message = format!(
                    "Periods '{}' and '{}' resolve to the same dates ({} to {})",
                    first, period.label, period_start, period_end
                );
                warn!("{}", message);
                output.warnings.push(message);
            } else {
                claimed_ranges.insert((period_start, period_end), period.label.as_str());
            }

            let statement_items: Vec<LineItemRecord> = line_items
                .iter()
                .filter_map(|item| narrow_to_period(item, &period.label))
                .collect();

            if statement_items.is_empty() {
                let message = format!("Period '{}' has no line items", period.label);
                warn!("{}", message);
                output.warnings.push(message);
            }

            output.statements.push(StatementRecord {
                company_id: context.company_id.clone(),
                statement_type: context.statement_type,
                period: period.definition.clone(),
                period_start,
                period_end,
                dates_inferred,
                currency: currency.clone(),
                line_items: statement_items,
            });
        }

        output.statements.sort_by_key(|s| s.period_start);

        info!(
            "Built {} {} statements from {} line items",
            output.statements.len(),
            context.statement_type,
            line_items.len()
        );

        Ok(output)
    }
}

/// Copy of `item` carrying only `label`'s amount, or `None` when the item
/// has no amount for that period. Confidence is clamped for storage.
fn narrow_to_period(item: &LineItemRecord, label: &str) -> Option<LineItemRecord> {
    let amount = *item.periods.get(label)?;
    let mut periods = BTreeMap::new();
    periods.insert(label.to_string(), amount);

    Some(LineItemRecord {
        periods,
        confidence_score: clamp_confidence_score(item.confidence_score),
        ..item.clone()
    })
}
