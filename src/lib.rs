//! # Financial Statement Mapper
//!
//! A library for turning uploaded spreadsheet grids (profit & loss or cash
//! flow statements, often in Spanish or English) into structured,
//! per-period financial statements.
//!
//! ## Core Concepts
//!
//! - **Period Detection**: Finds the header row and scores each header cell as a period label
//! - **Account Classification**: Keyword rules assign a category and polarity to every account
//! - **Reconciliation**: External (LLM) suggestions win, local results are kept for agreement tracking
//! - **Matrix Mapping**: A confirmed mapping turns grid rows into line items keyed by period
//! - **Statement Building**: Line items fan out into one statement per confirmed period
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_statement_mapper::*;
//!
//! let grid = RawGrid::from_strings(vec![
//!     vec!["Cuenta", "Ene-24", "Feb-24", "Total"],
//!     vec!["Ventas", "1,000", "1,200", "2,200"],
//!     vec!["Sueldos", "(400)", "(400)", "(800)"],
//! ]);
//!
//! let pipeline = MappingPipeline::new(EngineConfig::default())?;
//! let detection = pipeline.detect_periods(&grid);
//! let mapping = pipeline.draft_mapping(&grid, &detection, &[])?;
//!
//! let context = MappingContext::new("acme", StatementType::ProfitLoss);
//! let outcome = pipeline.process(&grid, &mapping, &context)?;
//! assert_eq!(outcome.statements.len(), 2);
//! ```

pub mod chart_of_accounts;
pub mod classifier;
pub mod config;
pub mod date_parser;
pub mod error;
pub mod ingestion;
pub mod matrix;
pub mod overrides;
pub mod period_detector;
pub mod persistence;
pub mod reconciler;
pub mod schema;
pub mod statement_builder;
pub mod utils;

pub use chart_of_accounts::{AccountEntry, ChartOfAccounts};
pub use classifier::{AccountClassifier, ClassificationContext};
pub use config::{EngineConfig, KeywordRule, SignFallback, SignFallbackPolicy};
pub use date_parser::{parse_period_date, parse_period_label, ParsedDate};
pub use error::{MappingError, Result};
pub use ingestion::build_draft_mapping;
pub use matrix::{process_matrix_mapping, MatrixOutput, MatrixProcessor};
pub use overrides::*;
pub use period_detector::{detect_periods, PeriodDetection};
pub use persistence::{persist_statements, PersistenceReport, StatementSink};
pub use reconciler::{reconcile, ReconciledClassification, ReconciliationOutcome};
pub use schema::*;
pub use statement_builder::{BuildOutput, StatementBuilder, StatementPeriod};

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Everything one confirmed upload produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingOutcome {
    /// Line items keyed by every active period, in display order.
    pub line_items: Vec<LineItemRecord>,
    /// Local and external classification behind each line item, in the same
    /// order as `line_items`.
    pub reconciliations: Vec<ReconciledClassification>,
    /// One statement per confirmed period, ascending by start date.
    pub statements: Vec<StatementRecord>,
    /// Soft anomalies from every stage, in the order they were raised.
    pub warnings: Vec<String>,
}

pub struct MappingPipeline {
    config: EngineConfig,
    classifier: AccountClassifier,
}

impl MappingPipeline {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let classifier = AccountClassifier::new(&config);
        Ok(Self { config, classifier })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn detect_periods(&self, grid: &RawGrid) -> PeriodDetection {
        period_detector::detect_periods_with_config(grid, &self.config)
    }

    pub fn draft_mapping(
        &self,
        grid: &RawGrid,
        detection: &PeriodDetection,
        external_classifications: &[ExternalClassification],
    ) -> Result<MatrixMapping> {
        build_draft_mapping(grid, detection, external_classifications, &self.config)
    }

    /// Maps the grid through a confirmed mapping and builds the statements.
    pub fn process(
        &self,
        grid: &RawGrid,
        mapping: &MatrixMapping,
        context: &MappingContext,
    ) -> Result<MappingOutcome> {
        if context.company_id.trim().is_empty() {
            return Err(MappingError::MissingField("company_id".to_string()));
        }

        info!(
            "Processing {} upload for company {}",
            context.statement_type, context.company_id
        );

        let matrix = MatrixProcessor::new(&self.config, &self.classifier).process(
            grid,
            mapping,
            context.statement_type,
        )?;
        let built =
            StatementBuilder::new(&self.config).build(&matrix.line_items, mapping, context)?;

        let mut warnings = matrix.warnings;
        warnings.extend(built.warnings);

        Ok(MappingOutcome {
            line_items: matrix.line_items,
            reconciliations: matrix.reconciliations,
            statements: built.statements,
            warnings,
        })
    }

    /// Like [`MappingPipeline::process`], but reviewer overrides are applied
    /// to the mapping first.
    pub fn process_with_overrides(
        &self,
        grid: &RawGrid,
        mapping: &MatrixMapping,
        overrides: &MappingOverrides,
        context: &MappingContext,
    ) -> Result<MappingOutcome> {
        let mapping = overrides.apply(mapping);
        debug!(
            "Applied {} overrides before processing",
            overrides.modifications.len()
        );
        self.process(grid, &mapping, context)
    }
}

/// Runs the whole flow with default configuration, accepting the detected
/// periods without review.
pub fn process_upload(
    grid: &RawGrid,
    external_classifications: &[ExternalClassification],
    context: &MappingContext,
) -> Result<MappingOutcome> {
    let pipeline = MappingPipeline::new(EngineConfig::default())?;
    let detection = pipeline.detect_periods(grid);
    let mapping = pipeline.draft_mapping(grid, &detection, external_classifications)?;
    pipeline.process(grid, &mapping, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> RawGrid {
        RawGrid::from_strings(vec![
            vec!["Estado de Resultados 2024", "", "", ""],
            vec!["Cuenta", "Ene-24", "Feb-24", "Total"],
            vec!["Ventas", "1,000", "1,200", "2,200"],
            vec!["Costo de Ventas", "(400)", "(450)", "(850)"],
            vec!["Sueldos y Salarios", "200", "200", "400"],
        ])
    }

    #[test]
    fn test_end_to_end_processing() {
        let context = MappingContext::new("acme", StatementType::ProfitLoss);
        let outcome = process_upload(&grid(), &[], &context).unwrap();

        assert_eq!(outcome.line_items.len(), 3);
        assert_eq!(outcome.statements.len(), 2);

        let ventas = &outcome.line_items[0];
        assert_eq!(ventas.category, "revenue");
        assert!(ventas.is_inflow);
        assert!(!ventas.periods.contains_key("Total"));

        let cogs = &outcome.line_items[1];
        assert_eq!(cogs.category, "cogs");
        assert_eq!(cogs.periods.get("Ene-24"), Some(&-400.0));

        let jan = &outcome.statements[0];
        assert_eq!(jan.period.month, Some(1));
        assert_eq!(jan.period.year, 2024);
        assert_eq!(jan.line_items.len(), 3);
    }

    #[test]
    fn test_overrides_flow_through() {
        let pipeline = MappingPipeline::new(EngineConfig::default()).unwrap();
        let grid = grid();
        let detection = pipeline.detect_periods(&grid);
        let mapping = pipeline.draft_mapping(&grid, &detection, &[]).unwrap();

        let overrides = MappingOverrides {
            modifications: vec![
                MappingModification::VoidPeriod {
                    label: "Feb-24".to_string(),
                },
                MappingModification::SetCategory {
                    account_name: "Sueldos y Salarios".to_string(),
                    category: "cogs".to_string(),
                    subcategory: None,
                    is_inflow: None,
                },
            ],
        };
        let context = MappingContext::new("acme", StatementType::ProfitLoss);
        let outcome = pipeline
            .process_with_overrides(&grid, &mapping, &overrides, &context)
            .unwrap();

        assert_eq!(outcome.statements.len(), 1);
        let sueldos = &outcome.line_items[2];
        assert_eq!(sueldos.category, "cogs");
        assert_eq!(sueldos.classification_source, ClassificationSource::External);
        assert!(!sueldos.classification_agreement);
        assert!(!sueldos.periods.contains_key("Feb-24"));
        assert_eq!(outcome.warnings.len(), 1);

        let audit = &outcome.reconciliations[2];
        assert_eq!(audit.local.category, "opex");
        assert_eq!(audit.resolved.category, "cogs");
        assert_eq!(audit.outcome, ReconciliationOutcome::Disagreement);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            auto_select_threshold: 101,
            ..EngineConfig::default()
        };
        assert!(matches!(
            MappingPipeline::new(config),
            Err(MappingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_company_id() {
        let context = MappingContext::new("", StatementType::CashFlow);
        let result = process_upload(&grid(), &[], &context);
        assert!(matches!(result, Err(MappingError::MissingField(_))));
    }
}
