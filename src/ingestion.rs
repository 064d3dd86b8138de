use crate::config::EngineConfig;
use crate::error::{MappingError, Result};
use crate::period_detector::{is_excluded_label, PeriodDetection};
use crate::reconciler::external_to_classification;
use crate::schema::{
    ConceptColumn, ConceptColumnType, DataRange, ExternalClassification, MappedPeriodColumn,
    MatrixMapping, RawGrid,
};
use log::{debug, info};

/// Builds the draft mapping shown to the reviewer: column 0 holds account
/// names, every auto-selected period becomes a period column and the data
/// range spans the rows below the header.
pub fn build_draft_mapping(
    grid: &RawGrid,
    detection: &PeriodDetection,
    external_classifications: &[ExternalClassification],
    config: &EngineConfig,
) -> Result<MatrixMapping> {
    let period_columns: Vec<MappedPeriodColumn> = detection
        .auto_selected(config.auto_select_threshold)
        .filter(|p| !is_excluded_label(&p.label, config))
        .map(|p| MappedPeriodColumn {
            column_index: p.column_index,
            period_label: p.label.clone(),
            definition: None,
        })
        .collect();

    if period_columns.is_empty() {
        return Err(MappingError::MissingField(
            "period_columns (no period reached the auto-selection threshold)".to_string(),
        ));
    }

    let start_row = detection.header_row_index + 1;
    let end_row = last_non_empty_row(grid).unwrap_or(0);
    if start_row > end_row {
        return Err(MappingError::InvalidDataRange { start_row, end_row });
    }

    let account_classifications = external_classifications
        .iter()
        .map(external_to_classification)
        .collect::<Vec<_>>();

    debug!(
        "Draft mapping uses {} of {} detected period columns",
        period_columns.len(),
        detection.periods.len()
    );
    info!(
        "Drafted mapping: rows {}..={}, {} periods, {} external classifications",
        start_row,
        end_row,
        period_columns.len(),
        account_classifications.len()
    );

    Ok(MatrixMapping {
        concept_columns: vec![ConceptColumn {
            column_index: 0,
            column_type: ConceptColumnType::AccountName,
        }],
        period_columns,
        data_range: DataRange { start_row, end_row },
        account_classifications,
        voided_periods: Vec::new(),
    })
}

fn last_non_empty_row(grid: &RawGrid) -> Option<usize> {
    grid.rows()
        .iter()
        .rposition(|row| row.iter().any(|cell| !cell.is_empty()))
}
