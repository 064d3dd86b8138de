use crate::config::EngineConfig;
use crate::date_parser::{is_total_label, match_label};
use crate::schema::{
    ExternalPeriodDetection, PeriodColumn, PeriodMatchKind, RawGrid,
};
use crate::utils::{contains_term, normalize_text};
use log::{debug, info};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_SCAN_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodDetection {
    pub periods: Vec<PeriodColumn>,
    pub header_row_index: usize,
}

impl PeriodDetection {
    pub fn empty() -> Self {
        Self {
            periods: Vec::new(),
            header_row_index: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Adopts a detection produced by the external analysis step. Its columns
    /// are trusted fully; total columns keep their flag.
    pub fn from_external(external: &ExternalPeriodDetection) -> Self {
        let mut periods: Vec<PeriodColumn> = external
            .period_columns
            .iter()
            .filter(|c| c.column_index > 0)
            .map(|c| {
                let kind = if is_total_label(&c.label) {
                    PeriodMatchKind::Total
                } else {
                    PeriodMatchKind::External
                };
                PeriodColumn {
                    column_index: c.column_index,
                    label: c.label.trim().to_string(),
                    confidence: kind.confidence(),
                    is_manually_selected: false,
                    kind,
                }
            })
            .collect();
        periods.sort_by_key(|p| p.column_index);
        periods.dedup_by_key(|p| p.column_index);

        Self {
            periods,
            header_row_index: external.header_row_index,
        }
    }

    /// Period columns that represent real reporting periods.
    pub fn active_periods(&self) -> impl Iterator<Item = &PeriodColumn> {
        self.periods.iter().filter(|p| !p.is_total())
    }

    /// Periods confident enough to be pre-selected for the reviewer.
    pub fn auto_selected(&self, threshold: u8) -> impl Iterator<Item = &PeriodColumn> {
        self.active_periods()
            .filter(move |p| p.confidence >= threshold)
    }

    /// Periods the reviewer must confirm before they are used.
    pub fn needs_confirmation(&self, threshold: u8) -> impl Iterator<Item = &PeriodColumn> {
        self.active_periods()
            .filter(move |p| p.confidence < threshold)
    }
}

/// Scores one cell against the period patterns. Column 0 never scores.
fn score_cell(column_index: usize, text: &str) -> Option<PeriodMatchKind> {
    if column_index == 0 {
        return None;
    }
    match_label(text).map(|m| m.kind)
}

/// Finds the header row holding period labels within the first
/// `max_rows` rows. The highest aggregate score wins; ties go to the
/// earlier row. A grid without period-like cells yields an empty result.
pub fn detect_periods(grid: &RawGrid, max_rows: Option<usize>) -> PeriodDetection {
    let scan_limit = max_rows.unwrap_or(DEFAULT_MAX_SCAN_ROWS);
    let mut best: Option<(usize, u32, Vec<PeriodColumn>)> = None;

    for (row_index, row) in grid.rows().iter().enumerate().take(scan_limit) {
        let mut columns = Vec::new();
        let mut row_score: u32 = 0;

        for (column_index, cell) in row.iter().enumerate() {
            let Some(text) = cell.as_text() else {
                continue;
            };
            let Some(kind) = score_cell(column_index, &text) else {
                continue;
            };

            let confidence = kind.confidence();
            row_score += u32::from(confidence);
            columns.push(PeriodColumn {
                column_index,
                label: text,
                confidence,
                is_manually_selected: false,
                kind,
            });
        }

        debug!("Row {} period score: {}", row_index, row_score);

        let is_better = match &best {
            Some((_, best_score, _)) => row_score > *best_score,
            None => row_score > 0,
        };
        if is_better {
            best = Some((row_index, row_score, columns));
        }
    }

    match best {
        Some((header_row_index, score, mut periods)) => {
            periods.sort_by_key(|p| p.column_index);
            info!(
                "Detected period header at row {} (score {}, {} columns)",
                header_row_index,
                score,
                periods.len()
            );
            PeriodDetection {
                periods,
                header_row_index,
            }
        }
        None => {
            info!("No period header detected in the first {} rows", scan_limit);
            PeriodDetection::empty()
        }
    }
}

/// Runs [`detect_periods`] with the scan limit from `config`.
pub fn detect_periods_with_config(grid: &RawGrid, config: &EngineConfig) -> PeriodDetection {
    detect_periods(grid, Some(config.max_scan_rows))
}

/// True when `label` names an aggregate column excluded by configuration.
pub fn is_excluded_label(label: &str, config: &EngineConfig) -> bool {
    let text = normalize_text(label);
    is_total_label(&text)
        || config
            .excluded_period_labels
            .iter()
            .map(|l| normalize_text(l))
            .any(|l| !l.is_empty() && contains_term(&text, &l))
}
