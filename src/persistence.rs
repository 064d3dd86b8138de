use crate::error::{MappingError, Result};
use crate::schema::StatementRecord;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Destination for finished statements, typically a database writer owned
/// by the caller.
pub trait StatementSink {
    fn write_statement(&mut self, statement: &StatementRecord) -> Result<()>;
}

impl StatementSink for Vec<StatementRecord> {
    fn write_statement(&mut self, statement: &StatementRecord) -> Result<()> {
        self.push(statement.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceReport {
    /// Labels of periods written successfully, in write order.
    pub succeeded: Vec<String>,
    /// `(period label, error)` for each failed write.
    pub failed: Vec<(String, String)>,
}

impl PersistenceReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Labels that need another attempt.
    pub fn failed_periods(&self) -> Vec<&str> {
        self.failed.iter().map(|(label, _)| label.as_str()).collect()
    }
}

/// Writes statements in ascending period order. A failed period is recorded
/// and the loop moves on; nothing is retried here.
pub fn persist_statements<S: StatementSink + ?Sized>(
    sink: &mut S,
    statements: &[StatementRecord],
) -> PersistenceReport {
    let mut ordered: Vec<&StatementRecord> = statements.iter().collect();
    ordered.sort_by_key(|s| (s.period_start, s.period_end));

    let mut report = PersistenceReport::default();
    for statement in ordered {
        let label = statement.period.label.clone();
        match sink.write_statement(statement) {
            Ok(()) => report.succeeded.push(label),
            Err(e) => {
                let details = match e {
                    MappingError::Persistence { details, .. } => details,
                    other => other.to_string(),
                };
                warn!("Failed to persist period {}: {}", label, details);
                report.failed.push((label, details));
            }
        }
    }

    info!(
        "Persisted {} of {} statements",
        report.succeeded.len(),
        statements.len()
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PeriodDefinition, StatementType};

    fn statement(month: u32) -> StatementRecord {
        let period = PeriodDefinition::month(2025, month);
        let (period_start, period_end) = period.date_range().unwrap();
        StatementRecord {
            company_id: "company-1".to_string(),
            statement_type: StatementType::ProfitLoss,
            period,
            period_start,
            period_end,
            dates_inferred: false,
            currency: "USD".to_string(),
            line_items: vec![],
        }
    }

    struct FlakySink {
        fail_month: u32,
        written: Vec<String>,
    }

    impl StatementSink for FlakySink {
        fn write_statement(&mut self, statement: &StatementRecord) -> Result<()> {
            if statement.period.month == Some(self.fail_month) {
                return Err(MappingError::Persistence {
                    period: statement.period.label.clone(),
                    details: "connection reset".to_string(),
                });
            }
            self.written.push(statement.period.label.clone());
            Ok(())
        }
    }

    #[test]
    fn test_writes_in_ascending_order() {
        let mut sink: Vec<StatementRecord> = Vec::new();
        let report = persist_statements(&mut sink, &[statement(3), statement(1), statement(2)]);

        assert!(report.is_complete());
        assert_eq!(report.succeeded, vec!["Jan 2025", "Feb 2025", "Mar 2025"]);
        assert_eq!(sink[0].period.month, Some(1));
    }

    #[test]
    fn test_failure_does_not_abort_remaining_periods() {
        let mut sink = FlakySink {
            fail_month: 2,
            written: Vec::new(),
        };
        let report = persist_statements(&mut sink, &[statement(1), statement(2), statement(3)]);

        assert!(!report.is_complete());
        assert_eq!(report.failed_periods(), vec!["Feb 2025"]);
        assert_eq!(report.failed[0].1, "connection reset");
        assert_eq!(sink.written, vec!["Jan 2025", "Mar 2025"]);
    }
}
