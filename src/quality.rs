use crate::parsing::{parse_amount, parse_date, AmountParse};
use crate::schema::{QualityMetrics, RecordSet, AMOUNT_COLUMN, DATE_COLUMN};

/// How many raw invalid amounts are kept as examples for the run log.
pub const INVALID_SAMPLE_LIMIT: usize = 10;

/// Quality counters plus a few offending raw amounts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QualityAudit {
    pub metrics: QualityMetrics,
    pub invalid_amount_samples: Vec<String>,
}

/// Computes the data quality counters on a reconciled, not yet cleaned set.
///
/// A missing `date` or `montant` column leaves the matching counters at zero.
pub fn audit_quality(records: &RecordSet) -> QualityAudit {
    let mut audit = QualityAudit::default();

    if records.has_column(DATE_COLUMN) {
        audit.metrics.invalid_dates = records
            .column_values(DATE_COLUMN)
            .filter(|cell| parse_date(cell).is_none())
            .count();
    }

    for cell in records.column_values(AMOUNT_COLUMN) {
        match parse_amount(cell) {
            AmountParse::Valid(_) => {}
            AmountParse::Empty => audit.metrics.empty_amounts += 1,
            AmountParse::Invalid => {
                audit.metrics.invalid_amounts += 1;
                if audit.invalid_amount_samples.len() < INVALID_SAMPLE_LIMIT {
                    audit.invalid_amount_samples.push(cell.to_text());
                }
            }
        }
    }

    audit
}

/// Shorthand for [`audit_quality`] when only the counters matter.
pub fn compute_quality_metrics(records: &RecordSet) -> QualityMetrics {
    audit_quality(records).metrics
}
