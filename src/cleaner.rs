use crate::error::{Result, SalesReportError};
use crate::parsing::{month_key, parse_amount, parse_date, title_case, AmountParse};
use crate::quality::INVALID_SAMPLE_LIMIT;
use crate::reconcile::{duplicate_columns, reconcile_columns};
use crate::run_log::RunLog;
use crate::schema::{
    CellValue, CleanedDataset, RecordSet, SalesRecord, AGENT_COLUMN, AMOUNT_COLUMN, DATE_COLUMN,
};
use serde::{Deserialize, Serialize};

/// Row accounting for one cleaning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CleaningStats {
    pub rows_before: usize,
    pub blank_rows_dropped: usize,
    pub invalid_date_rows_dropped: usize,
    pub rows_after: usize,
    pub empty_amounts: usize,
    pub invalid_amounts: usize,
}

impl CleaningStats {
    pub fn rows_dropped(&self) -> usize {
        self.rows_before - self.rows_after
    }

    /// Amounts kept as absent, whatever the reason.
    pub fn absent_amounts(&self) -> usize {
        self.empty_amounts + self.invalid_amounts
    }
}

#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub dataset: CleanedDataset,
    pub stats: CleaningStats,
}

/// Fails with the names of the required columns that are missing.
pub fn check_required_columns(records: &RecordSet) -> Result<()> {
    let missing: Vec<String> = [DATE_COLUMN, AMOUNT_COLUMN]
        .iter()
        .filter(|c| !records.has_column(c))
        .map(|c| c.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SalesReportError::MissingColumns(missing))
    }
}

/// Turns a reconciled record set into typed sales records.
///
/// Fully blank rows and rows whose date does not parse are removed. A bad
/// amount only becomes `None`. Agent names are trimmed and title-cased, and
/// every other column is carried through untouched.
pub fn clean_records(records: &RecordSet, log: &mut RunLog) -> Result<CleaningOutcome> {
    let duplicates = duplicate_columns(records);
    if !duplicates.is_empty() {
        log.warn(format!(
            "Colonnes dupliquées après normalisation: {:?} (fusion des valeurs)",
            duplicates
        ));
    }
    let records = reconcile_columns(records);

    check_required_columns(&records)?;

    let date_idx = records.column_index(DATE_COLUMN);
    let amount_idx = records.column_index(AMOUNT_COLUMN);
    let (Some(date_idx), Some(amount_idx)) = (date_idx, amount_idx) else {
        return Err(SalesReportError::MissingColumns(vec![
            DATE_COLUMN.to_string(),
            AMOUNT_COLUMN.to_string(),
        ]));
    };
    let agent_idx = records.column_index(AGENT_COLUMN);

    let extra_idx: Vec<usize> = (0..records.columns().len())
        .filter(|i| *i != date_idx && *i != amount_idx && Some(*i) != agent_idx)
        .collect();

    let mut stats = CleaningStats {
        rows_before: records.len(),
        ..Default::default()
    };
    let mut samples: Vec<String> = Vec::new();
    let mut cleaned = Vec::with_capacity(records.len());

    for row in records.rows() {
        if row.iter().all(CellValue::is_blank) {
            stats.blank_rows_dropped += 1;
            continue;
        }

        let amount = match parse_amount(&row[amount_idx]) {
            AmountParse::Valid(v) => Some(v),
            AmountParse::Empty => {
                stats.empty_amounts += 1;
                None
            }
            AmountParse::Invalid => {
                stats.invalid_amounts += 1;
                if samples.len() < INVALID_SAMPLE_LIMIT {
                    samples.push(row[amount_idx].to_text());
                }
                None
            }
        };

        let Some(date) = parse_date(&row[date_idx]) else {
            stats.invalid_date_rows_dropped += 1;
            continue;
        };

        let agent = agent_idx
            .map(|i| &row[i])
            .filter(|cell| !cell.is_blank())
            .map(|cell| title_case(cell.to_text().trim()));

        cleaned.push(SalesRecord {
            date,
            amount,
            agent,
            month: month_key(date),
            extras: extra_idx.iter().map(|&i| row[i].clone()).collect(),
        });
    }

    stats.rows_after = cleaned.len();

    log.info(format!(
        "Montants vides (après suppression des lignes vides): {}",
        stats.empty_amounts
    ));
    if stats.absent_amounts() > 0 {
        log.warn(format!(
            "Montants manquants -> absents (exclus des totaux): {}",
            stats.absent_amounts()
        ));
    }
    if !samples.is_empty() {
        log.warn(format!(
            "Exemples montants manquants (non vides): {:?}",
            samples
        ));
    }
    let invalid_dates = stats.invalid_date_rows_dropped;
    if invalid_dates > 0 {
        log.warn(format!("Dates invalides: {}", invalid_dates));
    }
    log.info(format!("Lignes supprimées sans date: {}", invalid_dates));

    let dataset = CleanedDataset {
        has_agent: agent_idx.is_some(),
        extra_columns: extra_idx
            .iter()
            .map(|&i| records.columns()[i].clone())
            .collect(),
        records: cleaned,
    };

    Ok(CleaningOutcome { dataset, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn clean(set: &RecordSet) -> CleaningOutcome {
        let mut log = RunLog::new();
        clean_records(set, &mut log).unwrap()
    }

    #[test]
    fn test_reference_example() {
        let set = RecordSet::from_text(
            &["date", "montant"],
            &[
                &["15/01/2025", "100,50"],
                &["32/13/2025", "200"],
                &["16/01/2025", "N/A"],
            ],
        );

        let outcome = clean(&set);

        assert_eq!(outcome.dataset.len(), 2);
        assert_eq!(outcome.dataset.records[0].amount, Some(100.5));
        assert_eq!(outcome.dataset.records[1].amount, None);
        assert_eq!(outcome.stats.invalid_date_rows_dropped, 1);
        assert_eq!(outcome.stats.invalid_amounts, 1);
        assert_eq!(outcome.stats.rows_dropped(), 1);
        assert!(!outcome.dataset.has_agent);
    }

    #[test]
    fn test_missing_columns_are_reported() {
        let set = RecordSet::from_text(&["Jour", "Commercial"], &[&["01/01/2025", "bob"]]);
        let mut log = RunLog::new();

        let err = clean_records(&set, &mut log).unwrap_err();

        match err {
            SalesReportError::MissingColumns(missing) => {
                assert_eq!(missing, vec!["date".to_string(), "montant".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_rows_are_dropped_and_counted() {
        let mut set = RecordSet::new(vec!["date".into(), "montant".into(), "ville".into()]);
        set.push_row(vec!["01/02/2025".into(), "10".into(), "Paris".into()]);
        set.push_row(vec![CellValue::Empty, CellValue::from(" "), CellValue::Empty]);
        set.push_row(vec![CellValue::Empty, CellValue::from("5"), CellValue::Empty]);

        let outcome = clean(&set);

        assert_eq!(outcome.stats.rows_before, 3);
        assert_eq!(outcome.stats.blank_rows_dropped, 1);
        assert_eq!(outcome.stats.invalid_date_rows_dropped, 1);
        assert_eq!(outcome.stats.rows_after, 1);
        assert_eq!(outcome.dataset.extra_columns, vec!["ville".to_string()]);
        assert_eq!(outcome.dataset.records[0].extras, vec![CellValue::from("Paris")]);
    }

    #[test]
    fn test_agent_normalization_and_month() {
        let set = RecordSet::from_text(
            &["Date ", "Montant", "COMMERCIAL"],
            &[&["05/03/2025", "1 000", "  alice MARTIN "], &["06/03/2025", "3", ""]],
        );

        let outcome = clean(&set);
        let records = &outcome.dataset.records;

        assert!(outcome.dataset.has_agent);
        assert_eq!(records[0].agent.as_deref(), Some("Alice Martin"));
        assert_eq!(records[0].month, "2025-03");
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2025, 3, 5).unwrap());
        // a plain space is not a grouping separator
        assert_eq!(records[0].amount, None);
        assert_eq!(records[1].agent, None);
    }

    #[test]
    fn test_duplicate_columns_are_merged_and_logged() {
        let set = RecordSet::from_text(
            &["date", "Montant", " montant "],
            &[&["01/01/2025", "50", ""], &["02/01/2025", "", "7,5"]],
        );
        let mut log = RunLog::new();

        let outcome = clean_records(&set, &mut log).unwrap();

        assert_eq!(outcome.dataset.records[0].amount, Some(50.0));
        assert_eq!(outcome.dataset.records[1].amount, Some(7.5));
        assert!(log.messages().any(|m| m.contains("Colonnes dupliquées")));
    }
}
