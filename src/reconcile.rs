use crate::error::{Result, SalesReportError};
use crate::schema::{CellValue, RecordSet, AGENT_COLUMN, AMOUNT_COLUMN, DATE_COLUMN};
use log::debug;
use serde::{Deserialize, Serialize};

pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalized names that more than one source column collapses into.
pub fn duplicate_columns(records: &RecordSet) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut duplicates: Vec<String> = Vec::new();

    for name in records.columns().iter().map(|c| normalize_column_name(c)) {
        if seen.contains(&name) {
            if !duplicates.contains(&name) {
                duplicates.push(name);
            }
        } else {
            seen.push(name);
        }
    }

    duplicates
}

/// Returns a copy of `records` with trimmed, lower-cased and unique column names.
///
/// Columns that normalize to the same name are merged row by row: the first
/// non-blank value in left-to-right order wins, and a row where every
/// candidate is blank gets `Empty`. The merged column sits where its first
/// occurrence was. Applying this twice gives the same result as applying it once.
pub fn reconcile_columns(records: &RecordSet) -> RecordSet {
    let mut names: Vec<String> = Vec::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for (idx, raw) in records.columns().iter().enumerate() {
        let name = normalize_column_name(raw);
        match names.iter().position(|n| *n == name) {
            Some(group) => groups[group].push(idx),
            None => {
                names.push(name);
                groups.push(vec![idx]);
            }
        }
    }

    if groups.iter().any(|g| g.len() > 1) {
        debug!(
            "Merging {} duplicate column group(s) after normalization",
            groups.iter().filter(|g| g.len() > 1).count()
        );
    }

    let mut reconciled = RecordSet::new(names);
    for row in records.rows() {
        let merged = groups
            .iter()
            .map(|sources| match sources.as_slice() {
                [single] => row[*single].clone(),
                many => many
                    .iter()
                    .map(|&i| &row[i])
                    .find(|cell| !cell.is_blank())
                    .cloned()
                    .unwrap_or(CellValue::Empty),
            })
            .collect();
        reconciled.push_row(merged);
    }

    reconciled
}

/// Which reconciled columns play the date, amount and agent roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: String,
    pub amount: String,
    #[serde(default)]
    pub agent: Option<String>,
}

impl ColumnMapping {
    /// Preselects the canonical columns when they exist, otherwise the first
    /// column for the required roles and no agent. `None` for a set without columns.
    pub fn detect(columns: &[String]) -> Option<Self> {
        let first = columns.first()?;
        let pick = |wanted: &str| {
            columns
                .iter()
                .find(|c| c.as_str() == wanted)
                .unwrap_or(first)
                .clone()
        };

        Some(Self {
            date: pick(DATE_COLUMN),
            amount: pick(AMOUNT_COLUMN),
            agent: columns
                .iter()
                .find(|c| c.as_str() == AGENT_COLUMN)
                .cloned(),
        })
    }

    pub fn validate(&self, columns: &[String]) -> Result<()> {
        if self.date == self.amount {
            return Err(SalesReportError::AmbiguousMapping(self.date.clone()));
        }
        if let Some(agent) = &self.agent {
            if *agent == self.date || *agent == self.amount {
                return Err(SalesReportError::AmbiguousMapping(agent.clone()));
            }
        }

        let chosen = [Some(&self.date), Some(&self.amount), self.agent.as_ref()];
        for name in chosen.into_iter().flatten() {
            if !columns.contains(name) {
                return Err(SalesReportError::UnknownColumn(name.clone()));
            }
        }
        Ok(())
    }

    /// Renames the chosen columns to their canonical names.
    ///
    /// The result may again hold duplicate names (for instance when another
    /// column was already called `date`); the cleaner merges those.
    pub fn apply(&self, records: &RecordSet) -> Result<RecordSet> {
        self.validate(records.columns())?;

        let renamed = records
            .columns()
            .iter()
            .map(|c| {
                if *c == self.date {
                    DATE_COLUMN.to_string()
                } else if *c == self.amount {
                    AMOUNT_COLUMN.to_string()
                } else if self.agent.as_deref() == Some(c.as_str()) {
                    AGENT_COLUMN.to_string()
                } else {
                    c.clone()
                }
            })
            .collect();

        let mut mapped = records.clone();
        mapped.set_columns(renamed);
        Ok(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_names() {
        let set = RecordSet::from_text(&[" Date", "MONTANT  ", "Commercial"], &[&["a", "b", "c"]]);
        let reconciled = reconcile_columns(&set);
        assert_eq!(reconciled.columns(), &["date", "montant", "commercial"]);
        assert_eq!(reconciled.rows(), set.rows());
    }

    #[test]
    fn test_merges_duplicates_with_first_non_blank() {
        let set = RecordSet::from_text(
            &["Montant", "Date", " montant "],
            &[&["50", "01/01/2025", ""], &["", "02/01/2025", "70"], &["", "03/01/2025", " "]],
        );

        let reconciled = reconcile_columns(&set);

        assert_eq!(reconciled.columns(), &["montant", "date"]);
        assert_eq!(reconciled.rows()[0][0], CellValue::from("50"));
        assert_eq!(reconciled.rows()[1][0], CellValue::from("70"));
        assert_eq!(reconciled.rows()[2][0], CellValue::Empty);
        assert_eq!(duplicate_columns(&set), vec!["montant".to_string()]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let set = RecordSet::from_text(&["A", "a ", "B"], &[&["", "x", "y"], &["1", "2", "3"]]);
        let once = reconcile_columns(&set);
        let twice = reconcile_columns(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_does_not_touch_input() {
        let set = RecordSet::from_text(&["A", "a"], &[&["", "x"]]);
        let before = set.clone();
        let _ = reconcile_columns(&set);
        assert_eq!(set, before);
    }

    #[test]
    fn test_detect_mapping() {
        let cols: Vec<String> = ["ville", "date", "montant", "commercial"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mapping = ColumnMapping::detect(&cols).unwrap();
        assert_eq!(mapping.date, "date");
        assert_eq!(mapping.amount, "montant");
        assert_eq!(mapping.agent.as_deref(), Some("commercial"));

        let other: Vec<String> = vec!["jour".into(), "total".into()];
        let fallback = ColumnMapping::detect(&other).unwrap();
        assert_eq!(fallback.date, "jour");
        assert_eq!(fallback.amount, "jour");
        assert!(fallback.agent.is_none());
        assert!(ColumnMapping::detect(&[]).is_none());
    }

    #[test]
    fn test_apply_mapping_renames() {
        let set = RecordSet::from_text(&["jour", "total", "vendeur"], &[&["01/01/2025", "1", "bob"]]);
        let mapping = ColumnMapping {
            date: "jour".into(),
            amount: "total".into(),
            agent: Some("vendeur".into()),
        };
        let mapped = mapping.apply(&set).unwrap();
        assert_eq!(mapped.columns(), &["date", "montant", "commercial"]);
    }

    #[test]
    fn test_apply_mapping_rejects_same_column() {
        let set = RecordSet::from_text(&["jour", "total"], &[]);
        let mapping = ColumnMapping {
            date: "jour".into(),
            amount: "jour".into(),
            agent: None,
        };
        assert!(matches!(
            mapping.apply(&set),
            Err(SalesReportError::AmbiguousMapping(_))
        ));

        let unknown = ColumnMapping {
            date: "jour".into(),
            amount: "prix".into(),
            agent: None,
        };
        assert!(matches!(
            unknown.apply(&set),
            Err(SalesReportError::UnknownColumn(c)) if c == "prix"
        ));
    }
}
