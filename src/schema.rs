use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DATE_COLUMN: &str = "date";
pub const AMOUNT_COLUMN: &str = "montant";
pub const AGENT_COLUMN: &str = "commercial";
pub const MONTH_COLUMN: &str = "mois";

/// A raw spreadsheet cell, typed as loosely as the reader delivered it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Missing, or text that is empty once trimmed.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Textual form used by every parser, whatever the source type was.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// Ordered columns and rows of raw cells.
///
/// Column names may repeat until the set has gone through
/// [`reconcile_columns`](crate::reconcile::reconcile_columns).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RecordSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a set from plain strings, mostly useful for fixtures.
    pub fn from_text(columns: &[&str], rows: &[&[&str]]) -> Self {
        let mut set = Self::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            set.push_row(row.iter().map(|v| CellValue::from(*v)).collect());
        }
        set
    }

    /// Appends a row, padding with `Empty` or truncating to the column count.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Index of the first column carrying `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterates over one column's cells, or nothing if the column is absent.
    pub fn column_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a CellValue> + 'a {
        let idx = self.column_index(name);
        self.rows
            .iter()
            .filter_map(move |row| idx.and_then(|i| row.get(i)))
    }

    pub(crate) fn set_columns(&mut self, columns: Vec<String>) {
        debug_assert_eq!(columns.len(), self.columns.len());
        self.columns = columns;
    }

    /// Stacks record sets vertically, aligning columns by name.
    ///
    /// The result holds the union of all columns in first-appearance order.
    /// A name repeated inside one source lines up with the same repetition
    /// in the others. Cells a source does not provide are `Empty`.
    pub fn concat<I>(sets: I) -> RecordSet
    where
        I: IntoIterator<Item = RecordSet>,
    {
        let sets: Vec<RecordSet> = sets.into_iter().collect();

        let mut columns: Vec<String> = Vec::new();
        let mut slots: HashMap<(String, usize), usize> = HashMap::new();
        let mut layouts: Vec<Vec<usize>> = Vec::with_capacity(sets.len());

        for set in &sets {
            let mut occurrences: HashMap<&str, usize> = HashMap::new();
            let mut layout = Vec::with_capacity(set.columns.len());
            for name in &set.columns {
                let occurrence = occurrences.entry(name.as_str()).or_insert(0);
                let key = (name.clone(), *occurrence);
                *occurrence += 1;

                let slot = match slots.get(&key) {
                    Some(slot) => *slot,
                    None => {
                        columns.push(name.clone());
                        slots.insert(key, columns.len() - 1);
                        columns.len() - 1
                    }
                };
                layout.push(slot);
            }
            layouts.push(layout);
        }

        let width = columns.len();
        let mut merged = RecordSet::new(columns);
        for (set, layout) in sets.into_iter().zip(layouts) {
            for row in set.rows {
                let mut aligned = vec![CellValue::Empty; width];
                for (cell, slot) in row.into_iter().zip(layout.iter()) {
                    aligned[*slot] = cell;
                }
                merged.rows.push(aligned);
            }
        }
        merged
    }
}

/// One cleaned sales row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    /// `None` when the source amount was blank or not numeric.
    pub amount: Option<f64>,
    pub agent: Option<String>,
    /// `YYYY-MM` month key derived from `date`.
    pub month: String,
    /// Values of the pass-through columns, aligned with
    /// [`CleanedDataset::extra_columns`].
    pub extras: Vec<CellValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CleanedDataset {
    pub has_agent: bool,
    pub extra_columns: Vec<String>,
    pub records: Vec<SalesRecord>,
}

impl CleanedDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of all valid amounts.
    pub fn total_amount(&self) -> f64 {
        self.records.iter().filter_map(|r| r.amount).sum()
    }

    /// Number of distinct non-empty agent names.
    pub fn distinct_agents(&self) -> usize {
        let mut agents: Vec<&str> = self
            .records
            .iter()
            .filter_map(|r| r.agent.as_deref())
            .collect();
        agents.sort_unstable();
        agents.dedup();
        agents.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub key: String,
    pub total: f64,
}

/// A two-column summary table, sorted by key ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub key_column: String,
    pub value_column: String,
    pub rows: Vec<AggregateRow>,
}

impl Aggregate {
    pub fn empty(key_column: &str) -> Self {
        Self {
            key_column: key_column.to_string(),
            value_column: AMOUNT_COLUMN.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.rows.iter().find(|r| r.key == key).map(|r| r.total)
    }

    pub fn total(&self) -> f64 {
        self.rows.iter().map(|r| r.total).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.key.as_str())
    }
}

/// Pre-cleaning data quality counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Rows whose date does not parse (bad format or impossible date).
    pub invalid_dates: usize,
    /// Rows whose amount is missing or blank in the source.
    pub empty_amounts: usize,
    /// Rows whose amount is present but not numeric.
    pub invalid_amounts: usize,
}
