use crate::schema::{Aggregate, AggregateRow, CleanedDataset, SalesRecord, AGENT_COLUMN, AMOUNT_COLUMN, MONTH_COLUMN};
use std::collections::BTreeMap;

/// Sums valid amounts per group key, sorted by key ascending.
///
/// Records for which `key` returns `None` are left out. A group whose amounts
/// are all absent is still present with a total of zero.
fn group_totals<F>(records: &[SalesRecord], key_column: &str, key: F) -> Aggregate
where
    F: Fn(&SalesRecord) -> Option<&str>,
{
    let mut groups: BTreeMap<&str, f64> = BTreeMap::new();

    for record in records {
        let Some(k) = key(record) else {
            continue;
        };
        let entry = groups.entry(k).or_insert(0.0);
        if let Some(amount) = record.amount {
            *entry += amount;
        }
    }

    Aggregate {
        key_column: key_column.to_string(),
        value_column: AMOUNT_COLUMN.to_string(),
        rows: groups
            .into_iter()
            .map(|(k, total)| AggregateRow {
                key: k.to_string(),
                total,
            })
            .collect(),
    }
}

/// Total amount per `YYYY-MM` month.
pub fn total_by_month(dataset: &CleanedDataset) -> Aggregate {
    group_totals(&dataset.records, MONTH_COLUMN, |r| Some(r.month.as_str()))
}

/// Total amount per agent; empty (but well-formed) when there is no agent column.
pub fn total_by_agent(dataset: &CleanedDataset) -> Aggregate {
    if !dataset.has_agent {
        return Aggregate::empty(AGENT_COLUMN);
    }
    group_totals(&dataset.records, AGENT_COLUMN, |r| r.agent.as_deref())
}
