use crate::schema::Aggregate;
use serde::{Deserialize, Serialize};

/// First and last month covered by a report, both `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: String,
    pub end: String,
}

impl ReportPeriod {
    pub fn is_single_month(&self) -> bool {
        self.start == self.end
    }

    /// File-naming token: `2025-03` or `2025-01_to_2025-12`.
    pub fn tag(&self) -> String {
        if self.is_single_month() {
            self.start.clone()
        } else {
            format!("{}_to_{}", self.start, self.end)
        }
    }

    /// Year of the first month.
    pub fn year(&self) -> &str {
        self.start.split('-').next().unwrap_or(&self.start)
    }
}

/// Derives the reporting period from the monthly totals.
///
/// Month keys are zero-padded, so string order is calendar order. `None`
/// when there is no month at all.
pub fn resolve_period(monthly: &Aggregate) -> Option<ReportPeriod> {
    let start = monthly.keys().min()?;
    let end = monthly.keys().max()?;
    Some(ReportPeriod {
        start: start.to_string(),
        end: end.to_string(),
    })
}

/// French currency rendering: `1234567.89` becomes `1 234 567,89 €`.
pub fn format_eur_fr(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{},{} €", sign, grouped, frac_part)
}
