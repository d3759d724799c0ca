//! Field parsing for raw date and amount cells.
//!
//! Parsing never fails loudly: a value that cannot be interpreted comes back as
//! `None` (dates) or as [`AmountParse::Empty`] / [`AmountParse::Invalid`]
//! (amounts). Callers decide whether that drops a row or only nulls a value.

use crate::schema::CellValue;
use chrono::{NaiveDate, NaiveTime};

/// Characters used as thousands separators that must disappear before conversion.
const GROUPING_SPACES: [char; 2] = ['\u{a0}', '\u{202f}'];

/// Outcome of converting a raw amount cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmountParse {
    Valid(f64),
    /// Missing or blank in the source.
    Empty,
    /// Present but not numeric once separators are normalized.
    Invalid,
}

impl AmountParse {
    pub fn value(self) -> Option<f64> {
        match self {
            AmountParse::Valid(v) => Some(v),
            AmountParse::Empty | AmountParse::Invalid => None,
        }
    }
}

/// Parses an amount cell.
///
/// The cell is always handled through its textual form so that numeric and
/// text cells go through the same rules.
pub fn parse_amount(raw: &CellValue) -> AmountParse {
    if raw.is_blank() {
        return AmountParse::Empty;
    }
    parse_amount_text(&raw.to_text())
}

/// Parses amount text such as `"1 234,50"` (with a non-breaking space) or `"99.9"`.
pub fn parse_amount_text(text: &str) -> AmountParse {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return AmountParse::Empty;
    }

    let normalized: String = trimmed
        .chars()
        .filter(|c| !GROUPING_SPACES.contains(c))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => AmountParse::Valid(v),
        _ => AmountParse::Invalid,
    }
}

/// Parses a date cell using the day-first convention.
pub fn parse_date(raw: &CellValue) -> Option<NaiveDate> {
    match raw {
        CellValue::DateTime(dt) => Some(dt.date()),
        CellValue::Empty => None,
        other => parse_date_text(&other.to_text()),
    }
}

/// Parses day-first date text.
///
/// Accepted shapes are `DD/MM/YYYY`, `DD-MM-YYYY` and `DD.MM.YYYY` (two-digit
/// years allowed), ISO `YYYY-MM-DD` and `YYYY/MM/DD`, each optionally followed
/// by `HH:MM` or `HH:MM:SS`. Impossible dates such as `32/13/2025` yield `None`.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (date_part, time_part) = match text.split_once([' ', 'T']) {
        Some((date, time)) => (date, Some(time.trim())),
        None => (text, None),
    };

    if let Some(time) = time_part {
        if !is_valid_time(time) {
            return None;
        }
    }

    let (first, second, third) = split_date_parts(date_part)?;

    if first.len() == 4 {
        if second.len() > 2 || third.len() > 2 {
            return None;
        }
        return build_date(first, second, third);
    }

    if first.len() > 2 || second.len() > 2 {
        return None;
    }

    let year = match third.len() {
        4 => third.parse::<i32>().ok()?,
        2 => expand_two_digit_year(third.parse::<i32>().ok()?),
        _ => return None,
    };
    let month = second.parse::<u32>().ok()?;
    let day = first.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `YYYY-MM` month key for a date.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Title-cases free text: the first letter of each alphabetic run is
/// upper-cased and the following letters are lower-cased.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;

    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }

    out
}

fn split_date_parts(text: &str) -> Option<(&str, &str, &str)> {
    let separator = text.chars().find(|c| matches!(c, '/' | '-' | '.'))?;
    let mut parts = text.split(separator);

    let first = parts.next()?;
    let second = parts.next()?;
    let third = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let all_digits = [first, second, third]
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));

    all_digits.then_some((first, second, third))
}

fn build_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        year.parse().ok()?,
        month.parse().ok()?,
        day.parse().ok()?,
    )
}

fn expand_two_digit_year(year: i32) -> i32 {
    if year < 70 {
        2000 + year
    } else {
        1900 + year
    }
}

fn is_valid_time(text: &str) -> bool {
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
        .iter()
        .any(|fmt| NaiveTime::parse_from_str(text, fmt).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_first_dates() {
        assert_eq!(parse_date_text("15/01/2025"), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date_text("03/04/2025"), Some(ymd(2025, 4, 3)));
        assert_eq!(parse_date_text("3-4-2025"), Some(ymd(2025, 4, 3)));
        assert_eq!(parse_date_text("03.04.25"), Some(ymd(2025, 4, 3)));
        assert_eq!(parse_date_text(" 28/02/1999 "), Some(ymd(1999, 2, 28)));
    }

    #[test]
    fn test_iso_and_time_suffixes() {
        assert_eq!(parse_date_text("2025-01-15"), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date_text("2025/01/15"), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date_text("2025-01-15 00:00:00"), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date_text("2025-01-15T13:45"), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date_text("15/01/2025 09:30"), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date_text("15/01/2025 99:99"), None);
    }

    #[test]
    fn test_impossible_and_garbage_dates() {
        assert_eq!(parse_date_text("32/13/2025"), None);
        assert_eq!(parse_date_text("29/02/2025"), None);
        assert_eq!(parse_date_text(""), None);
        assert_eq!(parse_date_text("N/A"), None);
        assert_eq!(parse_date_text("15/01"), None);
        assert_eq!(parse_date_text("15/01-2025"), None);
        assert_eq!(parse_date_text("1/2/3/4"), None);
    }

    #[test]
    fn test_typed_date_cells() {
        let dt = ymd(2025, 6, 1).and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(parse_date(&CellValue::DateTime(dt)), Some(ymd(2025, 6, 1)));
        assert_eq!(parse_date(&CellValue::Empty), None);
        assert_eq!(parse_date(&CellValue::Number(45000.0)), None);
    }

    #[test]
    fn test_amount_separators() {
        assert_eq!(parse_amount_text("100,50"), AmountParse::Valid(100.5));
        assert_eq!(parse_amount_text(" 99.9 "), AmountParse::Valid(99.9));
        assert_eq!(parse_amount_text("1\u{a0}234,5"), AmountParse::Valid(1234.5));
        assert_eq!(parse_amount_text("-12,25"), AmountParse::Valid(-12.25));
    }

    #[test]
    fn test_amount_empty_versus_invalid() {
        assert_eq!(parse_amount(&CellValue::Empty), AmountParse::Empty);
        assert_eq!(parse_amount(&CellValue::from("   ")), AmountParse::Empty);
        assert_eq!(parse_amount(&CellValue::from("N/A")), AmountParse::Invalid);
        assert_eq!(parse_amount(&CellValue::from("1.234,56")), AmountParse::Invalid);
        assert_eq!(parse_amount(&CellValue::from("nan")), AmountParse::Invalid);
        assert_eq!(parse_amount(&CellValue::Bool(true)), AmountParse::Invalid);
        assert_eq!(AmountParse::Invalid.value(), None);
    }

    #[test]
    fn test_numeric_cells_are_read_through_text() {
        assert_eq!(parse_amount(&CellValue::Number(1500.25)), AmountParse::Valid(1500.25));
    }

    #[test]
    fn test_month_key() {
        assert_eq!(month_key(ymd(2025, 3, 9)), "2025-03");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("alice martin"), "Alice Martin");
        assert_eq!(title_case("BOB LEROY"), "Bob Leroy");
        assert_eq!(title_case("chloé bernard"), "Chloé Bernard");
        assert_eq!(title_case("jean-pierre o'neil"), "Jean-Pierre O'Neil");
    }
}
