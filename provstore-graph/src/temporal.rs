//! Date parsing and edge validity inference
//!
//! Event edges pointing at date entities pick up `valid_from`/`valid_until`
//! bounds when the date node's canonical name parses. Stored bounds are
//! only replaced by strictly more specific values: a null endpoint can be
//! filled and an interval can be narrowed, but a tie never overwrites.

use std::sync::LazyLock;

use regex::Regex;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());

static SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());

/// `Month D, YYYY` and `Month D YYYY`
static MONTH_FIRST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+)\.?\s+(\d{1,2})(?:,)?\s+(\d{4})$").unwrap());

/// `D Month YYYY`
static DAY_FIRST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\s+([A-Za-z]+)\.?\s+(\d{4})$").unwrap());

fn month_number(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "january" | "jan" => Some(1),
        "february" | "feb" => Some(2),
        "march" | "mar" => Some(3),
        "april" | "apr" => Some(4),
        "may" => Some(5),
        "june" | "jun" => Some(6),
        "july" | "jul" => Some(7),
        "august" | "aug" => Some(8),
        "september" | "sept" | "sep" => Some(9),
        "october" | "oct" => Some(10),
        "november" | "nov" => Some(11),
        "december" | "dec" => Some(12),
        _ => None,
    }
}

fn validate(year: i32, month: u32, day: u32) -> Option<String> {
    if !(1900..=2100).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some(format!("{year:04}-{month:02}-{day:02}"))
}

/// Parse a date string into normalized `YYYY-MM-DD`.
///
/// Accepts ISO dates, `M/D/YYYY`, `Month D, YYYY` (comma optional),
/// `D Month YYYY`, and abbreviated month names including `Sept`.
/// Case-insensitive; surrounding whitespace ignored. Returns `None` on
/// anything else, including out-of-range components.
#[must_use]
pub fn parse_date(input: &str) -> Option<String> {
    let trimmed = input.trim();

    if let Some(caps) = ISO_DATE.captures(trimmed) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return validate(year, month, day);
    }

    if let Some(caps) = SLASH_DATE.captures(trimmed) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return validate(year, month, day);
    }

    if let Some(caps) = MONTH_FIRST.captures(trimmed) {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return validate(year, month, day);
    }

    if let Some(caps) = DAY_FIRST.captures(trimmed) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_number(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        return validate(year, month, day);
    }

    None
}

/// Apply a date bound to an edge's validity interval, updating only when
/// the new value is strictly more specific than the stored one.
///
/// Returns `(valid_from, valid_until)` after the update.
#[must_use]
pub fn narrow_validity(
    valid_from: Option<String>,
    valid_until: Option<String>,
    date: &str,
) -> (Option<String>, Option<String>) {
    let from = match valid_from {
        None => Some(date.to_string()),
        // Later start narrows the interval; an equal start is a tie.
        Some(existing) if date > existing.as_str() => Some(date.to_string()),
        Some(existing) => Some(existing),
    };
    let until = match valid_until {
        None => Some(date.to_string()),
        // Earlier end narrows the interval; an equal end is a tie.
        Some(existing) if date < existing.as_str() => Some(date.to_string()),
        Some(existing) => Some(existing),
    };
    (from, until)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_documented_format() {
        assert_eq!(parse_date("2024-03-15").as_deref(), Some("2024-03-15"));
        assert_eq!(parse_date("3/15/2024").as_deref(), Some("2024-03-15"));
        assert_eq!(parse_date("03/15/2024").as_deref(), Some("2024-03-15"));
        assert_eq!(parse_date("March 15, 2024").as_deref(), Some("2024-03-15"));
        assert_eq!(parse_date("March 15 2024").as_deref(), Some("2024-03-15"));
        assert_eq!(parse_date("15 March 2024").as_deref(), Some("2024-03-15"));
        assert_eq!(parse_date("Sept 9 2021").as_deref(), Some("2021-09-09"));
        assert_eq!(parse_date("  jan 2, 2000  ").as_deref(), Some("2000-01-02"));
    }

    #[test]
    fn rejects_out_of_range_components() {
        assert_eq!(parse_date("1899-12-31"), None);
        assert_eq!(parse_date("2101-01-01"), None);
        assert_eq!(parse_date("2024-13-01"), None);
        assert_eq!(parse_date("2024-00-10"), None);
        assert_eq!(parse_date("2024-01-32"), None);
        assert_eq!(parse_date("Smarch 5 2024"), None);
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn fills_null_endpoints() {
        let (from, until) = narrow_validity(None, None, "2024-03-15");
        assert_eq!(from.as_deref(), Some("2024-03-15"));
        assert_eq!(until.as_deref(), Some("2024-03-15"));
    }

    #[test]
    fn ties_do_not_overwrite() {
        let (from, until) = narrow_validity(
            Some("2024-03-15".into()),
            Some("2024-03-15".into()),
            "2024-03-15",
        );
        assert_eq!(from.as_deref(), Some("2024-03-15"));
        assert_eq!(until.as_deref(), Some("2024-03-15"));
    }

    #[test]
    fn narrowing_applies_widening_does_not() {
        // Narrow: later start.
        let (from, _) = narrow_validity(Some("2024-01-01".into()), None, "2024-06-01");
        assert_eq!(from.as_deref(), Some("2024-06-01"));
        // Widen attempt: earlier start keeps the stored bound.
        let (from, _) = narrow_validity(Some("2024-06-01".into()), None, "2024-01-01");
        assert_eq!(from.as_deref(), Some("2024-06-01"));
        // Narrow: earlier end.
        let (_, until) = narrow_validity(None, Some("2024-12-31".into()), "2024-06-01");
        assert_eq!(until.as_deref(), Some("2024-06-01"));
    }
}
