//! Date parsing and age arithmetic.
//!
//! Bundles store dates as ISO dates, ISO timestamps with or without an
//! offset, or space-separated SQL timestamps. Everything here is lenient and
//! returns `None` rather than failing.

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::EM_DASH;

/// Mean Gregorian month length, used for fractional ages.
pub const DAYS_PER_MONTH: f64 = 30.4375;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y"];

/// Parse any of the date/time shapes seen in bundles.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    // Some writers append a bare Z to timestamps without seconds
    let trimmed = s.strip_suffix('Z').unwrap_or(s);
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    // A date may carry a trailing time we don't recognise; try the first ten chars too.
    let candidates = [trimmed, trimmed.get(..10).unwrap_or(trimmed)];
    for candidate in candidates {
        for fmt in DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(candidate, fmt) {
                return Some(d.and_time(NaiveTime::MIN));
            }
        }
    }
    None
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_datetime(raw).map(|dt| dt.date())
}

/// Like [`parse_date`] but logs unparseable non-empty input.
pub fn parse_date_logged(raw: &str, what: &str) -> Option<NaiveDate> {
    let parsed = parse_date(raw);
    if parsed.is_none() && !raw.trim().is_empty() {
        tracing::warn!(value = raw, field = what, "Unparseable date");
    }
    parsed
}

/// `YYYY-MM-DD` when parseable, the raw text otherwise, em-dash when empty.
pub fn display_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None if raw.trim().is_empty() => EM_DASH.to_string(),
        None => raw.trim().to_string(),
    }
}

/// Fractional months between birth and `at`, never negative.
pub fn age_in_months(dob: NaiveDate, at: NaiveDateTime) -> f64 {
    let born = dob.and_time(NaiveTime::MIN);
    let seconds = (at - born).num_seconds() as f64;
    (seconds / 86_400.0 / DAYS_PER_MONTH).max(0.0)
}

/// Whole calendar months from `dob` up to and including `reference`.
fn whole_months(dob: NaiveDate, reference: NaiveDate) -> u32 {
    let mut months = 0u32;
    while let Some(next) = dob.checked_add_months(Months::new(months + 1)) {
        if next > reference {
            break;
        }
        months += 1;
    }
    months
}

/// Compact age at `reference`: `14d`, `2m 2d`, `6m`, `1y 3m`.
///
/// Months are counted by stepping whole calendar months from the birth date;
/// the day remainder is what is left after the last whole month.
pub fn age_display(dob: Option<NaiveDate>, reference: Option<NaiveDate>) -> String {
    let (Some(dob), Some(reference)) = (dob, reference) else {
        return EM_DASH.to_string();
    };
    if dob > reference {
        return EM_DASH.to_string();
    }

    let total_months = whole_months(dob, reference);
    let years = total_months / 12;
    let months = total_months % 12;
    let anchor = dob
        .checked_add_months(Months::new(total_months))
        .unwrap_or(dob);
    let days = (reference - anchor).num_days().max(0);

    match (years, months) {
        (0, 0) => format!("{days}d"),
        (0, m) if m < 6 => {
            if days == 0 {
                format!("{m}m")
            } else {
                format!("{m}m {days}d")
            }
        }
        (0, m) => format!("{m}m"),
        (y, 0) => format!("{y}y"),
        (y, m) => format!("{y}y {m}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_common_shapes() {
        assert_eq!(parse_date("2024-03-03"), Some(d(2024, 3, 3)));
        assert_eq!(parse_date("2024-03-03T10:15:00Z"), Some(d(2024, 3, 3)));
        assert_eq!(parse_date("2024-03-03T10:15:00.123+02:00"), Some(d(2024, 3, 3)));
        assert_eq!(parse_date("2024-03-03 10:15:00"), Some(d(2024, 3, 3)));
        assert_eq!(parse_date("03/04/2024"), Some(d(2024, 4, 3)));
        assert_eq!(parse_date("2024-03-03 garbage"), Some(d(2024, 3, 3)));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("   "), None);
    }

    #[test]
    fn display_date_falls_back_to_raw_text() {
        assert_eq!(display_date("2024-03-03T08:00:00"), "2024-03-03");
        assert_eq!(display_date("spring 2024"), "spring 2024");
        assert_eq!(display_date(""), EM_DASH);
    }

    #[test]
    fn age_display_reference_points() {
        let dob = Some(d(2024, 1, 1));
        assert_eq!(age_display(dob, Some(d(2024, 1, 1))), "0d");
        assert_eq!(age_display(dob, Some(d(2024, 1, 15))), "14d");
        assert_eq!(age_display(dob, Some(d(2024, 3, 3))), "2m 2d");
        assert_eq!(age_display(dob, Some(d(2024, 7, 1))), "6m");
        assert_eq!(age_display(dob, Some(d(2025, 1, 1))), "1y");
        assert_eq!(age_display(dob, Some(d(2025, 4, 1))), "1y 3m");
    }

    #[test]
    fn age_display_omits_zero_day_clause_under_six_months() {
        assert_eq!(age_display(Some(d(2024, 1, 1)), Some(d(2024, 4, 1))), "3m");
        assert_eq!(age_display(Some(d(2024, 1, 1)), Some(d(2024, 8, 20))), "7m");
    }

    #[test]
    fn age_display_missing_or_inverted_inputs_em_dash() {
        assert_eq!(age_display(None, Some(d(2024, 1, 1))), EM_DASH);
        assert_eq!(age_display(Some(d(2024, 1, 1)), None), EM_DASH);
        assert_eq!(age_display(Some(d(2024, 5, 1)), Some(d(2024, 1, 1))), EM_DASH);
    }

    #[test]
    fn end_of_month_birthdays_step_by_calendar() {
        // Jan 31 + 1 month clamps to Feb 29 in a leap year
        assert_eq!(age_display(Some(d(2024, 1, 31)), Some(d(2024, 2, 29))), "1m");
        assert_eq!(age_display(Some(d(2024, 1, 31)), Some(d(2024, 2, 28))), "28d");
    }

    #[test]
    fn age_in_months_is_fractional_and_clamped() {
        let at = d(2024, 7, 1).and_time(NaiveTime::MIN);
        let months = age_in_months(d(2024, 1, 1), at);
        assert!((months - 182.0 / DAYS_PER_MONTH).abs() < 1e-9);
        assert_eq!(age_in_months(d(2025, 1, 1), at), 0.0);
    }
}
