//! Calendar-day arithmetic shared by range queries and the PDF report.

use crate::error::AttendanceError;
use chrono::NaiveDate;

/// Inclusive day count of `[start, end]`; zero when the range is reversed.
pub fn total_days(start: NaiveDate, end: NaiveDate) -> i64 {
    ((end - start).num_days() + 1).max(0)
}

/// Percentage of `total_days` covered by `days_present`, rounded to 2 decimals.
pub fn attendance_percentage(days_present: i64, total_days: i64) -> f64 {
    if total_days <= 0 {
        return 0.0;
    }
    round2(days_present as f64 / total_days as f64 * 100.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse a required `YYYY-MM-DD` query value.
pub fn parse_date(field: &str, raw: Option<&str>) -> Result<NaiveDate, AttendanceError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AttendanceError::Validation(format!("missing required field: {field}")))?;
    NaiveDate::parse_from_str(raw, crate::db::models::DATE_FORMAT).map_err(|_| {
        AttendanceError::Validation(format!("{field} must be a YYYY-MM-DD date, got `{raw}`"))
    })
}
