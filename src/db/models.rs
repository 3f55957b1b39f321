use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage format for every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
}

mod timestamp_text {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Student {
    #[serde(skip)]
    pub id: i64,
    pub student_id: String,
    pub name: String,
    pub email: Option<String>,
    pub class_section: String,
    /// Absent for bulk-imported students.
    #[serde(skip)]
    pub image_path: Option<String>,
    #[serde(with = "timestamp_text")]
    pub created_at: NaiveDateTime,
}

/// Fields supplied when creating a student row.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_class")]
    pub class_section: String,
}

pub(crate) fn default_class() -> String {
    super::schema::DEFAULT_CLASS.to_string()
}

/// Minimal student identity used by roster-style listings.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StudentRef {
    pub student_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarkedBy {
    Auto,
    Manual,
}

impl MarkedBy {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkedBy::Auto => "auto",
            MarkedBy::Manual => "manual",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "auto" => Some(MarkedBy::Auto),
            "manual" => Some(MarkedBy::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for MarkedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: String,
    #[serde(with = "timestamp_text")]
    pub timestamp: NaiveDateTime,
    pub marked_by: MarkedBy,
    pub class_section: String,
}

/// One attendance row joined with the student's display name.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AttendanceEntry {
    pub student_id: String,
    pub name: String,
    #[serde(with = "timestamp_text")]
    pub timestamp: NaiveDateTime,
    pub marked_by: MarkedBy,
}

/// Distinct days with at least one record, per student, over a date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaysPresent {
    pub student_id: String,
    pub name: String,
    pub days_present: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TopAttendee {
    pub student_id: String,
    pub name: String,
    pub count: i64,
}

/// Attendance record joined with student contact info, as exported to CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub student_id: String,
    pub name: String,
    pub email: Option<String>,
    pub class_section: String,
    pub timestamp: NaiveDateTime,
    pub marked_by: MarkedBy,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClassSection {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuditLogEntry {
    pub action: String,
    pub details: Option<String>,
    #[serde(with = "timestamp_text")]
    pub timestamp: NaiveDateTime,
}

/// Action tags written to the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    LoginFailed,
    RegisterStudent,
    BulkRegister,
    MarkAttendance,
    DeleteStudent,
    CreateClass,
    ViewDashboard,
    ExportCsv,
    ExportPdf,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::LoginFailed => "LOGIN_FAILED",
            AuditAction::RegisterStudent => "REGISTER_STUDENT",
            AuditAction::BulkRegister => "BULK_REGISTER",
            AuditAction::MarkAttendance => "MARK_ATTENDANCE",
            AuditAction::DeleteStudent => "DELETE_STUDENT",
            AuditAction::CreateClass => "CREATE_CLASS",
            AuditAction::ViewDashboard => "VIEW_DASHBOARD",
            AuditAction::ExportCsv => "EXPORT_CSV",
            AuditAction::ExportPdf => "EXPORT_PDF",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_round_trip_through_storage_format() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 5)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .expect("valid timestamp");
        let text = format_timestamp(ts);
        assert_eq!(text, "2024-01-05 08:30:00");
        assert_eq!(parse_timestamp(&text).expect("parse"), ts);
    }

    #[test]
    fn marked_by_parses_only_known_methods() {
        assert_eq!(MarkedBy::parse("auto"), Some(MarkedBy::Auto));
        assert_eq!(MarkedBy::parse("manual"), Some(MarkedBy::Manual));
        assert_eq!(MarkedBy::parse("Manual"), None);
    }
}
