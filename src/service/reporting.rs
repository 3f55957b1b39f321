use crate::db::models::format_timestamp;
use crate::db::{AttendanceStore, AuditAction, AuditLogEntry, ExportRow, StudentRef, TopAttendee};
use crate::error::AttendanceError;
use crate::service::attendance::RangeRecord;
use crate::service::pdf::{PdfReport, render_pdf};
use crate::service::period::{attendance_percentage, round2, total_days};
use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

pub const CSV_HEADER: [&str; 6] = ["Student ID", "Name", "Email", "Class", "Timestamp", "Marked By"];
pub const TOP_ATTENDEES: i64 = 5;
pub const MAX_WINDOW_DAYS: u32 = 366;
pub const MAX_AUDIT_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Dashboard {
    pub total_students: i64,
    pub today_present: i64,
    pub today_absent: i64,
    pub today_percentage: f64,
    pub daily_attendance: Vec<DailyCount>,
    pub top_attendees: Vec<TopAttendee>,
    pub absent_today: Vec<StudentRef>,
}

/// Read-only aggregation over the store. Every call leaves an audit entry.
#[derive(Clone)]
pub struct ReportingService {
    store: AttendanceStore,
}

impl ReportingService {
    pub fn new(store: AttendanceStore) -> Self {
        Self { store }
    }

    pub async fn dashboard(
        &self,
        window_days: u32,
        class_section: Option<&str>,
    ) -> Result<Dashboard, AttendanceError> {
        self.dashboard_on(Utc::now().date_naive(), window_days, class_section)
            .await
    }

    /// Dashboard as seen on `today`. `daily_attendance` covers
    /// `today - window_days ..= today`, zero-filled.
    pub async fn dashboard_on(
        &self,
        today: NaiveDate,
        window_days: u32,
        class_section: Option<&str>,
    ) -> Result<Dashboard, AttendanceError> {
        let window_days = window_days.min(MAX_WINDOW_DAYS);
        let (present, absent) = self.store.presence_on(today, class_section).await?;
        let today_present = present.len() as i64;
        let total_students = today_present + absent.len() as i64;
        let today_absent = (total_students - today_present).max(0);

        let since = today
            .checked_sub_days(Days::new(u64::from(window_days)))
            .unwrap_or(today);
        let counts: HashMap<NaiveDate, i64> = self
            .store
            .daily_counts(since, class_section)
            .await?
            .into_iter()
            .collect();
        let daily_attendance = since
            .iter_days()
            .take_while(|day| *day <= today)
            .map(|date| DailyCount {
                date,
                count: counts.get(&date).copied().unwrap_or(0),
            })
            .collect();

        let top_attendees = self.store.top_attendees(class_section, TOP_ATTENDEES).await?;

        self.store
            .log_action(
                AuditAction::ViewDashboard,
                format!(
                    "Dashboard viewed for {} ({} day window)",
                    class_section.unwrap_or("All"),
                    window_days
                ),
            )
            .await?;

        let today_percentage = if total_students > 0 {
            round2(today_present as f64 / total_students as f64 * 100.0)
        } else {
            0.0
        };

        Ok(Dashboard {
            total_students,
            today_present,
            today_absent,
            today_percentage,
            daily_attendance,
            top_attendees,
            absent_today: absent,
        })
    }

    /// CSV of every record in range, newest first.
    pub async fn export_csv(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        class_section: Option<&str>,
    ) -> Result<Vec<u8>, AttendanceError> {
        let rows = self.store.export_rows(start, end, class_section).await?;
        let body = render_csv(&rows)?;
        self.store
            .log_action(
                AuditAction::ExportCsv,
                format!("Attendance exported for {start} to {end}"),
            )
            .await?;
        info!(%start, %end, rows = rows.len(), "csv export generated");
        Ok(body)
    }

    /// PDF summary of days present per student. `None` reports every section.
    pub async fn export_pdf(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        class_section: Option<&str>,
    ) -> Result<Vec<u8>, AttendanceError> {
        let total = total_days(start, end);
        let rows: Vec<RangeRecord> = self
            .store
            .days_present(start, end, class_section)
            .await?
            .into_iter()
            .map(|row| RangeRecord {
                percentage: attendance_percentage(row.days_present, total),
                student_id: row.student_id,
                name: row.name,
                days_present: row.days_present,
                total_days: total,
            })
            .collect();

        let body = render_pdf(&PdfReport {
            start,
            end,
            class_label: class_section.unwrap_or("All"),
            total_days: total,
            rows: &rows,
        })?;
        self.store
            .log_action(
                AuditAction::ExportPdf,
                format!("PDF report generated for {start} to {end}"),
            )
            .await?;
        info!(%start, %end, students = rows.len(), "pdf report generated");
        Ok(body)
    }

    pub async fn audit_trail(&self, limit: i64) -> Result<Vec<AuditLogEntry>, AttendanceError> {
        self.store
            .recent_audit(limit.clamp(1, MAX_AUDIT_LIMIT))
            .await
    }
}

pub fn render_csv(rows: &[ExportRow]) -> Result<Vec<u8>, AttendanceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(csv_err)?;
    for row in rows {
        let timestamp = format_timestamp(row.timestamp);
        writer
            .write_record([
                row.student_id.as_str(),
                row.name.as_str(),
                row.email.as_deref().unwrap_or(""),
                row.class_section.as_str(),
                timestamp.as_str(),
                row.marked_by.as_str(),
            ])
            .map_err(csv_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| AttendanceError::Io(e.into_error()))
}

fn csv_err(e: csv::Error) -> AttendanceError {
    AttendanceError::Report(e.to_string())
}
