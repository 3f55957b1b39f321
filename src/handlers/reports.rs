use crate::db::AuditLogEntry;
use crate::handlers::non_empty;
use crate::middleware::ApiQuery;
use crate::service::Dashboard;
use crate::service::period::parse_date;
use crate::{AttendanceError, router::AppState};
use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

const DEFAULT_WINDOW_DAYS: u32 = 7;
const DEFAULT_AUDIT_LIMIT: i64 = 50;
/// Class label that means "every section" in the PDF report.
const ALL_CLASSES: &str = "All";

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub days: Option<u32>,
    pub class_section: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub class_section: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

/// GET /analytics/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DashboardQuery>,
) -> Result<Json<Dashboard>, AttendanceError> {
    let section = non_empty(query.class_section);
    let dashboard = state
        .reporting
        .dashboard(query.days.unwrap_or(DEFAULT_WINDOW_DAYS), section.as_deref())
        .await?;
    Ok(Json(dashboard))
}

/// GET /export/csv
pub async fn export_csv(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<Response, AttendanceError> {
    let start = parse_date("start_date", query.start_date.as_deref())?;
    let end = parse_date("end_date", query.end_date.as_deref())?;
    let section = non_empty(query.class_section);
    let body = state
        .reporting
        .export_csv(start, end, section.as_deref())
        .await?;
    Ok(attachment(
        "text/csv; charset=utf-8",
        format!("attendance_{start}_{end}.csv"),
        body,
    ))
}

/// GET /export/pdf
pub async fn export_pdf(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<Response, AttendanceError> {
    let start = parse_date("start_date", query.start_date.as_deref())?;
    let end = parse_date("end_date", query.end_date.as_deref())?;
    let section = non_empty(query.class_section).filter(|s| s != ALL_CLASSES);
    let body = state
        .reporting
        .export_pdf(start, end, section.as_deref())
        .await?;
    Ok(attachment(
        "application/pdf",
        format!("attendance_report_{start}_{end}.pdf"),
        body,
    ))
}

/// GET /audit-logs
pub async fn audit_logs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AuditQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, AttendanceError> {
    let entries = state
        .reporting
        .audit_trail(query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT))
        .await?;
    Ok(Json(entries))
}

fn attachment(content_type: &str, filename: String, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}
