use crate::db::AttendanceEntry;
use crate::db::models::default_class;
use crate::handlers::non_empty;
use crate::middleware::{ApiJson, ApiQuery};
use crate::service::AttendanceRange;
use crate::service::period::parse_date;
use crate::types::DataUriImage;
use crate::{AttendanceError, router::AppState};
use axum::{Json, extract::State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub struct RecognizeRequest {
    pub image: DataUriImage,
    #[serde(default = "default_class")]
    pub class_section: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualMarkRequest {
    pub student_id: String,
    #[serde(default = "default_class")]
    pub class_section: String,
}

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub date: Option<String>,
    pub class_section: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub class_section: Option<String>,
}

/// POST /recognize
pub async fn recognize(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RecognizeRequest>,
) -> Result<Json<Value>, AttendanceError> {
    let matched = state
        .attendance
        .recognize(&req.image.bytes, &req.class_section)
        .await?;
    Ok(Json(json!({ "recognized": [matched] })))
}

/// POST /attendance/manual
pub async fn mark_manual(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ManualMarkRequest>,
) -> Result<Json<Value>, AttendanceError> {
    let (student, record) = state
        .attendance
        .mark_manual(&req.student_id, &req.class_section)
        .await?;
    Ok(Json(json!({
        "message": format!("Attendance marked for {}", student.name),
        "record": record,
    })))
}

/// GET /attendance
pub async fn daily_attendance(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DailyQuery>,
) -> Result<Json<Vec<AttendanceEntry>>, AttendanceError> {
    let date = match non_empty(query.date) {
        Some(raw) => parse_date("date", Some(&raw))?,
        None => Utc::now().date_naive(),
    };
    let section = non_empty(query.class_section);
    let entries = state
        .attendance
        .list_attendance(date, section.as_deref())
        .await?;
    Ok(Json(entries))
}

/// GET /attendance/range
pub async fn attendance_range(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<AttendanceRange>, AttendanceError> {
    let start = parse_date("start_date", query.start_date.as_deref())?;
    let end = parse_date("end_date", query.end_date.as_deref())?;
    let section = non_empty(query.class_section);
    let range = state
        .attendance
        .list_attendance_range(start, end, section.as_deref())
        .await?;
    Ok(Json(range))
}
