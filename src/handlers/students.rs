use crate::db::models::default_class;
use crate::db::{NewStudent, Student};
use crate::handlers::non_empty;
use crate::middleware::{ApiJson, ApiQuery};
use crate::service::BulkOutcome;
use crate::types::DataUriImage;
use crate::{AttendanceError, router::AppState};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub student_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_class")]
    pub class_section: String,
    pub image: DataUriImage,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    #[serde(default)]
    pub students: Vec<NewStudent>,
}

#[derive(Debug, Deserialize)]
pub struct ListStudentsQuery {
    pub class_section: Option<String>,
    #[serde(default)]
    pub search: String,
}

/// POST /students
pub async fn register_student(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<Json<Value>, AttendanceError> {
    let new = NewStudent {
        name: req.name,
        student_id: req.student_id,
        email: req.email,
        class_section: req.class_section,
    };
    let student = state
        .attendance
        .register_student(new, &req.image.bytes)
        .await?;
    Ok(Json(json!({
        "message": format!("Student {} registered successfully", student.name),
        "student": student,
    })))
}

/// POST /students/bulk
pub async fn bulk_register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BulkRequest>,
) -> Result<Json<BulkOutcome>, AttendanceError> {
    Ok(Json(state.attendance.bulk_register(req.students).await?))
}

/// GET /students
pub async fn list_students(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListStudentsQuery>,
) -> Result<Json<Vec<Student>>, AttendanceError> {
    let section = non_empty(query.class_section);
    let students = state
        .attendance
        .list_students(section.as_deref(), query.search.trim())
        .await?;
    Ok(Json(students))
}

/// DELETE /students/{student_id}
pub async fn delete_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<Value>, AttendanceError> {
    let deleted = state.attendance.delete_student(&student_id).await?;
    Ok(Json(json!({
        "message": "Student deleted successfully",
        "deleted": deleted,
    })))
}
