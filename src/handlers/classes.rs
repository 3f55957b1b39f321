use crate::db::ClassSection;
use crate::middleware::ApiJson;
use crate::{AttendanceError, router::AppState};
use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub struct CreateClassRequest {
    pub class_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// GET /classes
pub async fn list_classes(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassSection>>, AttendanceError> {
    Ok(Json(state.attendance.list_classes().await?))
}

/// POST /classes
pub async fn create_class(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateClassRequest>,
) -> Result<Json<Value>, AttendanceError> {
    let class = state
        .attendance
        .create_class(&req.class_name, req.description.as_deref())
        .await?;
    Ok(Json(json!({
        "message": "Class created successfully",
        "class": class,
    })))
}
