use crate::middleware::ApiJson;
use crate::{AttendanceError, router::AppState};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
}

/// POST /auth/login
pub async fn login(State(state): State<AppState>, ApiJson(req): ApiJson<LoginRequest>) -> Response {
    match state.admin.login(&req.password).await {
        Ok(()) => Json(LoginResponse {
            success: true,
            message: "Login successful".to_string(),
        })
        .into_response(),
        Err(AttendanceError::AuthFailure) => (
            StatusCode::UNAUTHORIZED,
            Json(LoginResponse {
                success: false,
                message: "Invalid password".to_string(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
