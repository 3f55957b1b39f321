use crate::handlers::{attendance, auth, classes, reports, students};
use crate::service::{AdminAuth, AttendanceService, ReportingService};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method},
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AttendanceError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub attendance: AttendanceService,
    pub reporting: ReportingService,
    pub admin: AdminAuth,
}

impl AppState {
    pub fn new(attendance: AttendanceService, reporting: ReportingService, admin: AdminAuth) -> Self {
        Self {
            attendance,
            reporting,
            admin,
        }
    }
}

/// Router options that come from configuration rather than state.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub max_body_bytes: usize,
    pub cors_origins: Vec<String>,
}

pub fn attendance_router(state: AppState, options: &RouterOptions) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(auth::login))
        .route(
            "/students",
            get(students::list_students).post(students::register_student),
        )
        .route("/students/bulk", post(students::bulk_register))
        .route("/students/{student_id}", delete(students::delete_student))
        .route("/recognize", post(attendance::recognize))
        .route("/attendance", get(attendance::daily_attendance))
        .route("/attendance/manual", post(attendance::mark_manual))
        .route("/attendance/range", get(attendance::attendance_range))
        .route("/analytics/dashboard", get(reports::dashboard))
        .route("/export/csv", get(reports::export_csv))
        .route("/export/pdf", get(reports::export_pdf))
        .route("/classes", get(classes::list_classes).post(classes::create_class))
        .route("/audit-logs", get(reports::audit_logs))
        .layer(DefaultBodyLimit::max(options.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&options.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(origins)
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, AttendanceError> {
    state.attendance.store().ping().await?;
    Ok(Json(json!({ "status": "healthy" })))
}
