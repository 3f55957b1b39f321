use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum AttendanceError {
    #[error("{0}")]
    Validation(String),

    #[error("Student ID {0} already exists")]
    DuplicateStudent(String),

    #[error("Class {0} already exists")]
    DuplicateClass(String),

    #[error("No face detected in image")]
    NoFaceDetected,

    #[error("Multiple faces detected ({0}). Please use an image with only one face")]
    MultipleFacesDetected(usize),

    #[error("No students registered in class {0}")]
    EmptyRoster(String),

    #[error("Face not recognized")]
    NoMatch,

    #[error("Student {0} not found")]
    StudentNotFound(String),

    #[error("Invalid password")]
    AuthFailure,

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("Recognition service error: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report rendering error: {0}")]
    Report(String),
}

impl AttendanceError {
    /// Map a store error, turning a UNIQUE violation into the given domain error.
    pub(crate) fn on_unique_violation(e: SqlxError, duplicate: impl FnOnce() -> Self) -> Self {
        match &e {
            SqlxError::Database(db) if db.is_unique_violation() => duplicate(),
            _ => AttendanceError::Database(e),
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AttendanceError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AttendanceError::DuplicateStudent(_) => (StatusCode::BAD_REQUEST, "DUPLICATE_STUDENT"),
            AttendanceError::DuplicateClass(_) => (StatusCode::BAD_REQUEST, "DUPLICATE_CLASS"),
            AttendanceError::NoFaceDetected => (StatusCode::BAD_REQUEST, "NO_FACE_DETECTED"),
            AttendanceError::MultipleFacesDetected(_) => {
                (StatusCode::BAD_REQUEST, "MULTIPLE_FACES_DETECTED")
            }
            AttendanceError::EmptyRoster(_) => (StatusCode::BAD_REQUEST, "EMPTY_ROSTER"),
            AttendanceError::AuthFailure => (StatusCode::UNAUTHORIZED, "AUTH_FAILURE"),
            AttendanceError::StudentNotFound(_) => (StatusCode::NOT_FOUND, "STUDENT_NOT_FOUND"),
            AttendanceError::NoMatch => (StatusCode::NOT_FOUND, "NO_MATCH"),
            AttendanceError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
            }
            AttendanceError::Recognition(RecognitionError::Rejected { .. }) => {
                (StatusCode::BAD_REQUEST, "FACE_DETECTION_FAILED")
            }
            AttendanceError::Recognition(_) => (StatusCode::BAD_GATEWAY, "RECOGNITION_UNAVAILABLE"),
            AttendanceError::Database(_)
            | AttendanceError::Io(_)
            | AttendanceError::Report(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

/// Failures talking to the face recognition backend.
#[derive(Debug, ThisError)]
pub enum RecognitionError {
    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Face detection failed: {message}")]
    Rejected { message: String },

    #[error("service responded {status}: {message}")]
    Service { status: u16, message: String },

    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AttendanceError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();
        // Internal errors carry their raw text to the client.
        let body = ApiErrorBody {
            code: code.to_string(),
            message: self.to_string(),
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        let cases = [
            (AttendanceError::NoFaceDetected, StatusCode::BAD_REQUEST),
            (AttendanceError::MultipleFacesDetected(2), StatusCode::BAD_REQUEST),
            (AttendanceError::EmptyRoster("A".into()), StatusCode::BAD_REQUEST),
            (AttendanceError::NoMatch, StatusCode::NOT_FOUND),
            (AttendanceError::StudentNotFound("s1".into()), StatusCode::NOT_FOUND),
            (AttendanceError::AuthFailure, StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_and_code().0, status, "{err}");
        }
    }

    #[test]
    fn refused_images_are_client_errors_but_outages_are_gateway_errors() {
        let refused = AttendanceError::from(RecognitionError::Rejected {
            message: "cannot identify image file".into(),
        });
        assert_eq!(
            refused.status_and_code(),
            (StatusCode::BAD_REQUEST, "FACE_DETECTION_FAILED")
        );

        let outage = AttendanceError::from(RecognitionError::Service {
            status: 503,
            message: "model loading".into(),
        });
        assert_eq!(outage.status_and_code().0, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn internal_errors_keep_raw_message() {
        let err = AttendanceError::Report("font table missing".into());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
        assert_eq!(err.to_string(), "Report rendering error: font table missing");
    }
}
