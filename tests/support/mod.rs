//! Shared fixtures: a scripted face recognizer and a temp-dir backed context.
#![allow(dead_code)]

use futures::future::BoxFuture;
use rollcall::db::AttendanceStore;
use rollcall::error::RecognitionError;
use rollcall::router::{AppState, RouterOptions, attendance_router};
use rollcall::service::{
    AdminAuth, AttendanceService, FaceRecognizer, ImageStore, PasswordAuthenticator,
    ReportingService, Verification,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const ADMIN_PASSWORD: &str = "admin123";
pub const MATCH_DISTANCE: f64 = 0.3;

/// Reads the image "contents" as a script instead of pixels.
///
/// - `faces:alice,bob` holds two faces, named alice and bob.
/// - `corrupt` makes every call fail.
/// - `refused` is turned away as undecodable by detection.
/// - anything else holds no face.
///
/// A probe verifies against a reference when it contains one of the
/// reference's faces.
pub struct ScriptedRecognizer;

enum Script {
    Faces(Vec<String>),
    Corrupt,
    Refused,
}

async fn read_script(path: &Path) -> Result<Script, RecognitionError> {
    let text = tokio::fs::read_to_string(path).await?;
    let text = text.trim();
    match text {
        "corrupt" => return Ok(Script::Corrupt),
        "refused" => return Ok(Script::Refused),
        _ => {}
    }
    let names = text
        .strip_prefix("faces:")
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(Script::Faces(names))
}

fn unreadable() -> RecognitionError {
    RecognitionError::Service {
        status: 500,
        message: "image could not be decoded".to_string(),
    }
}

impl FaceRecognizer for ScriptedRecognizer {
    fn detect_face_count<'a>(
        &'a self,
        image: &'a Path,
    ) -> BoxFuture<'a, Result<usize, RecognitionError>> {
        Box::pin(async move {
            match read_script(image).await? {
                Script::Faces(names) => Ok(names.len()),
                Script::Corrupt => Err(unreadable()),
                Script::Refused => Err(RecognitionError::Rejected {
                    message: "cannot identify image file".to_string(),
                }),
            }
        })
    }

    fn verify<'a>(
        &'a self,
        probe: &'a Path,
        reference: &'a Path,
    ) -> BoxFuture<'a, Result<Verification, RecognitionError>> {
        Box::pin(async move {
            let (Script::Faces(probe), Script::Faces(reference)) =
                (read_script(probe).await?, read_script(reference).await?)
            else {
                return Err(unreadable());
            };
            let verified = reference.iter().any(|name| probe.contains(name));
            Ok(Verification {
                verified,
                distance: if verified { MATCH_DISTANCE } else { 0.9 },
            })
        })
    }
}

pub fn face(names: &str) -> Vec<u8> {
    format!("faces:{names}").into_bytes()
}

/// Services wired to a throwaway database and image directories.
pub struct TestContext {
    pub dir: TempDir,
    pub store: AttendanceStore,
    pub images: ImageStore,
    pub attendance: AttendanceService,
    pub reporting: ReportingService,
    pub admin: AdminAuth,
}

impl TestContext {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let database_url = format!("sqlite:{}", dir.path().join("attendance.db").display());
        let store = AttendanceStore::connect(&database_url)
            .await
            .expect("failed to open test database");
        let images = ImageStore::new(dir.path().join("faces"), dir.path().join("scratch"));
        images.ensure_dirs().await.expect("failed to create image dirs");

        let attendance =
            AttendanceService::new(store.clone(), images.clone(), Arc::new(ScriptedRecognizer));
        let reporting = ReportingService::new(store.clone());
        let admin = AdminAuth::new(
            Arc::new(PasswordAuthenticator::new(ADMIN_PASSWORD)),
            store.clone(),
        );
        Self {
            dir,
            store,
            images,
            attendance,
            reporting,
            admin,
        }
    }

    pub fn router(&self, max_body_bytes: usize) -> axum::Router {
        let state = AppState::new(
            self.attendance.clone(),
            self.reporting.clone(),
            self.admin.clone(),
        );
        attendance_router(
            state,
            &RouterOptions {
                max_body_bytes,
                cors_origins: Vec::new(),
            },
        )
    }

    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.images.scratch_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn student(name: &str, student_id: &str, class_section: &str) -> rollcall::db::NewStudent {
    rollcall::db::NewStudent {
        name: name.to_string(),
        student_id: student_id.to_string(),
        email: Some(format!("{student_id}@school.test")),
        class_section: class_section.to_string(),
    }
}
