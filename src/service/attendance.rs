use crate::db::models::default_class;
use crate::db::{
    AttendanceEntry, AttendanceRecord, AttendanceStore, AuditAction, ClassSection, MarkedBy,
    NewStudent, Student,
};
use crate::error::AttendanceError;
use crate::service::image_store::{ImageStore, validate_student_id};
use crate::service::period::{attendance_percentage, total_days};
use crate::service::recognizer::{FaceRecognizer, Verification};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a bulk import: rows inserted plus one message per rejected row.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BulkOutcome {
    pub success: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecognitionMatch {
    pub student_id: String,
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RangeRecord {
    pub student_id: String,
    pub name: String,
    pub days_present: i64,
    pub total_days: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AttendanceRange {
    pub records: Vec<RangeRecord>,
    pub total_days: i64,
}

/// Registration, marking and roster queries.
#[derive(Clone)]
pub struct AttendanceService {
    store: AttendanceStore,
    images: ImageStore,
    recognizer: Arc<dyn FaceRecognizer>,
}

impl AttendanceService {
    pub fn new(
        store: AttendanceStore,
        images: ImageStore,
        recognizer: Arc<dyn FaceRecognizer>,
    ) -> Self {
        Self {
            store,
            images,
            recognizer,
        }
    }

    pub fn store(&self) -> &AttendanceStore {
        &self.store
    }

    /// Register a student with a reference image holding exactly one face.
    ///
    /// The row is inserted before the image is written, so a duplicate id never
    /// touches the existing student's image.
    pub async fn register_student(
        &self,
        new: NewStudent,
        image: &[u8],
    ) -> Result<Student, AttendanceError> {
        let new = normalize(new)?;
        if image.is_empty() {
            return Err(AttendanceError::Validation(
                "missing required field: image".to_string(),
            ));
        }

        let faces = self.count_faces(image).await?;
        match faces {
            0 => return Err(AttendanceError::NoFaceDetected),
            1 => {}
            n => return Err(AttendanceError::MultipleFacesDetected(n)),
        }

        let reference = self.images.reference_path(&new.student_id)?;
        let reference_text = reference.to_string_lossy().into_owned();
        let student = self
            .store
            .insert_student(&new, Some(&reference_text), Utc::now().naive_utc())
            .await?;

        if let Err(e) = self.images.save_reference(&new.student_id, image).await {
            warn!(student_id = %new.student_id, error = %e, "reference image write failed; rolling back");
            if let Err(rollback) = self.store.remove_student_row(&new.student_id).await {
                error!(student_id = %new.student_id, error = %rollback, "failed to remove student row after image write failure");
            }
            return Err(e);
        }

        self.store
            .log_action(
                AuditAction::RegisterStudent,
                format!("Student {} ({}) registered", student.name, student.student_id),
            )
            .await?;
        info!(student_id = %student.student_id, class_section = %student.class_section, "student registered");
        Ok(student)
    }

    /// Insert students without images. Row failures are collected, never fatal.
    pub async fn bulk_register(
        &self,
        rows: Vec<NewStudent>,
    ) -> Result<BulkOutcome, AttendanceError> {
        let now = Utc::now().naive_utc();
        let mut outcome = BulkOutcome {
            success: 0,
            errors: Vec::new(),
        };

        for (index, row) in rows.into_iter().enumerate() {
            let label = row.student_id.clone();
            let inserted = match normalize(row) {
                Ok(new) => self.store.insert_student(&new, None, now).await,
                Err(e) => Err(e),
            };
            match inserted {
                Ok(_) => outcome.success += 1,
                Err(e) => {
                    debug!(student_id = %label, error = %e, "bulk row rejected");
                    let message = match e {
                        AttendanceError::Validation(msg) => format!("Row {}: {msg}", index + 1),
                        other => other.to_string(),
                    };
                    outcome.errors.push(message);
                }
            }
        }

        self.store
            .log_action(
                AuditAction::BulkRegister,
                format!("{} students registered", outcome.success),
            )
            .await?;
        info!(
            success = outcome.success,
            failed = outcome.errors.len(),
            "bulk registration finished"
        );
        Ok(outcome)
    }

    /// Match a probe image against the section roster and mark the first
    /// verified student present.
    ///
    /// Candidates are tried in roster order and the scan stops at the first
    /// verified one; it is not a best-of-N search.
    pub async fn recognize(
        &self,
        image: &[u8],
        class_section: &str,
    ) -> Result<RecognitionMatch, AttendanceError> {
        if image.is_empty() {
            return Err(AttendanceError::Validation(
                "missing required field: image".to_string(),
            ));
        }
        let probe = self.images.write_probe(image)?;

        let faces = self.recognizer.detect_face_count(probe.path()).await?;
        if faces == 0 {
            return Err(AttendanceError::NoFaceDetected);
        }

        let roster = self.store.roster(class_section).await?;
        if roster.is_empty() {
            return Err(AttendanceError::EmptyRoster(class_section.to_string()));
        }

        let mut matched: Option<(Student, Verification)> = None;
        for student in roster {
            let Some(reference) = student.image_path.as_deref() else {
                debug!(student_id = %student.student_id, "no reference image; skipping");
                continue;
            };
            match self
                .recognizer
                .verify(probe.path(), Path::new(reference))
                .await
            {
                Ok(v) if v.verified => {
                    matched = Some((student, v));
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(student_id = %student.student_id, error = %e, "verification failed; skipping candidate");
                }
            }
        }
        drop(probe);

        let Some((student, verification)) = matched else {
            info!(class_section, "probe did not match any student");
            return Err(AttendanceError::NoMatch);
        };

        self.store
            .insert_attendance(
                &student.student_id,
                MarkedBy::Auto,
                class_section,
                Utc::now().naive_utc(),
            )
            .await?;
        self.store
            .log_action(
                AuditAction::MarkAttendance,
                format!("Auto: {} ({})", student.name, student.student_id),
            )
            .await?;
        info!(
            student_id = %student.student_id,
            distance = verification.distance,
            "attendance marked by recognition"
        );

        Ok(RecognitionMatch {
            student_id: student.student_id,
            name: student.name,
            confidence: verification.confidence(),
        })
    }

    /// Mark a student present by hand. Same-day repeats are recorded again.
    pub async fn mark_manual(
        &self,
        student_id: &str,
        class_section: &str,
    ) -> Result<(Student, AttendanceRecord), AttendanceError> {
        let student = self
            .store
            .get_student(student_id)
            .await?
            .ok_or_else(|| AttendanceError::StudentNotFound(student_id.to_string()))?;

        let record = self
            .store
            .insert_attendance(
                student_id,
                MarkedBy::Manual,
                class_section,
                Utc::now().naive_utc(),
            )
            .await?;
        self.store
            .log_action(
                AuditAction::MarkAttendance,
                format!("Manual: {} ({})", student.name, student.student_id),
            )
            .await?;
        info!(student_id, class_section, "attendance marked manually");
        Ok((student, record))
    }

    /// Remove a student, its attendance and its reference image.
    /// Returns `false` when there was nothing to delete.
    pub async fn delete_student(&self, student_id: &str) -> Result<bool, AttendanceError> {
        let Some(student) = self.store.delete_student(student_id).await? else {
            debug!(student_id, "delete requested for unknown student");
            return Ok(false);
        };

        if let Some(path) = student.image_path.as_deref() {
            let removed = self.images.remove_reference(Path::new(path)).await?;
            debug!(student_id, removed, "reference image cleanup");
        }

        self.store
            .log_action(
                AuditAction::DeleteStudent,
                format!("{} ({})", student.name, student.student_id),
            )
            .await?;
        info!(student_id, "student deleted");
        Ok(true)
    }

    pub async fn list_students(
        &self,
        class_section: Option<&str>,
        search: &str,
    ) -> Result<Vec<Student>, AttendanceError> {
        self.store.list_students(class_section, search).await
    }

    pub async fn list_attendance(
        &self,
        date: NaiveDate,
        class_section: Option<&str>,
    ) -> Result<Vec<AttendanceEntry>, AttendanceError> {
        self.store.attendance_on(date, class_section).await
    }

    /// Per-student distinct present days over `[start, end]` as a share of
    /// the calendar days in range.
    pub async fn list_attendance_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        class_section: Option<&str>,
    ) -> Result<AttendanceRange, AttendanceError> {
        let total = total_days(start, end);
        let records = self
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
        Ok(AttendanceRange {
            records,
            total_days: total,
        })
    }

    pub async fn list_classes(&self) -> Result<Vec<ClassSection>, AttendanceError> {
        self.store.list_classes().await
    }

    pub async fn create_class(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<ClassSection, AttendanceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AttendanceError::Validation(
                "missing required field: class_name".to_string(),
            ));
        }
        let class = self.store.insert_class(name, description).await?;
        self.store
            .log_action(AuditAction::CreateClass, format!("Class {name} created"))
            .await?;
        info!(class_section = name, "class created");
        Ok(class)
    }

    async fn count_faces(&self, image: &[u8]) -> Result<usize, AttendanceError> {
        let probe = self.images.write_probe(image)?;
        let faces = self.recognizer.detect_face_count(probe.path()).await?;
        debug!(faces, "faces detected in submitted image");
        Ok(faces)
    }
}

fn normalize(new: NewStudent) -> Result<NewStudent, AttendanceError> {
    let name = new.name.trim().to_string();
    if name.is_empty() {
        return Err(AttendanceError::Validation(
            "missing required field: name".to_string(),
        ));
    }
    if new.student_id.trim().is_empty() {
        return Err(AttendanceError::Validation(
            "missing required field: student_id".to_string(),
        ));
    }
    validate_student_id(&new.student_id)?;

    let class_section = match new.class_section.trim() {
        "" => default_class(),
        section => section.to_string(),
    };
    Ok(NewStudent {
        name,
        student_id: new.student_id,
        email: new.email.filter(|e| !e.trim().is_empty()),
        class_section,
    })
}
