mod support;

use chrono::NaiveDate;
use rollcall::AttendanceError;
use rollcall::db::MarkedBy;
use rollcall::error::RecognitionError;
use rollcall::service::{AttendanceService, ImageStore};
use std::sync::Arc;
use support::{MATCH_DISTANCE, ScriptedRecognizer, TestContext, face, student};

fn at(y: i32, m: u32, d: u32, h: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, 0, 0))
        .expect("valid timestamp")
}

#[tokio::test]
async fn duplicate_registration_keeps_the_first_student() {
    let ctx = TestContext::new().await;
    ctx.attendance
        .register_student(student("Alice", "s1", "A"), &face("alice"))
        .await
        .expect("first registration");

    let err = ctx
        .attendance
        .register_student(student("Mallory", "s1", "A"), &face("mallory"))
        .await
        .expect_err("duplicate id must fail");
    assert!(matches!(err, AttendanceError::DuplicateStudent(ref id) if id == "s1"));

    let stored = ctx.store.get_student("s1").await.unwrap().expect("row kept");
    assert_eq!(stored.name, "Alice");
    let reference = ctx.images.reference_path("s1").unwrap();
    assert_eq!(std::fs::read(reference).unwrap(), face("alice"));
    assert_eq!(ctx.store.count_students(None).await.unwrap(), 1);
}

#[tokio::test]
async fn registration_requires_exactly_one_face() {
    let ctx = TestContext::new().await;

    let none = ctx
        .attendance
        .register_student(student("Alice", "s1", "A"), b"landscape")
        .await
        .expect_err("no face");
    assert!(matches!(none, AttendanceError::NoFaceDetected));

    let many = ctx
        .attendance
        .register_student(student("Alice", "s1", "A"), &face("alice,bob"))
        .await
        .expect_err("two faces");
    assert!(matches!(many, AttendanceError::MultipleFacesDetected(2)));

    assert_eq!(ctx.store.count_students(None).await.unwrap(), 0);
    assert!(!ctx.images.reference_path("s1").unwrap().exists());
    assert_eq!(ctx.scratch_entries(), 0);
}

#[tokio::test]
async fn registration_rejects_ids_that_are_not_file_names() {
    let ctx = TestContext::new().await;
    let err = ctx
        .attendance
        .register_student(student("Eve", "../etc", "A"), &face("eve"))
        .await
        .expect_err("path traversal id");
    assert!(matches!(err, AttendanceError::Validation(_)));
}

#[tokio::test]
async fn recognize_on_empty_section_fails() {
    let ctx = TestContext::new().await;
    ctx.attendance
        .register_student(student("Alice", "s1", "A"), &face("alice"))
        .await
        .unwrap();

    let err = ctx
        .attendance
        .recognize(&face("alice"), "B")
        .await
        .expect_err("section B has nobody");
    assert!(matches!(err, AttendanceError::EmptyRoster(ref s) if s == "B"));
}

#[tokio::test]
async fn recognize_marks_the_matched_student_once() {
    let ctx = TestContext::new().await;
    ctx.attendance
        .register_student(student("Alice", "s1", "A"), &face("alice"))
        .await
        .unwrap();
    ctx.attendance
        .register_student(student("Bob", "s2", "A"), &face("bob"))
        .await
        .unwrap();

    let matched = ctx.attendance.recognize(&face("bob"), "A").await.unwrap();
    assert_eq!(matched.student_id, "s2");
    assert_eq!(matched.name, "Bob");
    assert!((matched.confidence - (1.0 - MATCH_DISTANCE)).abs() < 1e-9);

    let bob = ctx.store.attendance_for_student("s2").await.unwrap();
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0].marked_by, MarkedBy::Auto);
    assert_eq!(bob[0].class_section, "A");
    assert!(ctx.store.attendance_for_student("s1").await.unwrap().is_empty());
    assert_eq!(ctx.scratch_entries(), 0);
}

#[tokio::test]
async fn recognize_without_match_or_face_records_nothing() {
    let ctx = TestContext::new().await;
    ctx.attendance
        .register_student(student("Alice", "s1", "A"), &face("alice"))
        .await
        .unwrap();

    let err = ctx.attendance.recognize(&face("zoe"), "A").await.unwrap_err();
    assert!(matches!(err, AttendanceError::NoMatch));

    let err = ctx.attendance.recognize(b"empty room", "A").await.unwrap_err();
    assert!(matches!(err, AttendanceError::NoFaceDetected));

    assert!(ctx.store.attendance_for_student("s1").await.unwrap().is_empty());
    assert_eq!(ctx.scratch_entries(), 0);
}

#[tokio::test]
async fn recognize_takes_the_first_verified_student_in_roster_order() {
    let ctx = TestContext::new().await;
    ctx.attendance
        .register_student(student("Alice", "s1", "A"), &face("alice"))
        .await
        .unwrap();
    ctx.attendance
        .register_student(student("Bob", "s2", "A"), &face("bob"))
        .await
        .unwrap();

    let matched = ctx
        .attendance
        .recognize(&face("bob,alice"), "A")
        .await
        .unwrap();
    assert_eq!(matched.student_id, "s1");
    assert_eq!(ctx.store.attendance_for_student("s1").await.unwrap().len(), 1);
    assert!(ctx.store.attendance_for_student("s2").await.unwrap().is_empty());
}

#[tokio::test]
async fn registration_surfaces_images_the_detector_refuses() {
    let ctx = TestContext::new().await;
    let err = ctx
        .attendance
        .register_student(student("Alice", "s1", "A"), b"refused")
        .await
        .expect_err("undecodable image");
    assert!(matches!(
        err,
        AttendanceError::Recognition(RecognitionError::Rejected { .. })
    ));
    assert_eq!(ctx.store.count_students(None).await.unwrap(), 0);
}

#[tokio::test]
async fn failed_image_write_rolls_back_the_student_row() {
    let ctx = TestContext::new().await;
    let blocked = ctx.dir.path().join("faces-is-a-file");
    std::fs::write(&blocked, b"not a directory").unwrap();
    let service = AttendanceService::new(
        ctx.store.clone(),
        ImageStore::new(&blocked, ctx.dir.path().join("scratch")),
        Arc::new(ScriptedRecognizer),
    );

    let err = service
        .register_student(student("Alice", "s1", "A"), &face("alice"))
        .await
        .expect_err("faces dir cannot be created");
    assert!(matches!(err, AttendanceError::Io(_)), "{err}");
    assert!(ctx.store.get_student("s1").await.unwrap().is_none());
}

#[tokio::test]
async fn recognize_skips_candidates_the_adapter_cannot_verify() {
    let ctx = TestContext::new().await;
    ctx.attendance
        .register_student(student("Carol", "s1", "A"), &face("carol"))
        .await
        .unwrap();
    ctx.attendance
        .register_student(student("Dave", "s2", "A"), &face("dave"))
        .await
        .unwrap();
    std::fs::write(ctx.images.reference_path("s1").unwrap(), "corrupt").unwrap();

    let matched = ctx.attendance.recognize(&face("dave"), "A").await.unwrap();
    assert_eq!(matched.student_id, "s2");
}

#[tokio::test]
async fn recognize_skips_students_without_reference_image() {
    let ctx = TestContext::new().await;
    let outcome = ctx
        .attendance
        .bulk_register(vec![student("Imported", "b1", "A")])
        .await
        .unwrap();
    assert_eq!(outcome.success, 1);

    let err = ctx.attendance.recognize(&face("imported"), "A").await.unwrap_err();
    assert!(matches!(err, AttendanceError::NoMatch));
}

#[tokio::test]
async fn range_percentage_counts_distinct_days() {
    let ctx = TestContext::new().await;
    ctx.attendance
        .register_student(student("Alice", "s1", "A"), &face("alice"))
        .await
        .unwrap();
    ctx.attendance
        .register_student(student("Bob", "s2", "A"), &face("bob"))
        .await
        .unwrap();
    for ts in [at(2024, 1, 2, 8), at(2024, 1, 2, 14), at(2024, 1, 4, 9), at(2024, 1, 9, 9)] {
        ctx.store
            .insert_attendance("s1", MarkedBy::Manual, "A", ts)
            .await
            .unwrap();
    }

    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    let range = ctx
        .attendance
        .list_attendance_range(start, end, Some("A"))
        .await
        .unwrap();

    assert_eq!(range.total_days, 5);
    let alice = range.records.iter().find(|r| r.student_id == "s1").unwrap();
    assert_eq!(alice.days_present, 2);
    assert_eq!(alice.percentage, 40.0);
    let bob = range.records.iter().find(|r| r.student_id == "s2").unwrap();
    assert_eq!(bob.days_present, 0);
    assert_eq!(bob.percentage, 0.0);
}

#[tokio::test]
async fn reversed_range_reports_zero_days() {
    let ctx = TestContext::new().await;
    ctx.attendance
        .register_student(student("Alice", "s1", "A"), &face("alice"))
        .await
        .unwrap();

    let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let range = ctx
        .attendance
        .list_attendance_range(start, end, None)
        .await
        .unwrap();
    assert_eq!(range.total_days, 0);
    assert!(range.records.iter().all(|r| r.percentage == 0.0));
}

#[tokio::test]
async fn delete_removes_records_and_image_and_is_idempotent() {
    let ctx = TestContext::new().await;
    ctx.attendance
        .register_student(student("Alice", "s1", "A"), &face("alice"))
        .await
        .unwrap();
    ctx.attendance.mark_manual("s1", "A").await.unwrap();
    let reference = ctx.images.reference_path("s1").unwrap();
    assert!(reference.exists());

    assert!(ctx.attendance.delete_student("s1").await.unwrap());
    assert!(ctx.store.get_student("s1").await.unwrap().is_none());
    assert!(ctx.store.attendance_for_student("s1").await.unwrap().is_empty());
    assert!(!reference.exists());

    assert!(!ctx.attendance.delete_student("s1").await.unwrap());
}

#[tokio::test]
async fn bulk_register_collects_row_errors() {
    let ctx = TestContext::new().await;
    ctx.attendance
        .register_student(student("Alice", "s1", "A"), &face("alice"))
        .await
        .unwrap();

    let outcome = ctx
        .attendance
        .bulk_register(vec![
            student("Bob", "s2", "A"),
            student("Alice Again", "s1", "A"),
            student("Carol", "s3", "B"),
            student("Dave", "s4", ""),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.success, 3);
    assert_eq!(outcome.errors, vec!["Student ID s1 already exists".to_string()]);
    for id in ["s2", "s3", "s4"] {
        assert!(ctx.store.get_student(id).await.unwrap().is_some(), "{id} persisted");
    }
    let dave = ctx.store.get_student("s4").await.unwrap().unwrap();
    assert_eq!(dave.class_section, "Default");
    assert!(dave.image_path.is_none());
}

#[tokio::test]
async fn bulk_register_reports_missing_fields_by_row() {
    let ctx = TestContext::new().await;
    let outcome = ctx
        .attendance
        .bulk_register(vec![student("Bob", "s2", "A"), student("", "s3", "A")])
        .await
        .unwrap();
    assert_eq!(outcome.success, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].starts_with("Row 2: "), "{:?}", outcome.errors);
}

#[tokio::test]
async fn manual_mark_requires_known_student_and_repeats_are_kept() {
    let ctx = TestContext::new().await;
    let err = ctx.attendance.mark_manual("ghost", "A").await.unwrap_err();
    assert!(matches!(err, AttendanceError::StudentNotFound(ref id) if id == "ghost"));

    ctx.attendance
        .register_student(student("Alice", "s1", "A"), &face("alice"))
        .await
        .unwrap();
    let (alice, record) = ctx.attendance.mark_manual("s1", "A").await.unwrap();
    assert_eq!(alice.name, "Alice");
    assert_eq!(record.marked_by, MarkedBy::Manual);
    ctx.attendance.mark_manual("s1", "A").await.unwrap();
    assert_eq!(ctx.store.attendance_for_student("s1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn list_students_filters_by_section_and_search() {
    let ctx = TestContext::new().await;
    ctx.attendance
        .bulk_register(vec![
            student("Alice Smith", "s1", "A"),
            student("Bob Stone", "s2", "A"),
            student("Carol Smith", "s3", "B"),
        ])
        .await
        .unwrap();

    let smiths = ctx.attendance.list_students(None, "smith").await.unwrap();
    assert_eq!(smiths.len(), 2);
    let section_a = ctx.attendance.list_students(Some("A"), "").await.unwrap();
    assert_eq!(section_a.len(), 2);
    let by_id = ctx.attendance.list_students(Some("B"), "s3").await.unwrap();
    assert_eq!(by_id.len(), 1);
    assert_eq!(by_id[0].name, "Carol Smith");
    assert!(ctx.attendance.list_students(None, "%").await.unwrap().is_empty());
}

#[tokio::test]
async fn classes_are_unique_and_default_exists() {
    let ctx = TestContext::new().await;
    let initial = ctx.attendance.list_classes().await.unwrap();
    assert!(initial.iter().any(|c| c.name == "Default"));

    ctx.attendance
        .create_class("CS101", Some("Intro"))
        .await
        .unwrap();
    let err = ctx.attendance.create_class("CS101", None).await.unwrap_err();
    assert!(matches!(err, AttendanceError::DuplicateClass(_)));
    assert_eq!(ctx.attendance.list_classes().await.unwrap().len(), 2);
}
