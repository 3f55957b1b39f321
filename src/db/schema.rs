//! SQL DDL for initializing the attendance database.
//! SQLite-first design; timestamps are UTC text `YYYY-MM-DD HH:MM:SS`
//! so `DATE(timestamp)` groups records by calendar day.

/// Name of the class section that always exists.
pub const DEFAULT_CLASS: &str = "Default";

/// SQLite schema with:
/// - `students.student_id` UNIQUE (racing registrations fail on this constraint)
/// - `students.image_path` NULL for bulk-imported records
/// - `attendance` append-only, several rows per student per day allowed
/// - `classes.class_name` UNIQUE
/// - `audit_logs` append-only
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    student_id TEXT NOT NULL UNIQUE,
    email TEXT NULL,
    class_section TEXT NOT NULL DEFAULT 'Default',
    image_path TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT NOT NULL REFERENCES students(student_id),
    timestamp TEXT NOT NULL,
    marked_by TEXT NOT NULL DEFAULT 'auto',
    class_section TEXT NOT NULL DEFAULT 'Default'
);

CREATE INDEX IF NOT EXISTS idx_attendance_student_id ON attendance(student_id);
CREATE INDEX IF NOT EXISTS idx_attendance_timestamp ON attendance(timestamp);

CREATE TABLE IF NOT EXISTS classes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    class_name TEXT NOT NULL UNIQUE,
    description TEXT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    action TEXT NOT NULL,
    details TEXT NULL,
    timestamp TEXT NOT NULL
);

INSERT OR IGNORE INTO classes (class_name, description) VALUES ('Default', 'Default Class');
"#;
