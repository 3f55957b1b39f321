//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and conversions
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: `AttendanceStore`, the only type that issues SQL

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{
    AttendanceEntry, AttendanceRecord, AuditAction, AuditLogEntry, ClassSection, DaysPresent,
    ExportRow, MarkedBy, NewStudent, Student, StudentRef, TopAttendee,
};
pub use schema::{DEFAULT_CLASS, SQLITE_INIT};
pub use sqlite::{AttendanceStore, SqlitePool};
