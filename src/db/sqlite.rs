use crate::db::models::{
    AttendanceEntry, AttendanceRecord, AuditAction, AuditLogEntry, ClassSection, DaysPresent,
    ExportRow, MarkedBy, NewStudent, Student, StudentRef, TopAttendee, format_date,
    format_timestamp, parse_timestamp,
};
use crate::db::schema::SQLITE_INIT;
use crate::error::AttendanceError;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::debug;

pub type SqlitePool = Pool<Sqlite>;

/// All SQL issued by the service goes through this type.
///
/// Optional `class_section` filters are bound twice as `(? IS NULL OR col = ?)`
/// so each query has a single text.
#[derive(Clone)]
pub struct AttendanceStore {
    pool: SqlitePool,
}

impl AttendanceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, AttendanceError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), AttendanceError> {
        // execute multiple statements one by one (sqlx::query runs a single statement)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), AttendanceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ---- students ----

    /// Insert a student row. A UNIQUE violation on `student_id` becomes `DuplicateStudent`.
    pub async fn insert_student(
        &self,
        new: &NewStudent,
        image_path: Option<&str>,
        created_at: NaiveDateTime,
    ) -> Result<Student, AttendanceError> {
        let email = new.email.as_deref().filter(|e| !e.trim().is_empty());
        let id = sqlx::query(
            r#"INSERT INTO students (name, student_id, email, class_section, image_path, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&new.name)
        .bind(&new.student_id)
        .bind(email)
        .bind(&new.class_section)
        .bind(image_path)
        .bind(format_timestamp(created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AttendanceError::on_unique_violation(e, || {
                AttendanceError::DuplicateStudent(new.student_id.clone())
            })
        })?
        .last_insert_rowid();

        Ok(Student {
            id,
            student_id: new.student_id.clone(),
            name: new.name.clone(),
            email: email.map(str::to_string),
            class_section: new.class_section.clone(),
            image_path: image_path.map(str::to_string),
            created_at,
        })
    }

    pub async fn get_student(&self, student_id: &str) -> Result<Option<Student>, AttendanceError> {
        let row = sqlx::query(
            r#"SELECT id, student_id, name, email, class_section, image_path, created_at
               FROM students WHERE student_id = ?"#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_student).transpose()
    }

    /// Substring search on name or student id (SQLite `LIKE`, ASCII case-insensitive).
    pub async fn list_students(
        &self,
        class_section: Option<&str>,
        search: &str,
    ) -> Result<Vec<Student>, AttendanceError> {
        let pattern = format!("%{}%", escape_like(search));
        let rows = sqlx::query(
            r#"SELECT id, student_id, name, email, class_section, image_path, created_at
               FROM students
               WHERE (? IS NULL OR class_section = ?)
                 AND (name LIKE ? ESCAPE '\' OR student_id LIKE ? ESCAPE '\')
               ORDER BY id"#,
        )
        .bind(class_section)
        .bind(class_section)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_student).collect()
    }

    /// Students of one section in registration order; the recognition scan order.
    pub async fn roster(&self, class_section: &str) -> Result<Vec<Student>, AttendanceError> {
        let rows = sqlx::query(
            r#"SELECT id, student_id, name, email, class_section, image_path, created_at
               FROM students WHERE class_section = ? ORDER BY id"#,
        )
        .bind(class_section)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_student).collect()
    }

    pub async fn count_students(&self, class_section: Option<&str>) -> Result<i64, AttendanceError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM students WHERE (? IS NULL OR class_section = ?)")
                .bind(class_section)
                .bind(class_section)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn remove_student_row(&self, student_id: &str) -> Result<(), AttendanceError> {
        sqlx::query("DELETE FROM students WHERE student_id = ?")
            .bind(student_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a student and all of its attendance in one transaction.
    /// Returns the removed row, or `None` when nothing matched.
    pub async fn delete_student(&self, student_id: &str) -> Result<Option<Student>, AttendanceError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"SELECT id, student_id, name, email, class_section, image_path, created_at
               FROM students WHERE student_id = ?"#,
        )
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let student = Self::row_to_student(row)?;

        let removed = sqlx::query("DELETE FROM attendance WHERE student_id = ?")
            .bind(student_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM students WHERE student_id = ?")
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(student_id, attendance_removed = removed, "student row deleted");
        Ok(Some(student))
    }

    // ---- attendance ----

    pub async fn insert_attendance(
        &self,
        student_id: &str,
        marked_by: MarkedBy,
        class_section: &str,
        timestamp: NaiveDateTime,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let id = sqlx::query(
            "INSERT INTO attendance (student_id, timestamp, marked_by, class_section) VALUES (?, ?, ?, ?)",
        )
        .bind(student_id)
        .bind(format_timestamp(timestamp))
        .bind(marked_by.as_str())
        .bind(class_section)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(AttendanceRecord {
            id,
            student_id: student_id.to_string(),
            timestamp,
            marked_by,
            class_section: class_section.to_string(),
        })
    }

    pub async fn attendance_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let rows = sqlx::query(
            r#"SELECT id, student_id, timestamp, marked_by, class_section
               FROM attendance WHERE student_id = ? ORDER BY id"#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| -> Result<_, AttendanceError> {
                Ok(AttendanceRecord {
                    id: row.try_get("id")?,
                    student_id: row.try_get("student_id")?,
                    timestamp: decode_timestamp(&row, "timestamp")?,
                    marked_by: decode_marked_by(&row)?,
                    class_section: row.try_get("class_section")?,
                })
            })
            .collect()
    }

    /// Records of one calendar day, newest first.
    pub async fn attendance_on(
        &self,
        date: NaiveDate,
        class_section: Option<&str>,
    ) -> Result<Vec<AttendanceEntry>, AttendanceError> {
        let rows = sqlx::query(
            r#"SELECT a.student_id, s.name, a.timestamp, a.marked_by
               FROM attendance a
               JOIN students s ON a.student_id = s.student_id
               WHERE DATE(a.timestamp) = ? AND (? IS NULL OR a.class_section = ?)
               ORDER BY a.timestamp DESC, a.id DESC"#,
        )
        .bind(format_date(date))
        .bind(class_section)
        .bind(class_section)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| -> Result<_, AttendanceError> {
                Ok(AttendanceEntry {
                    student_id: row.try_get("student_id")?,
                    name: row.try_get("name")?,
                    timestamp: decode_timestamp(&row, "timestamp")?,
                    marked_by: decode_marked_by(&row)?,
                })
            })
            .collect()
    }

    /// Distinct present days per roster student in `[start, end]`, ordered by name.
    /// Students without records in range are included with zero.
    pub async fn days_present(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        class_section: Option<&str>,
    ) -> Result<Vec<DaysPresent>, AttendanceError> {
        let rows = sqlx::query(
            r#"SELECT s.student_id, s.name, COUNT(DISTINCT DATE(a.timestamp)) AS days_present
               FROM students s
               LEFT JOIN attendance a ON s.student_id = a.student_id
                    AND DATE(a.timestamp) BETWEEN ? AND ?
               WHERE (? IS NULL OR s.class_section = ?)
               GROUP BY s.student_id, s.name
               ORDER BY s.name, s.student_id"#,
        )
        .bind(format_date(start))
        .bind(format_date(end))
        .bind(class_section)
        .bind(class_section)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| -> Result<_, AttendanceError> {
                Ok(DaysPresent {
                    student_id: row.try_get("student_id")?,
                    name: row.try_get("name")?,
                    days_present: row.try_get("days_present")?,
                })
            })
            .collect()
    }

    /// Roster students split by whether they have a record on `date`.
    /// Returns `(present, absent)`; together they are exactly the roster.
    pub async fn presence_on(
        &self,
        date: NaiveDate,
        class_section: Option<&str>,
    ) -> Result<(Vec<StudentRef>, Vec<StudentRef>), AttendanceError> {
        let rows = sqlx::query(
            r#"SELECT s.student_id, s.name,
                      EXISTS (
                          SELECT 1 FROM attendance a
                          WHERE a.student_id = s.student_id
                            AND DATE(a.timestamp) = ?
                            AND (? IS NULL OR a.class_section = ?)
                      ) AS present
               FROM students s
               WHERE (? IS NULL OR s.class_section = ?)
               ORDER BY s.id"#,
        )
        .bind(format_date(date))
        .bind(class_section)
        .bind(class_section)
        .bind(class_section)
        .bind(class_section)
        .fetch_all(&self.pool)
        .await?;

        let mut present = Vec::new();
        let mut absent = Vec::new();
        for row in rows {
            let student = StudentRef {
                student_id: row.try_get("student_id")?,
                name: row.try_get("name")?,
            };
            let flag: i64 = row.try_get("present")?;
            if flag != 0 {
                present.push(student);
            } else {
                absent.push(student);
            }
        }
        Ok((present, absent))
    }

    /// Distinct students marked per day since `since` (inclusive), oldest first.
    pub async fn daily_counts(
        &self,
        since: NaiveDate,
        class_section: Option<&str>,
    ) -> Result<Vec<(NaiveDate, i64)>, AttendanceError> {
        let rows = sqlx::query(
            r#"SELECT DATE(timestamp) AS day, COUNT(DISTINCT student_id) AS present
               FROM attendance
               WHERE DATE(timestamp) >= ? AND (? IS NULL OR class_section = ?)
               GROUP BY DATE(timestamp)
               ORDER BY day"#,
        )
        .bind(format_date(since))
        .bind(class_section)
        .bind(class_section)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| -> Result<_, AttendanceError> {
                let day: String = row.try_get("day")?;
                let day = NaiveDate::parse_from_str(&day, crate::db::models::DATE_FORMAT)
                    .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
                Ok((day, row.try_get("present")?))
            })
            .collect()
    }

    /// Roster students ranked by all-time record count.
    pub async fn top_attendees(
        &self,
        class_section: Option<&str>,
        limit: i64,
    ) -> Result<Vec<TopAttendee>, AttendanceError> {
        let rows = sqlx::query(
            r#"SELECT s.student_id, s.name, COUNT(a.id) AS attendance_count
               FROM students s
               LEFT JOIN attendance a ON s.student_id = a.student_id
               WHERE (? IS NULL OR s.class_section = ?)
               GROUP BY s.student_id, s.name
               ORDER BY attendance_count DESC, s.id
               LIMIT ?"#,
        )
        .bind(class_section)
        .bind(class_section)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| -> Result<_, AttendanceError> {
                Ok(TopAttendee {
                    student_id: row.try_get("student_id")?,
                    name: row.try_get("name")?,
                    count: row.try_get("attendance_count")?,
                })
            })
            .collect()
    }

    /// Every record in `[start, end]` joined to student info, newest first.
    pub async fn export_rows(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        class_section: Option<&str>,
    ) -> Result<Vec<ExportRow>, AttendanceError> {
        let rows = sqlx::query(
            r#"SELECT a.student_id, s.name, s.email, s.class_section, a.timestamp, a.marked_by
               FROM attendance a
               JOIN students s ON a.student_id = s.student_id
               WHERE DATE(a.timestamp) BETWEEN ? AND ? AND (? IS NULL OR a.class_section = ?)
               ORDER BY a.timestamp DESC, a.id DESC"#,
        )
        .bind(format_date(start))
        .bind(format_date(end))
        .bind(class_section)
        .bind(class_section)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| -> Result<_, AttendanceError> {
                Ok(ExportRow {
                    student_id: row.try_get("student_id")?,
                    name: row.try_get("name")?,
                    email: row.try_get("email")?,
                    class_section: row.try_get("class_section")?,
                    timestamp: decode_timestamp(&row, "timestamp")?,
                    marked_by: decode_marked_by(&row)?,
                })
            })
            .collect()
    }

    // ---- classes ----

    pub async fn insert_class(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<ClassSection, AttendanceError> {
        sqlx::query("INSERT INTO classes (class_name, description, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(description)
            .bind(format_timestamp(Utc::now().naive_utc()))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AttendanceError::on_unique_violation(e, || {
                    AttendanceError::DuplicateClass(name.to_string())
                })
            })?;
        Ok(ClassSection {
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }

    pub async fn list_classes(&self) -> Result<Vec<ClassSection>, AttendanceError> {
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT class_name, description FROM classes ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(name, description)| ClassSection { name, description })
            .collect())
    }

    // ---- audit ----

    pub async fn log_action(
        &self,
        action: AuditAction,
        details: impl AsRef<str>,
    ) -> Result<(), AttendanceError> {
        sqlx::query("INSERT INTO audit_logs (action, details, timestamp) VALUES (?, ?, ?)")
            .bind(action.as_str())
            .bind(details.as_ref())
            .bind(format_timestamp(Utc::now().naive_utc()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Newest audit entries first.
    pub async fn recent_audit(&self, limit: i64) -> Result<Vec<AuditLogEntry>, AttendanceError> {
        let rows = sqlx::query(
            "SELECT action, details, timestamp FROM audit_logs ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| -> Result<_, AttendanceError> {
                Ok(AuditLogEntry {
                    action: row.try_get("action")?,
                    details: row.try_get("details")?,
                    timestamp: decode_timestamp(&row, "timestamp")?,
                })
            })
            .collect()
    }

    fn row_to_student(row: SqliteRow) -> Result<Student, AttendanceError> {
        Ok(Student {
            id: row.try_get("id")?,
            student_id: row.try_get("student_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            class_section: row.try_get("class_section")?,
            image_path: row.try_get("image_path")?,
            created_at: decode_timestamp(&row, "created_at")?,
        })
    }
}

fn decode_timestamp(row: &SqliteRow, column: &str) -> Result<NaiveDateTime, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    parse_timestamp(&raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn decode_marked_by(row: &SqliteRow) -> Result<MarkedBy, sqlx::Error> {
    let raw: String = row.try_get("marked_by")?;
    MarkedBy::parse(&raw)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown marking method `{raw}`").into()))
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
