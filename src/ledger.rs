use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{AttendanceEntry, AttendanceRecord};

/// Result of an append: the unique index on (session_id, student_id) plus
/// `ON CONFLICT DO NOTHING` makes the duplicate check and the insert one
/// atomic statement, so a lost race surfaces here instead of as two rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    AlreadyExists,
}

pub async fn try_append(pool: &PgPool, record: &AttendanceRecord) -> anyhow::Result<AppendOutcome> {
    let result = sqlx::query(
        r#"
        INSERT INTO class_attendance.attendance_records
        (id, session_id, student_id, recorded_at, client_ip, device_signature, is_manual, flagged)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (session_id, student_id) DO NOTHING
        "#,
    )
    .bind(record.id)
    .bind(record.session_id)
    .bind(record.student_id)
    .bind(record.recorded_at)
    .bind(&record.client_ip)
    .bind(&record.device_signature)
    .bind(record.is_manual)
    .bind(record.flagged)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        tracing::debug!(
            session_id = %record.session_id,
            student_id = %record.student_id,
            "append skipped, record already present"
        );
        return Ok(AppendOutcome::AlreadyExists);
    }

    tracing::info!(
        session_id = %record.session_id,
        student_id = %record.student_id,
        manual = record.is_manual,
        "attendance record appended"
    );
    Ok(AppendOutcome::Inserted)
}

/// All records for one session, feeding the duplicate and device-collision
/// rules of the validator.
pub async fn records_for_session(
    pool: &PgPool,
    session_id: Uuid,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let records = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT id, session_id, student_id, recorded_at, client_ip,
               device_signature, is_manual, flagged
        FROM class_attendance.attendance_records
        WHERE session_id = $1
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Roster rows for reporting and export, joined with the student identity
/// and ordered by check-in time so exports stay stable.
pub async fn list_by_session(
    pool: &PgPool,
    session_id: Uuid,
) -> anyhow::Result<Vec<AttendanceEntry>> {
    let entries = sqlx::query_as::<_, AttendanceEntry>(
        r#"
        SELECT p.matric_no, p.full_name AS student_name, a.recorded_at, s.course_code
        FROM class_attendance.attendance_records a
        JOIN class_attendance.people p ON p.id = a.student_id
        JOIN class_attendance.class_sessions s ON s.id = a.session_id
        WHERE a.session_id = $1
        ORDER BY a.recorded_at ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

pub async fn count_by_student_and_course(
    pool: &PgPool,
    student_id: Uuid,
    course_code: &str,
) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM class_attendance.attendance_records a
        JOIN class_attendance.class_sessions s ON s.id = a.session_id
        WHERE a.student_id = $1 AND s.course_code = $2
        "#,
    )
    .bind(student_id)
    .bind(course_code)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
