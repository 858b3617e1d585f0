use anyhow::Context;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{ClassSession, CourseAttendance, SessionWithLecturer};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let people = vec![
        (
            Uuid::parse_str("7d9f1c2e-5a41-4b8f-9c3d-2f6e81b0a514")?,
            "L1001",
            "Dr. Smith",
            "smith@faculty.example.edu",
            "lecturer",
        ),
        (
            Uuid::parse_str("b3c4d5e6-1f2a-4b3c-8d9e-0a1b2c3d4e5f")?,
            "S2023/101",
            "Alice Johnson",
            "alice.johnson@students.example.edu",
            "student",
        ),
        (
            Uuid::parse_str("c4d5e6f7-2a3b-4c5d-9e0f-1a2b3c4d5e6a")?,
            "S2023/102",
            "Bola Ade",
            "bola.ade@students.example.edu",
            "student",
        ),
        (
            Uuid::parse_str("d5e6f7a8-3b4c-4d5e-8f0a-2b3c4d5e6f7b")?,
            "S2023/103",
            "Chidi Okafor",
            "chidi.okafor@students.example.edu",
            "student",
        ),
    ];

    for (id, matric_no, full_name, email, role) in people {
        sqlx::query(
            r#"
            INSERT INTO class_attendance.people (id, matric_no, full_name, email, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (matric_no) DO UPDATE
            SET full_name = EXCLUDED.full_name, email = EXCLUDED.email
            "#,
        )
        .bind(id)
        .bind(matric_no)
        .bind(full_name)
        .bind(email)
        .bind(role)
        .execute(pool)
        .await?;
    }

    let lecturer_id: Uuid =
        sqlx::query("SELECT id FROM class_attendance.people WHERE matric_no = $1")
            .bind("L1001")
            .fetch_one(pool)
            .await?
            .get("id");

    sqlx::query(
        r#"
        INSERT INTO class_attendance.class_sessions
        (id, lecturer_id, course_code, course_title, latitude, longitude,
         radius_meters, is_active, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(Uuid::parse_str("e6f7a8b9-4c5d-4e6f-9a0b-3c4d5e6f7a8c")?)
    .bind(lecturer_id)
    .bind("CSC401")
    .bind("Algorithms and Complexity")
    .bind(6.5244)
    .bind(3.3792)
    .bind(50.0)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn open_session(
    pool: &PgPool,
    lecturer_id: Uuid,
    course_code: &str,
    course_title: &str,
    latitude: f64,
    longitude: f64,
    radius_meters: f64,
) -> anyhow::Result<ClassSession> {
    anyhow::ensure!(radius_meters > 0.0, "radius must be positive meters");
    anyhow::ensure!(
        latitude.is_finite() && latitude.abs() <= 90.0,
        "latitude out of range"
    );
    anyhow::ensure!(
        longitude.is_finite() && longitude.abs() <= 180.0,
        "longitude out of range"
    );

    let session = sqlx::query_as::<_, ClassSession>(
        r#"
        INSERT INTO class_attendance.class_sessions
        (id, lecturer_id, course_code, course_title, latitude, longitude,
         radius_meters, is_active, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8)
        RETURNING id, lecturer_id, course_code, course_title, latitude, longitude,
                  radius_meters, is_active, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(lecturer_id)
    .bind(course_code)
    .bind(course_title)
    .bind(latitude)
    .bind(longitude)
    .bind(radius_meters)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .context("failed to open session")?;

    tracing::info!(session_id = %session.id, course = course_code, "session opened");
    Ok(session)
}

/// One-way flip: an inactive session never reopens. Scoped to the owning
/// lecturer; returns whether a row was actually closed.
pub async fn close_session(
    pool: &PgPool,
    session_id: Uuid,
    lecturer_id: Uuid,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE class_attendance.class_sessions
        SET is_active = FALSE
        WHERE id = $1 AND lecturer_id = $2 AND is_active
        "#,
    )
    .bind(session_id)
    .bind(lecturer_id)
    .execute(pool)
    .await?;

    let closed = result.rows_affected() > 0;
    if closed {
        tracing::info!(session_id = %session_id, "session closed");
    }
    Ok(closed)
}

pub async fn fetch_session(pool: &PgPool, session_id: Uuid) -> anyhow::Result<Option<ClassSession>> {
    let session = sqlx::query_as::<_, ClassSession>(
        r#"
        SELECT id, lecturer_id, course_code, course_title, latitude, longitude,
               radius_meters, is_active, created_at
        FROM class_attendance.class_sessions
        WHERE id = $1
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

pub async fn fetch_session_with_lecturer(
    pool: &PgPool,
    session_id: Uuid,
) -> anyhow::Result<Option<SessionWithLecturer>> {
    let session = sqlx::query_as::<_, SessionWithLecturer>(
        r#"
        SELECT s.id, s.lecturer_id, p.full_name AS lecturer_name, s.course_code,
               s.course_title, s.latitude, s.longitude, s.radius_meters,
               s.is_active, s.created_at
        FROM class_attendance.class_sessions s
        JOIN class_attendance.people p ON p.id = s.lecturer_id
        WHERE s.id = $1
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// Currently open sessions with their lecturer names, newest first. Feeds
/// the student-facing "what can I check in to" view.
pub async fn active_sessions(pool: &PgPool) -> anyhow::Result<Vec<SessionWithLecturer>> {
    let sessions = sqlx::query_as::<_, SessionWithLecturer>(
        r#"
        SELECT s.id, s.lecturer_id, p.full_name AS lecturer_name, s.course_code,
               s.course_title, s.latitude, s.longitude, s.radius_meters,
               s.is_active, s.created_at
        FROM class_attendance.class_sessions s
        JOIN class_attendance.people p ON p.id = s.lecturer_id
        WHERE s.is_active
        ORDER BY s.created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

pub async fn count_sessions_held(
    pool: &PgPool,
    course_code: &str,
    lecturer_id: Uuid,
) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM class_attendance.class_sessions
        WHERE course_code = $1 AND lecturer_id = $2
        "#,
    )
    .bind(course_code)
    .bind(lecturer_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Per-student attended counts for one course, scoped by the join so report
/// generation stays proportional to course size.
pub async fn course_attendance(
    pool: &PgPool,
    course_code: &str,
) -> anyhow::Result<Vec<CourseAttendance>> {
    let rows = sqlx::query_as::<_, CourseAttendance>(
        r#"
        SELECT p.id AS student_id, p.full_name AS student_name,
               p.email AS student_email, COUNT(*) AS sessions_attended
        FROM class_attendance.attendance_records a
        JOIN class_attendance.class_sessions s ON s.id = a.session_id
        JOIN class_attendance.people p ON p.id = a.student_id
        WHERE s.course_code = $1
        GROUP BY p.id, p.full_name, p.email
        "#,
    )
    .bind(course_code)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn lecturer_email(pool: &PgPool, lecturer_id: Uuid) -> anyhow::Result<Option<String>> {
    let email: Option<String> =
        sqlx::query_scalar("SELECT email FROM class_attendance.people WHERE id = $1")
            .bind(lecturer_id)
            .fetch_optional(pool)
            .await?;

    Ok(email)
}
