use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClassSession {
    pub id: Uuid,
    pub lecturer_id: Uuid,
    pub course_code: String,
    pub course_title: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Read-side projection of a session joined with its lecturer's display name.
/// The stored session row is never mutated to carry the name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionWithLecturer {
    pub id: Uuid,
    pub lecturer_id: Uuid,
    pub lecturer_name: String,
    pub course_code: String,
    pub course_title: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A single check-in submission as it arrives from the student boundary.
/// Transient; only an accepted attempt produces a stored record.
#[derive(Debug, Clone)]
pub struct CheckInAttempt {
    pub student_id: Uuid,
    pub session_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub client_ip: String,
    pub device_signature: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub client_ip: String,
    pub device_signature: String,
    pub is_manual: bool,
    pub flagged: bool,
}

/// Attendance record joined with the student's identity, for reports and
/// the CSV export. Ordered by check-in time when listed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceEntry {
    pub matric_no: String,
    pub student_name: String,
    pub recorded_at: DateTime<Utc>,
    pub course_code: String,
}

/// Aggregate row feeding the risk computation: one student's attended-session
/// count within a course.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CourseAttendance {
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub sessions_attended: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    Safe,
    Warning,
    Critical,
}

impl RiskTier {
    pub fn label(self) -> &'static str {
        match self {
            RiskTier::Safe => "Safe",
            RiskTier::Warning => "Warning",
            RiskTier::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskResult {
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub course_code: String,
    pub sessions_attended: i64,
    pub sessions_held: i64,
    pub percentage: f64,
    pub tier: RiskTier,
}
