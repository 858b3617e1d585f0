use crate::models::{CourseAttendance, RiskResult, RiskTier};

/// Fixed tier thresholds, inclusive at each lower bound.
pub fn classify(percentage: f64) -> RiskTier {
    if percentage >= 75.0 {
        RiskTier::Safe
    } else if percentage >= 50.0 {
        RiskTier::Warning
    } else {
        RiskTier::Critical
    }
}

/// Attendance percentage to one decimal. A course with no sessions on record
/// is scored as if one was held, so the division is always defined.
pub fn attendance_percentage(sessions_attended: i64, sessions_held: i64) -> f64 {
    let held = sessions_held.max(1);
    let raw = 100.0 * sessions_attended as f64 / held as f64;
    (raw * 10.0).round() / 10.0
}

/// Score every student with at least one record in the course. `rows` comes
/// from the per-course aggregate query, one row per student. Output is sorted
/// by student id for reproducible reports.
pub fn compute_risk(
    course_code: &str,
    sessions_held: i64,
    rows: &[CourseAttendance],
) -> Vec<RiskResult> {
    let mut results: Vec<RiskResult> = rows
        .iter()
        .map(|row| {
            let percentage = attendance_percentage(row.sessions_attended, sessions_held);
            RiskResult {
                student_id: row.student_id,
                student_name: row.student_name.clone(),
                student_email: row.student_email.clone(),
                course_code: course_code.to_string(),
                sessions_attended: row.sessions_attended,
                sessions_held: sessions_held.max(1),
                percentage,
                tier: classify(percentage),
            }
        })
        .collect();

    results.sort_by_key(|r| r.student_id);
    results
}
