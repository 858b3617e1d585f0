use std::fmt::Write;

use crate::models::{AttendanceEntry, RiskResult, SessionWithLecturer};

/// Markdown roster for one session, entries already ordered by check-in time.
pub fn build_session_report(session: &SessionWithLecturer, entries: &[AttendanceEntry]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(
        output,
        "{}: {} (held by {}, opened {})",
        session.course_code,
        session.course_title,
        session.lecturer_name,
        session.created_at.format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(
        output,
        "Geofence: ({:.4}, {:.4}) radius {:.0}m, {}",
        session.latitude,
        session.longitude,
        session.radius_meters,
        if session.is_active { "open" } else { "closed" }
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Checked In ({})", entries.len());

    if entries.is_empty() {
        let _ = writeln!(output, "No students checked in.");
    } else {
        for entry in entries {
            let _ = writeln!(
                output,
                "- {} ({}) at {}",
                entry.student_name,
                entry.matric_no,
                entry.recorded_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    output
}

/// Markdown risk summary for a course, one line per scored student.
pub fn build_risk_report(course_code: &str, results: &[RiskResult]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Risk: {course_code}");
    let _ = writeln!(output);

    if results.is_empty() {
        let _ = writeln!(output, "No attendance recorded for this course.");
        return output;
    }

    for result in results {
        let _ = writeln!(
            output,
            "- {} ({}): {}/{} sessions, {:.1}% [{}]",
            result.student_name,
            result.student_email,
            result.sessions_attended,
            result.sessions_held,
            result.percentage,
            result.tier.label()
        );
    }

    output
}

/// CSV export of a session roster. Column order is fixed for compatibility
/// with the existing downstream spreadsheets.
pub fn export_csv(entries: &[AttendanceEntry]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(["Matric/Staff No", "Student Name", "Check-in Time", "Course Code"])?;
    for entry in entries {
        writer.write_record([
            entry.matric_no.as_str(),
            entry.student_name.as_str(),
            &entry.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.course_code.as_str(),
        ])?;
    }

    let bytes = writer.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}
