use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::geo;
use crate::models::{AttendanceRecord, CheckInAttempt, ClassSession};

/// Sentinel fingerprint stamped on lecturer-entered records so they can never
/// collide with a real device in rule 3.
pub const MANUAL_ENTRY_IP: &str = "manual";
pub const MANUAL_ENTRY_SIGNATURE: &str = "manual-entry";

/// Caller errors: malformed input rejected before any rule runs. Distinct
/// from rule rejections, which are expected business outcomes.
#[derive(Debug, Error, PartialEq)]
pub enum CheckInError {
    #[error("latitude {0} is not a valid coordinate")]
    InvalidLatitude(f64),
    #[error("longitude {0} is not a valid coordinate")]
    InvalidLongitude(f64),
    #[error("device signature must not be empty")]
    EmptyDeviceSignature,
    #[error("attempt targets session {attempt} but session {session} was loaded")]
    SessionMismatch { attempt: Uuid, session: Uuid },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    SessionClosed,
    AlreadyCheckedIn,
    DeviceAlreadyUsed,
    OutOfRange { distance_meters: i64 },
}

impl RejectReason {
    /// Human-readable message for the presentation layer.
    pub fn message(&self) -> String {
        match self {
            RejectReason::SessionClosed => "Session is closed or invalid.".to_string(),
            RejectReason::AlreadyCheckedIn => {
                "Attendance already recorded for this session.".to_string()
            }
            RejectReason::DeviceAlreadyUsed => {
                "This device has already been used to sign in another student.".to_string()
            }
            RejectReason::OutOfRange { distance_meters } => format!(
                "You are too far from the class location: {distance_meters}m away."
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Accepted(AttendanceRecord),
    Rejected(RejectReason),
}

fn validate(attempt: &CheckInAttempt) -> Result<(), CheckInError> {
    if !attempt.latitude.is_finite() || attempt.latitude.abs() > 90.0 {
        return Err(CheckInError::InvalidLatitude(attempt.latitude));
    }
    if !attempt.longitude.is_finite() || attempt.longitude.abs() > 180.0 {
        return Err(CheckInError::InvalidLongitude(attempt.longitude));
    }
    if attempt.device_signature.trim().is_empty() {
        return Err(CheckInError::EmptyDeviceSignature);
    }
    Ok(())
}

/// Decide whether a student check-in is accepted. Pure over its inputs:
/// `existing` is the set of records already accepted for this session, and
/// `now` only stamps the produced record. Rules run in a fixed order and the
/// first failure wins.
pub fn evaluate(
    attempt: &CheckInAttempt,
    session: &ClassSession,
    existing: &[AttendanceRecord],
    now: DateTime<Utc>,
) -> Result<Outcome, CheckInError> {
    validate(attempt)?;
    if attempt.session_id != session.id {
        return Err(CheckInError::SessionMismatch {
            attempt: attempt.session_id,
            session: session.id,
        });
    }

    if !session.is_active {
        return Ok(Outcome::Rejected(RejectReason::SessionClosed));
    }

    if existing.iter().any(|r| r.student_id == attempt.student_id) {
        return Ok(Outcome::Rejected(RejectReason::AlreadyCheckedIn));
    }

    // One physical device signing in multiple identities. Same student on the
    // same device is already short-circuited above, and different devices
    // behind one IP (shared Wi-Fi) are expected.
    let device_collision = existing.iter().any(|r| {
        r.student_id != attempt.student_id
            && r.client_ip == attempt.client_ip
            && r.device_signature == attempt.device_signature
    });
    if device_collision {
        return Ok(Outcome::Rejected(RejectReason::DeviceAlreadyUsed));
    }

    let distance = geo::haversine_meters(
        attempt.latitude,
        attempt.longitude,
        session.latitude,
        session.longitude,
    );
    if distance > session.radius_meters {
        return Ok(Outcome::Rejected(RejectReason::OutOfRange {
            distance_meters: distance.round() as i64,
        }));
    }

    Ok(Outcome::Accepted(AttendanceRecord {
        id: Uuid::new_v4(),
        session_id: session.id,
        student_id: attempt.student_id,
        recorded_at: now,
        client_ip: attempt.client_ip.clone(),
        device_signature: attempt.device_signature.clone(),
        is_manual: false,
        flagged: false,
    }))
}

/// Lecturer-entered attendance. Skips the device and geofence rules by
/// design, still refuses a second record for the same (session, student),
/// and works on closed sessions so attendance can be corrected after class.
pub fn manual_entry(
    student_id: Uuid,
    session: &ClassSession,
    existing: &[AttendanceRecord],
    now: DateTime<Utc>,
) -> Outcome {
    if existing.iter().any(|r| r.student_id == student_id) {
        return Outcome::Rejected(RejectReason::AlreadyCheckedIn);
    }

    Outcome::Accepted(AttendanceRecord {
        id: Uuid::new_v4(),
        session_id: session.id,
        student_id,
        recorded_at: now,
        client_ip: MANUAL_ENTRY_IP.to_string(),
        device_signature: MANUAL_ENTRY_SIGNATURE.to_string(),
        is_manual: true,
        flagged: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::EARTH_RADIUS_METERS;

    const METERS_PER_DEGREE_LAT: f64 = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;

    fn session() -> ClassSession {
        ClassSession {
            id: Uuid::new_v4(),
            lecturer_id: Uuid::new_v4(),
            course_code: "CSC401".to_string(),
            course_title: "Algorithms".to_string(),
            latitude: 6.5244,
            longitude: 3.3792,
            radius_meters: 50.0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn attempt_at(session: &ClassSession, meters_north: f64) -> CheckInAttempt {
        CheckInAttempt {
            student_id: Uuid::new_v4(),
            session_id: session.id,
            latitude: session.latitude + meters_north / METERS_PER_DEGREE_LAT,
            longitude: session.longitude,
            client_ip: "203.0.113.5".to_string(),
            device_signature: "Mozilla/5.0 (Android 14; Pixel 8)".to_string(),
        }
    }

    fn record_for(attempt: &CheckInAttempt) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            session_id: attempt.session_id,
            student_id: attempt.student_id,
            recorded_at: Utc::now(),
            client_ip: attempt.client_ip.clone(),
            device_signature: attempt.device_signature.clone(),
            is_manual: false,
            flagged: false,
        }
    }

    #[test]
    fn accepts_inside_the_geofence() {
        let s = session();
        let a = attempt_at(&s, 40.0);
        match evaluate(&a, &s, &[], Utc::now()).unwrap() {
            Outcome::Accepted(rec) => {
                assert_eq!(rec.session_id, s.id);
                assert_eq!(rec.student_id, a.student_id);
                assert!(!rec.is_manual);
                assert!(!rec.flagged);
            }
            Outcome::Rejected(reason) => panic!("rejected: {reason:?}"),
        }
    }

    #[test]
    fn rejects_outside_the_geofence_with_distance() {
        let s = session();
        let a = attempt_at(&s, 60.0);
        match evaluate(&a, &s, &[], Utc::now()).unwrap() {
            Outcome::Rejected(RejectReason::OutOfRange { distance_meters }) => {
                assert_eq!(distance_meters, 60);
            }
            other => panic!("expected OutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn boundary_distance_is_accepted() {
        let mut s = session();
        let a = attempt_at(&s, 40.0);
        // Pin the radius to the exact computed distance.
        s.radius_meters = geo::haversine_meters(a.latitude, a.longitude, s.latitude, s.longitude);
        assert!(matches!(
            evaluate(&a, &s, &[], Utc::now()).unwrap(),
            Outcome::Accepted(_)
        ));
    }

    #[test]
    fn closed_session_wins_over_every_other_rule() {
        let mut s = session();
        s.is_active = false;
        let a = attempt_at(&s, 10.0);
        // Duplicate and collision material present, but rule 1 fires first.
        let existing = vec![record_for(&a)];
        assert!(matches!(
            evaluate(&a, &s, &existing, Utc::now()).unwrap(),
            Outcome::Rejected(RejectReason::SessionClosed)
        ));
    }

    #[test]
    fn second_attempt_by_same_student_is_already_checked_in() {
        let s = session();
        let a = attempt_at(&s, 10.0);
        let existing = vec![record_for(&a)];
        assert!(matches!(
            evaluate(&a, &s, &existing, Utc::now()).unwrap(),
            Outcome::Rejected(RejectReason::AlreadyCheckedIn)
        ));
    }

    #[test]
    fn same_device_different_student_is_a_collision() {
        let s = session();
        let first = attempt_at(&s, 10.0);
        let existing = vec![record_for(&first)];

        let mut second = attempt_at(&s, 10.0);
        second.client_ip = first.client_ip.clone();
        second.device_signature = first.device_signature.clone();

        assert!(matches!(
            evaluate(&second, &s, &existing, Utc::now()).unwrap(),
            Outcome::Rejected(RejectReason::DeviceAlreadyUsed)
        ));
    }

    #[test]
    fn same_ip_different_device_is_not_a_collision() {
        let s = session();
        let first = attempt_at(&s, 10.0);
        let existing = vec![record_for(&first)];

        let mut second = attempt_at(&s, 10.0);
        second.client_ip = first.client_ip.clone();
        second.device_signature = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)".to_string();

        assert!(matches!(
            evaluate(&second, &s, &existing, Utc::now()).unwrap(),
            Outcome::Accepted(_)
        ));
    }

    #[test]
    fn duplicate_check_precedes_device_collision_for_same_student() {
        // The same student re-submitting from the same device must read as
        // AlreadyCheckedIn, never DeviceAlreadyUsed.
        let s = session();
        let a = attempt_at(&s, 10.0);
        let existing = vec![record_for(&a)];
        match evaluate(&a, &s, &existing, Utc::now()).unwrap() {
            Outcome::Rejected(reason) => assert_eq!(reason, RejectReason::AlreadyCheckedIn),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn invalid_coordinates_are_errors_not_rejections() {
        let s = session();
        let mut a = attempt_at(&s, 10.0);
        a.latitude = 91.0;
        assert!(matches!(
            evaluate(&a, &s, &[], Utc::now()),
            Err(CheckInError::InvalidLatitude(_))
        ));

        let mut a = attempt_at(&s, 10.0);
        a.longitude = f64::NAN;
        assert!(matches!(
            evaluate(&a, &s, &[], Utc::now()),
            Err(CheckInError::InvalidLongitude(_))
        ));
    }

    #[test]
    fn empty_device_signature_is_an_error() {
        let s = session();
        let mut a = attempt_at(&s, 10.0);
        a.device_signature = "   ".to_string();
        assert!(matches!(
            evaluate(&a, &s, &[], Utc::now()),
            Err(CheckInError::EmptyDeviceSignature)
        ));
    }

    #[test]
    fn mismatched_session_id_is_an_error() {
        let s = session();
        let mut a = attempt_at(&s, 10.0);
        a.session_id = Uuid::new_v4();
        assert!(matches!(
            evaluate(&a, &s, &[], Utc::now()),
            Err(CheckInError::SessionMismatch { .. })
        ));
    }

    #[test]
    fn manual_entry_bypasses_geofence_and_device_rules() {
        let mut s = session();
        s.is_active = false;
        let student = Uuid::new_v4();
        match manual_entry(student, &s, &[], Utc::now()) {
            Outcome::Accepted(rec) => {
                assert!(rec.is_manual);
                assert_eq!(rec.client_ip, MANUAL_ENTRY_IP);
                assert_eq!(rec.device_signature, MANUAL_ENTRY_SIGNATURE);
            }
            Outcome::Rejected(reason) => panic!("rejected: {reason:?}"),
        }
    }

    #[test]
    fn manual_entry_still_enforces_the_duplicate_rule() {
        let s = session();
        let a = attempt_at(&s, 10.0);
        let existing = vec![record_for(&a)];
        assert!(matches!(
            manual_entry(a.student_id, &s, &existing, Utc::now()),
            Outcome::Rejected(RejectReason::AlreadyCheckedIn)
        ));
    }

    #[test]
    fn manual_sentinel_never_collides_with_a_real_device() {
        let s = session();
        let manual = match manual_entry(Uuid::new_v4(), &s, &[], Utc::now()) {
            Outcome::Accepted(rec) => rec,
            Outcome::Rejected(reason) => panic!("rejected: {reason:?}"),
        };

        let real = attempt_at(&s, 10.0);
        assert!(matches!(
            evaluate(&real, &s, &[manual], Utc::now()).unwrap(),
            Outcome::Accepted(_)
        ));
    }
}
