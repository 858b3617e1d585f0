use crate::models::RiskResult;

/// Attendance percentage below which a student is put on the alert list.
pub const ALERT_THRESHOLD: f64 = 50.0;

/// Pure filter over the risk output: the subset whose percentage is below
/// the alert threshold. Delivery (email transport, retries, failure counts)
/// belongs to the external collaborator that consumes this list.
pub fn select_at_risk(results: &[RiskResult]) -> Vec<RiskResult> {
    results
        .iter()
        .filter(|r| r.percentage < ALERT_THRESHOLD)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskTier;
    use uuid::Uuid;

    fn result(percentage: f64) -> RiskResult {
        RiskResult {
            student_id: Uuid::new_v4(),
            student_name: "Alice Johnson".to_string(),
            student_email: "alice.johnson@example.edu".to_string(),
            course_code: "CSC401".to_string(),
            sessions_attended: 1,
            sessions_held: 4,
            percentage,
            tier: crate::risk::classify(percentage),
        }
    }

    #[test]
    fn selects_only_below_the_threshold() {
        let results = vec![result(25.0), result(50.0), result(49.9), result(80.0)];
        let at_risk = select_at_risk(&results);
        assert_eq!(at_risk.len(), 2);
        assert!(at_risk.iter().all(|r| r.percentage < ALERT_THRESHOLD));
        assert!(at_risk.iter().all(|r| r.tier == RiskTier::Critical));
    }

    #[test]
    fn exactly_fifty_percent_is_not_selected() {
        let at_risk = select_at_risk(&[result(50.0)]);
        assert!(at_risk.is_empty());
    }

    #[test]
    fn empty_input_selects_nothing() {
        assert!(select_at_risk(&[]).is_empty());
    }
}
