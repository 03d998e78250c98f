use std::collections::HashSet;

/// Jaccard similarity of normalized skill sets, bucketed per the rules in
/// the tailoring pipeline: an empty requirement list can't be matched
/// against, so it scores as a neutral 0.75; a requirement list with zero
/// overlap scores a pessimistic 0.5 rather than 0 (no data does not mean no
/// fit); otherwise the raw Jaccard ratio gets a flat +0.2 bonus for having
/// any overlap at all, capped at 1.0.
pub fn fit_score(cv_skills: &[String], required_skills: &[String]) -> f64 {
    let cv: HashSet<String> = cv_skills.iter().map(|s| normalize(s)).collect();
    let required: HashSet<String> = required_skills.iter().map(|s| normalize(s)).collect();

    if required.is_empty() {
        return 0.75;
    }

    let intersection: HashSet<&String> = cv.intersection(&required).collect();
    if intersection.is_empty() {
        return 0.5;
    }

    let union: HashSet<&String> = cv.union(&required).collect();
    let jaccard = intersection.len() as f64 / union.len() as f64;
    (jaccard + 0.2).min(1.0)
}

fn normalize(skill: &str) -> String {
    skill.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_s1_from_the_literal_scenario() {
        let cv = vec!["Go".to_string(), "Postgres".to_string()];
        let required = vec!["Go".to_string(), "Kafka".to_string()];
        let score = fit_score(&cv, &required);
        assert!((score - 0.5333333333333333).abs() < 1e-9);
    }

    #[test]
    fn empty_requirements_is_neutral() {
        assert_eq!(fit_score(&["Go".to_string()], &[]), 0.75);
    }

    #[test]
    fn zero_overlap_is_pessimistic_not_zero() {
        let cv = vec!["Ruby".to_string()];
        let required = vec!["Go".to_string()];
        assert_eq!(fit_score(&cv, &required), 0.5);
    }

    #[test]
    fn full_overlap_caps_at_one() {
        let cv = vec!["Go".to_string()];
        let required = vec!["Go".to_string()];
        assert_eq!(fit_score(&cv, &required), 1.0);
    }
}
