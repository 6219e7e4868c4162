use crate::models::Status;

pub const EXAM_WEIGHT: f64 = 2.0;
pub const ASSIGNMENT_WEIGHT: f64 = 1.0;
pub const PASSING_AVERAGE: f64 = 6.0;
pub const WARNING_AVERAGE: f64 = 4.0;

/// Weighted average of the two scores, exam counting twice, rounded to one
/// decimal. Missing or non-finite scores count as zero.
pub fn compute_average(exam: Option<f64>, assignment: Option<f64>) -> f64 {
    let exam = coerce_score(exam);
    let assignment = coerce_score(assignment);
    round1(
        (exam * EXAM_WEIGHT + assignment * ASSIGNMENT_WEIGHT) / (EXAM_WEIGHT + ASSIGNMENT_WEIGHT),
    )
}

pub fn classify_status(average: f64) -> Status {
    if average >= PASSING_AVERAGE {
        Status::Passed
    } else if average >= WARNING_AVERAGE {
        Status::Warning
    } else {
        Status::Failed
    }
}

/// Average and status of one evaluation. The status is taken from the
/// rounded average so a displayed "6.0" always reads as passed.
pub fn grade(exam: Option<f64>, assignment: Option<f64>) -> (f64, Status) {
    let average = compute_average(exam, assignment);
    (average, classify_status(average))
}

pub fn coerce_score(score: Option<f64>) -> f64 {
    score.filter(|s| s.is_finite()).unwrap_or(0.0)
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_matches_formula_across_score_grid() {
        for e in 0..=20 {
            for a in 0..=20 {
                let exam = e as f64 / 2.0;
                let assignment = a as f64 / 2.0;
                let average = compute_average(Some(exam), Some(assignment));
                assert_eq!(average, round1((exam * 2.0 + assignment) / 3.0));
                assert!((0.0..=10.0).contains(&average));
            }
        }
    }

    #[test]
    fn missing_scores_count_as_zero() {
        assert_eq!(compute_average(None, None), 0.0);
        assert_eq!(compute_average(None, Some(5.0)), 1.7);
        assert_eq!(compute_average(Some(f64::NAN), Some(3.0)), 1.0);
    }

    #[test]
    fn rounding_is_not_truncation() {
        // (5 * 2 + 8) / 3 = 6.0, (6 * 2 + 5) / 3 = 5.666..
        assert_eq!(compute_average(Some(5.0), Some(8.0)), 6.0);
        assert_eq!(compute_average(Some(6.0), Some(5.0)), 5.7);
    }

    #[test]
    fn status_bands_are_inclusive_on_lower_bound() {
        assert_eq!(classify_status(6.0), Status::Passed);
        assert_eq!(classify_status(5.99), Status::Warning);
        assert_eq!(classify_status(4.0), Status::Warning);
        assert_eq!(classify_status(3.99), Status::Failed);
        assert_eq!(classify_status(10.0), Status::Passed);
        assert_eq!(classify_status(0.0), Status::Failed);
    }

    #[test]
    fn grade_classifies_the_rounded_average() {
        // raw (6 * 2 + 5.9) / 3 = 5.9666.., shown as 6.0
        let (average, status) = grade(Some(6.0), Some(5.9));
        assert_eq!(average, 6.0);
        assert_eq!(status, Status::Passed);
    }
}
