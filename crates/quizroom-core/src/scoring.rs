/// Points for a correct answer before any time bonus.
pub const BASE_POINTS: u32 = 10;
/// Maximum time bonus, awarded for an instant answer.
pub const MAX_TIME_BONUS: u32 = 10;

/// Compute the round points for a submitted answer.
///
/// Correct answers earn `BASE_POINTS` plus a time bonus of
/// `floor(remaining / limit * MAX_TIME_BONUS)`. A wrong or missing answer
/// earns nothing. Deterministic for identical inputs.
pub fn score(answer: Option<u8>, correct: u8, elapsed_secs: f64, limit_secs: u64) -> u32 {
    match answer {
        Some(a) if a == correct => {
            if limit_secs == 0 {
                return BASE_POINTS;
            }
            let limit = limit_secs as f64;
            let remaining = (limit - elapsed_secs).clamp(0.0, limit);
            let bonus = (remaining / limit * f64::from(MAX_TIME_BONUS)).floor() as u32;
            BASE_POINTS + bonus
        },
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn instant_correct_answer_gets_full_bonus() {
        assert_eq!(score(Some(2), 2, 0.0, 30), 20);
    }

    #[test]
    fn last_second_correct_answer_gets_base_only() {
        assert_eq!(score(Some(2), 2, 30.0, 30), 10);
    }

    #[test]
    fn wrong_answer_scores_zero() {
        assert_eq!(score(Some(1), 2, 0.0, 30), 0);
        assert_eq!(score(Some(1), 2, 29.0, 30), 0);
    }

    #[test]
    fn missing_answer_scores_zero() {
        assert_eq!(score(None, 2, 12.0, 30), 0);
    }

    #[test]
    fn ten_seconds_left_of_thirty() {
        // floor(10/30 * 10) = 3
        assert_eq!(score(Some(0), 0, 20.0, 30), 13);
    }

    #[test]
    fn overlong_elapsed_clamps_to_zero_bonus() {
        assert_eq!(score(Some(0), 0, 45.0, 30), 10);
    }

    #[test]
    fn negative_elapsed_clamps_to_full_bonus() {
        assert_eq!(score(Some(0), 0, -5.0, 30), 20);
    }

    proptest! {
        #[test]
        fn correct_answer_bounded(elapsed in 0.0f64..120.0, limit in prop::sample::select(vec![10u64, 15, 20, 30, 60])) {
            let pts = score(Some(1), 1, elapsed, limit);
            prop_assert!(pts >= BASE_POINTS);
            prop_assert!(pts <= BASE_POINTS + MAX_TIME_BONUS);
        }

        #[test]
        fn wrong_answer_always_zero(ans in 0u8..4, correct in 0u8..4, elapsed in -10.0f64..120.0) {
            prop_assume!(ans != correct);
            prop_assert_eq!(score(Some(ans), correct, elapsed, 30), 0);
        }

        #[test]
        fn bonus_never_increases_with_elapsed(a in 0.0f64..60.0, b in 0.0f64..60.0) {
            let (fast, slow) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(score(Some(0), 0, fast, 60) >= score(Some(0), 0, slow, 60));
        }
    }
}
