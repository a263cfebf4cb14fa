use serde::{Deserialize, Serialize};

/// Every question carries exactly this many answer options.
pub const OPTION_COUNT: usize = 4;

/// A generated trivia question. Produced by the external generator; the
/// server only validates shape before trusting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    /// Zero-based index into `options`.
    pub correct_answer: u8,
    pub difficulty: String,
}

impl Question {
    /// Shape check applied to generator output before a set is installed.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() == OPTION_COUNT
            && (self.correct_answer as usize) < OPTION_COUNT
            && !self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Question {
        Question {
            id: "q1".into(),
            text: "Which planet is closest to the sun?".into(),
            options: vec![
                "Venus".into(),
                "Mercury".into(),
                "Mars".into(),
                "Earth".into(),
            ],
            correct_answer: 1,
            difficulty: "easy".into(),
        }
    }

    #[test]
    fn well_formed_question_passes() {
        assert!(sample().is_well_formed());
    }

    #[test]
    fn wrong_option_count_fails() {
        let mut q = sample();
        q.options.pop();
        assert!(!q.is_well_formed());
    }

    #[test]
    fn out_of_range_answer_fails() {
        let mut q = sample();
        q.correct_answer = 4;
        assert!(!q.is_well_formed());
    }

    #[test]
    fn empty_text_fails() {
        let mut q = sample();
        q.text.clear();
        assert!(!q.is_well_formed());
    }
}
