//! Per-question answer records

use serde::{Deserialize, Serialize};

/// Outcome of one (question, member) pair. Created when an answer is
/// accepted or when the deadline marks an absent player; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Chosen option index, or `None` for a timeout.
    pub choice: Option<usize>,
    /// Server-stamped logical timestamp.
    pub logical_ts: u64,
    /// Server-measured time since question emission.
    pub elapsed_ms: u64,
    /// Points awarded for this question.
    pub points: u32,
}

impl AnswerRecord {
    pub fn timeout(logical_ts: u64, deadline_ms: u64) -> Self {
        Self {
            choice: None,
            logical_ts,
            elapsed_ms: deadline_ms,
            points: 0,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.choice.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_record() {
        let r = AnswerRecord::timeout(7, 5_000);
        assert!(r.is_timeout());
        assert_eq!(r.points, 0);
        assert_eq!(r.elapsed_ms, 5_000);
    }
}
