//! Question bank - the ordered question list owned by a room
//!
//! Append-only within the lifetime of a session. The owning room gates
//! every mutation on the lobby phase; the bank itself only validates and
//! stores.

use crate::error::{Error, Result};
use crate::models::{Question, QuestionDetail};

#[derive(Debug, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, question: Question) {
        self.questions.push(question);
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn remove(&mut self, index: usize) -> Result<Question> {
        if index >= self.questions.len() {
            return Err(Error::QuestionInvalid(format!(
                "no question at index {}",
                index
            )));
        }
        Ok(self.questions.remove(index))
    }

    pub fn clear(&mut self) {
        self.questions.clear();
    }

    pub fn count(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Admin-facing list including correct indices.
    pub fn list(&self) -> Vec<QuestionDetail> {
        self.questions.iter().map(Question::detail).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str) -> Question {
        Question::new(
            text.into(),
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            0,
            20,
        )
        .unwrap()
    }

    #[test]
    fn test_append_preserves_order() {
        let mut bank = QuestionBank::new();
        bank.append(question("first"));
        bank.append(question("second"));
        assert_eq!(bank.count(), 2);
        assert_eq!(bank.get(0).unwrap().text, "first");
        assert_eq!(bank.get(1).unwrap().text, "second");
    }

    #[test]
    fn test_remove_by_index() {
        let mut bank = QuestionBank::new();
        bank.append(question("first"));
        bank.append(question("second"));
        bank.remove(0).unwrap();
        assert_eq!(bank.get(0).unwrap().text, "second");
        assert!(bank.remove(5).is_err());
    }

    #[test]
    fn test_clear() {
        let mut bank = QuestionBank::new();
        bank.append(question("q"));
        bank.clear();
        assert!(bank.is_empty());
    }
}
