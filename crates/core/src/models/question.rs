//! Quiz question model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Accepted range and default for the per-question deadline, in seconds.
pub const DEADLINE_MIN_SECS: u32 = 5;
pub const DEADLINE_MAX_SECS: u32 = 60;
pub const DEADLINE_DEFAULT_SECS: u32 = 20;

/// Number of options every question carries.
pub const OPTION_COUNT: usize = 4;

/// A timed multiple-choice question. Options are ordered and positional;
/// answers are reported as an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub correct: usize,
    pub deadline_secs: u32,
}

impl Question {
    pub fn new(
        text: String,
        options: Vec<String>,
        correct: usize,
        deadline_secs: u32,
    ) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::QuestionInvalid("empty text".into()));
        }
        let options: [String; OPTION_COUNT] = options
            .try_into()
            .map_err(|_| Error::QuestionInvalid("expected exactly four options".into()))?;
        if options.iter().any(|o| o.trim().is_empty()) {
            return Err(Error::QuestionInvalid("empty option".into()));
        }
        if correct >= OPTION_COUNT {
            return Err(Error::QuestionInvalid("correct index out of range".into()));
        }
        if !(DEADLINE_MIN_SECS..=DEADLINE_MAX_SECS).contains(&deadline_secs) {
            return Err(Error::QuestionInvalid(format!(
                "deadline {} outside {}..={} seconds",
                deadline_secs, DEADLINE_MIN_SECS, DEADLINE_MAX_SECS
            )));
        }
        Ok(Self {
            text,
            options,
            correct,
            deadline_secs,
        })
    }

    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct
    }

    pub fn deadline_ms(&self) -> u64 {
        u64::from(self.deadline_secs) * 1000
    }

    /// Player-facing view; never reveals the correct index.
    pub fn view(&self) -> QuestionView {
        QuestionView {
            text: self.text.clone(),
            options: self.options.clone(),
            deadline: self.deadline_secs,
        }
    }

    /// Admin-facing view including the answer, for the question editor.
    pub fn detail(&self) -> QuestionDetail {
        QuestionDetail {
            text: self.text.clone(),
            options: self.options.clone(),
            correct: self.correct,
            time_limit: self.deadline_secs,
        }
    }
}

/// Question as broadcast to players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub deadline: u32,
}

/// Question as served to the admin UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDetail {
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub correct: usize,
    pub time_limit: u32,
}
