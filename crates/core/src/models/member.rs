//! Member and role models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Shortest and longest accepted display names, in characters.
pub const NAME_MIN_CHARS: usize = 1;
pub const NAME_MAX_CHARS: usize = 20;

/// Role of a member within one room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Player,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

/// A participant in one room. The identifier is server-assigned and stable
/// across reconnects; the connection handle is `None` while the member is
/// inside the reconnection window.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub score: u32,
    /// Points awarded by the most recent question.
    pub last_delta: u32,
    /// Joined while a game was running; plays from the next session on.
    pub waiting: bool,
    /// Join order within the room, used as the final ranking tie-break.
    pub joined_seq: u64,
    pub joined_at: DateTime<Utc>,
    /// Current connection, if any.
    pub conn: Option<Uuid>,
    /// Logical timestamp of the latest accepted answer (ranking tie-break).
    pub last_answer_ts: Option<u64>,
    /// Whether this member has answered the current question.
    pub answered: bool,
}

impl Member {
    pub fn new(name: String, role: Role, joined_seq: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            role,
            score: 0,
            last_delta: 0,
            waiting: false,
            joined_seq,
            joined_at: Utc::now(),
            conn: None,
            last_answer_ts: None,
            answered: false,
        }
    }

    pub fn connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Non-waiting player eligible to answer in the running session.
    pub fn is_active_player(&self) -> bool {
        self.role == Role::Player && !self.waiting
    }

    pub fn view(&self) -> MemberView {
        MemberView {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
            score: self.score,
            last_delta: self.last_delta,
            waiting: self.waiting,
            connected: self.connected(),
            answered: self.answered,
        }
    }
}

/// Public view of a member, safe to broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberView {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub score: u32,
    pub last_delta: u32,
    pub waiting: bool,
    pub connected: bool,
    pub answered: bool,
}

/// Validate a display name: 1–20 printable characters.
pub fn validate_display_name(name: &str) -> Result<()> {
    let chars = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        return Err(Error::NameInvalid);
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(Error::NameInvalid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_length_boundaries() {
        assert!(validate_display_name("A").is_ok());
        assert!(validate_display_name(&"x".repeat(20)).is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name(&"x".repeat(21)).is_err());
    }

    #[test]
    fn test_name_rejects_control_characters() {
        assert!(validate_display_name("ali\nce").is_err());
        assert!(validate_display_name("ali\tce").is_err());
    }

    #[test]
    fn test_name_accepts_unicode() {
        assert!(validate_display_name("João José").is_ok());
    }

    #[test]
    fn test_new_member_defaults() {
        let m = Member::new("Alice".into(), Role::Player, 1);
        assert_eq!(m.score, 0);
        assert!(!m.waiting);
        assert!(!m.connected());
        assert!(m.is_active_player());
    }
}
