//! Member roster - the per-room member registry
//!
//! Holds every member of one room in join order. All operations run under
//! the room lock; snapshots are value copies and safe to emit without it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{validate_display_name, Member, MemberView, Role};

/// Ordered set of members within a room.
#[derive(Debug, Default)]
pub struct Roster {
    /// Kept in join order; rosters are small, linear scans are fine.
    members: Vec<Member>,
    next_seq: u64,
}

/// One row of a score ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub position: usize,
    pub id: Uuid,
    pub name: String,
    pub score: u32,
    pub last_delta: u32,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. Fails with NameInvalid, NameTaken (case-insensitive)
    /// or AdminExists (at most one administrator per room).
    pub fn add(&mut self, name: &str, role: Role) -> Result<Member> {
        validate_display_name(name)?;
        if self.find_by_name(name).is_some() {
            return Err(Error::NameTaken);
        }
        if role.is_admin() && self.admin().is_some() {
            return Err(Error::AdminExists);
        }

        let member = Member::new(name.to_string(), role, self.next_seq);
        self.next_seq += 1;
        self.members.push(member.clone());
        Ok(member)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Member> {
        let idx = self.members.iter().position(|m| m.id == id)?;
        Some(self.members.remove(idx))
    }

    pub fn find(&self, id: Uuid) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    /// Case-insensitive lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn admin(&self) -> Option<&Member> {
        self.members.iter().find(|m| m.role.is_admin())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    /// Non-waiting players, i.e. everyone expected to answer.
    pub fn active_players(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.is_active_player())
    }

    /// Stable join-order sequence of public views for broadcast.
    pub fn snapshot(&self) -> Vec<MemberView> {
        self.members.iter().map(Member::view).collect()
    }

    pub fn set_waiting(&mut self, id: Uuid, waiting: bool) -> Result<()> {
        let member = self.find_mut(id).ok_or(Error::MemberNotFound)?;
        member.waiting = waiting;
        Ok(())
    }

    pub fn add_score(&mut self, id: Uuid, delta: u32) -> Result<()> {
        let member = self.find_mut(id).ok_or(Error::MemberNotFound)?;
        member.score += delta;
        member.last_delta = delta;
        Ok(())
    }

    /// Back to zero for a new session; waiting members get to play.
    pub fn reset_scores(&mut self) {
        for m in &mut self.members {
            m.score = 0;
            m.last_delta = 0;
            m.answered = false;
            m.last_answer_ts = None;
        }
    }

    /// Clear waiting flags (session start and session end).
    pub fn clear_waiting(&mut self) {
        for m in &mut self.members {
            m.waiting = false;
        }
    }

    /// Reset per-question bookkeeping when a new question opens.
    pub fn reset_for_question(&mut self) {
        for m in &mut self.members {
            m.last_delta = 0;
            m.answered = false;
        }
    }

    /// Players ranked by score. Ties broken by the logical timestamp of the
    /// latest accepted answer (lower first), then by join order.
    pub fn ranking(&self) -> Vec<RankingEntry> {
        let mut players: Vec<&Member> = self
            .members
            .iter()
            .filter(|m| m.role == Role::Player)
            .collect();
        players.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| {
                    a.last_answer_ts
                        .unwrap_or(u64::MAX)
                        .cmp(&b.last_answer_ts.unwrap_or(u64::MAX))
                })
                .then_with(|| a.joined_seq.cmp(&b.joined_seq))
        });
        players
            .into_iter()
            .enumerate()
            .map(|(i, m)| RankingEntry {
                position: i + 1,
                id: m.id,
                name: m.name.clone(),
                score: m.score,
                last_delta: m.last_delta,
            })
            .collect()
    }
}
