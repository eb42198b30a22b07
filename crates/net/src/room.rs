//! Room state - members, questions, clock, coordinator data and bus
//!
//! A room exclusively owns its roster, question bank, logical clock and
//! coordinator state behind one async mutex. Every mutation and every
//! outbound emission happens while that lock is held, which gives a total
//! order of events per room. Tasks must never hold two room locks at once.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;

use trivion_core::{
    Error, LamportClock, Member, MemberView, PasswordHash, Phase, Question, QuestionBank,
    QuestionDetail, Result, Role, RoomSummary, Roster,
};

use crate::bus::{Bus, ConnHandle, Forwarder};
use crate::coordinator::GameState;
use crate::protocol::{ServerEvent, StateSnapshot};

/// One live quiz room.
#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub created_at: DateTime<Utc>,
    state: Mutex<RoomState>,
}

impl Room {
    pub fn new(
        code: String,
        name: String,
        public: bool,
        password: Option<PasswordHash>,
        forward: Option<Forwarder>,
    ) -> Self {
        let state = RoomState {
            code: code.clone(),
            name,
            public,
            password,
            clock: LamportClock::new(),
            roster: Roster::new(),
            bank: QuestionBank::new(),
            game: GameState::new(),
            bus: Bus::new(code.clone(), forward),
        };
        Self {
            code,
            created_at: Utc::now(),
            state: Mutex::new(state),
        }
    }

    /// Acquire the room lock.
    pub async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }
}

/// Everything a room owns, guarded by the room lock.
#[derive(Debug)]
pub struct RoomState {
    pub code: String,
    pub name: String,
    pub public: bool,
    password: Option<PasswordHash>,
    pub clock: LamportClock,
    pub roster: Roster,
    pub bank: QuestionBank,
    pub game: GameState,
    pub bus: Bus,
}

impl RoomState {
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            code: self.code.clone(),
            name: self.name.clone(),
            public: self.public,
            players: self.roster.len(),
            phase: self.game.phase,
        }
    }

    pub fn verify_password(&self, attempt: Option<&str>) -> Result<()> {
        match &self.password {
            None => Ok(()),
            Some(hash) => match attempt {
                Some(p) if hash.verify(p) => Ok(()),
                _ => Err(Error::BadPassword),
            },
        }
    }

    /// Coherent value-copy of the room, safe to send after the lock drops.
    pub fn snapshot(&self) -> StateSnapshot {
        let question = self
            .game
            .current
            .and_then(|i| self.bank.get(i))
            .map(Question::view);
        StateSnapshot {
            phase: self.game.phase,
            members: self.roster.snapshot(),
            question,
            question_index: self.game.current,
            total_questions: self.bank.count(),
        }
    }

    /// Emit an event to every subscriber, advancing the logical clock so
    /// the per-room event stream carries strictly increasing timestamps.
    /// Gameplay traffic skips waiting members, who only follow snapshots
    /// until the next session.
    pub fn emit(&mut self, event: &ServerEvent) {
        let ts = self.clock.tick();
        tracing::debug!(code = %self.code, ts, "Emit");
        let skip: HashSet<Uuid> = if event.is_gameplay() {
            self.roster
                .iter()
                .filter(|m| m.waiting)
                .map(|m| m.id)
                .collect()
        } else {
            HashSet::new()
        };
        self.bus.emit(event, &skip);
    }

    /// Add a member and attach their connection. Joining mid-session as a
    /// player sets the waiting flag; the member plays from the next lobby.
    pub fn join(
        &mut self,
        name: &str,
        password: Option<&str>,
        as_admin: bool,
        conn: ConnHandle,
    ) -> Result<MemberView> {
        self.verify_password(password)?;
        let role = if as_admin { Role::Admin } else { Role::Player };
        let member = self.roster.add(name, role)?;
        let id = member.id;

        let waiting = self.game.phase.in_game() && role == Role::Player;
        if let Some(m) = self.roster.find_mut(id) {
            m.waiting = waiting;
            m.conn = Some(conn.id);
        }
        let view = self.roster.find(id).map(Member::view).unwrap_or_else(|| member.view());

        info!(code = %self.code, name = %view.name, role = ?role, waiting, "Member joined");
        trivion_core::invariants::assert_roster_invariants(&self.roster);

        self.bus.subscribe(id, conn);
        self.emit(&ServerEvent::MemberJoined {
            member: view.clone(),
            members: self.roster.snapshot(),
        });
        if waiting {
            self.emit(&ServerEvent::WaitingMember {
                member: view.clone(),
            });
        }
        Ok(view)
    }

    /// Voluntary departure; no reconnection window.
    pub fn leave(&mut self, member_id: Uuid) -> Option<Member> {
        let member = self.roster.remove(member_id)?;
        if let Some(conn_id) = member.conn {
            self.bus.unsubscribe(conn_id);
        }
        info!(code = %self.code, name = %member.name, "Member left");
        self.emit(&ServerEvent::MemberLeft {
            name: member.name.clone(),
            members: self.roster.snapshot(),
        });
        self.reap_session();
        Some(member)
    }

    /// Administrator removal. The target gets a `kicked` frame before its
    /// subscription is dropped.
    pub fn kick_member(&mut self, actor: Option<Uuid>, target: Uuid) -> Result<Member> {
        self.require_admin(actor)?;
        if self.roster.find(target).is_none() {
            return Err(Error::MemberNotFound);
        }
        self.bus.send_to_member(
            target,
            &ServerEvent::Kicked {
                reason: "Removido pelo administrador".into(),
            },
        );
        let member = self.roster.remove(target).ok_or(Error::MemberNotFound)?;
        if let Some(conn_id) = member.conn {
            self.bus.unsubscribe(conn_id);
        }
        info!(code = %self.code, name = %member.name, "Member removed by admin");
        self.emit(&ServerEvent::MemberLeft {
            name: member.name.clone(),
            members: self.roster.snapshot(),
        });
        self.reap_session();
        Ok(member)
    }

    // --- question bank, mutable only in the lobby ---

    pub fn add_question(&mut self, question: Question) -> Result<()> {
        self.require_lobby()?;
        self.bank.append(question);
        Ok(())
    }

    pub fn remove_question(&mut self, index: usize) -> Result<()> {
        self.require_lobby()?;
        self.bank.remove(index)?;
        Ok(())
    }

    pub fn clear_questions(&mut self) -> Result<()> {
        self.require_lobby()?;
        self.bank.clear();
        Ok(())
    }

    pub fn questions(&self) -> Vec<QuestionDetail> {
        self.bank.list()
    }

    fn require_lobby(&self) -> Result<()> {
        if self.game.phase != Phase::Lobby {
            return Err(Error::PhaseViolation(self.game.phase));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SEND_QUEUE_CAPACITY;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Notify};

    fn conn() -> (ConnHandle, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
        (
            ConnHandle::new(Uuid::new_v4(), tx, Arc::new(Notify::new())),
            rx,
        )
    }

    fn room_state() -> RoomState {
        let room = Room::new("ABC123".into(), "Math".into(), true, None, None);
        room.state.into_inner()
    }

    #[tokio::test]
    async fn test_join_and_snapshot() {
        let mut st = room_state();
        let (c, _rx) = conn();
        let view = st.join("Alice", None, false, c).unwrap();
        assert!(view.connected);
        assert!(!view.waiting);
        let snap = st.snapshot();
        assert_eq!(snap.phase, Phase::Lobby);
        assert_eq!(snap.members.len(), 1);
        assert!(snap.question.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_is_idempotent() {
        let mut st = room_state();
        let (c, _rx) = conn();
        st.join("Alice", None, false, c).unwrap();
        assert_eq!(st.snapshot(), st.snapshot());
    }

    #[tokio::test]
    async fn test_password_gate() {
        let room = Room::new(
            "ABC123".into(),
            "Secret".into(),
            false,
            Some(PasswordHash::new("hunter2")),
            None,
        );
        let mut st = room.state.into_inner();

        let (c, _rx) = conn();
        assert_eq!(
            st.join("Alice", None, false, c.clone()).unwrap_err(),
            Error::BadPassword
        );
        assert_eq!(
            st.join("Alice", Some("wrong"), false, c.clone()).unwrap_err(),
            Error::BadPassword
        );
        assert!(st.join("Alice", Some("hunter2"), false, c).is_ok());
    }

    #[tokio::test]
    async fn test_question_mutation_gated_on_lobby() {
        let mut st = room_state();
        st.game.phase = Phase::Question;
        let q = Question::new(
            "2+2".into(),
            vec!["3".into(), "4".into(), "5".into(), "6".into()],
            1,
            10,
        )
        .unwrap();
        assert!(matches!(
            st.add_question(q.clone()),
            Err(Error::PhaseViolation(Phase::Question))
        ));
        assert!(matches!(
            st.clear_questions(),
            Err(Error::PhaseViolation(_))
        ));
        st.game.phase = Phase::Lobby;
        assert!(st.add_question(q).is_ok());
    }

    #[tokio::test]
    async fn test_kick_requires_admin() {
        let mut st = room_state();
        let (c1, _r1) = conn();
        let (c2, _r2) = conn();
        let alice = st.join("Alice", None, false, c1).unwrap();
        let bob = st.join("Bob", None, false, c2).unwrap();
        assert_eq!(
            st.kick_member(Some(alice.id), bob.id).unwrap_err(),
            Error::NotAuthorized
        );
        assert!(st.kick_member(None, bob.id).is_ok());
        assert_eq!(st.roster.len(), 1);
    }
}
