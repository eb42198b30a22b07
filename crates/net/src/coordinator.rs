//! Game coordinator - the per-room phase state machine
//!
//! Inputs are administrator commands, player answers, timer firings and
//! member departures; outputs are broadcast events. Every transition runs
//! under the room lock, and timers are cancelled and recreated inside the
//! same critical section that emits the outbound events.
//!
//! Timers are spawned tasks that carry only the room code, a handle to the
//! registry and a generation number. Each transition bumps the generation;
//! a stale callback reacquires the lock, sees the mismatch and returns.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use trivion_core::{invariants, scoring, AnswerRecord, Error, Phase, Result};

use crate::protocol::ServerEvent;
use crate::registry::Rooms;
use crate::room::RoomState;

/// Seconds shown on the pre-question countdown.
pub const COUNTDOWN_SECS: u32 = 3;

/// Pause between podium position reveals.
const PODIUM_STEP: Duration = Duration::from_secs(1);

/// Pause between the final reveal and the complete ranking.
const PODIUM_FINAL_PAUSE: Duration = Duration::from_secs(2);

/// Coordinator bookkeeping for one room.
#[derive(Debug)]
pub struct GameState {
    pub phase: Phase,
    /// Index of the question in play, `None` in the lobby.
    pub current: Option<usize>,
    /// Accepted answers for the current question, one per player.
    pub answers: HashMap<Uuid, AnswerRecord>,
    /// Emission instant of the current question, for elapsed measurement.
    question_started: Option<Instant>,
    /// Bumped on every transition; stale timer callbacks compare and abort.
    timer_gen: u64,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Lobby,
            current: None,
            answers: HashMap::new(),
            question_started: None,
            timer_gen: 0,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomState {
    /// `None` is the trusted HTTP admin surface; socket callers pass their
    /// member id and must hold the administrator role.
    pub(crate) fn require_admin(&self, actor: Option<Uuid>) -> Result<()> {
        match actor {
            None => Ok(()),
            Some(id) => {
                let member = self.roster.find(id).ok_or(Error::NotConnected)?;
                if member.role.is_admin() {
                    Ok(())
                } else {
                    Err(Error::NotAuthorized)
                }
            }
        }
    }

    /// Begin a session: requires the lobby, at least one player and at
    /// least one question. Waiting flags freeze to false for everyone
    /// present.
    pub fn start_game(&mut self, actor: Option<Uuid>, rooms: &Arc<Rooms>) -> Result<()> {
        self.require_admin(actor)?;
        if self.game.phase != Phase::Lobby {
            return Err(Error::PhaseViolation(self.game.phase));
        }
        self.roster.clear_waiting();
        if self.roster.active_players().count() == 0 || self.bank.is_empty() {
            return Err(Error::PhaseViolation(Phase::Lobby));
        }

        self.game.current = Some(0);
        info!(code = %self.code, questions = self.bank.count(), "Game started");
        self.enter_countdown(rooms);
        Ok(())
    }

    /// Administrator advances past a results screen: next question if any
    /// remain, otherwise the podium.
    pub fn next(&mut self, actor: Option<Uuid>, rooms: &Arc<Rooms>) -> Result<()> {
        self.require_admin(actor)?;
        if self.game.phase != Phase::Results {
            return Err(Error::PhaseViolation(self.game.phase));
        }
        let index = self.game.current.unwrap_or(0);
        if index + 1 < self.bank.count() {
            self.game.current = Some(index + 1);
            self.enter_countdown(rooms);
        } else {
            self.enter_podium(rooms);
        }
        Ok(())
    }

    /// Administrator aborts the session from any phase. Timers die via the
    /// generation bump; members stay; the next event is `game_ended`.
    pub fn end_game(&mut self, actor: Option<Uuid>) -> Result<()> {
        self.require_admin(actor)?;
        info!(code = %self.code, phase = %self.game.phase, "Game ended by admin");
        self.reset_session();
        self.emit(&ServerEvent::GameEnded {
            members: self.roster.snapshot(),
        });
        Ok(())
    }

    /// Leaderboard → lobby: scores and waiting flags reset, everyone plays
    /// the next session.
    pub fn back_to_lobby(&mut self, actor: Option<Uuid>) -> Result<()> {
        self.require_admin(actor)?;
        if self.game.phase != Phase::Leaderboard {
            return Err(Error::PhaseViolation(self.game.phase));
        }
        self.reset_session();
        self.emit(&ServerEvent::GameEnded {
            members: self.roster.snapshot(),
        });
        Ok(())
    }

    /// Accept one answer from a connected, non-waiting player during the
    /// question phase. The client timestamp only advances the logical
    /// clock; scoring uses the server-measured elapsed time.
    pub fn submit_answer(&mut self, member_id: Uuid, choice: i64, client_ts: u64) -> Result<()> {
        if self.game.phase != Phase::Question {
            return Err(Error::PhaseViolation(self.game.phase));
        }
        let index = self.game.current.ok_or(Error::PhaseViolation(self.game.phase))?;
        let question = self
            .bank
            .get(index)
            .cloned()
            .ok_or(Error::PhaseViolation(self.game.phase))?;

        let member = self.roster.find(member_id).ok_or(Error::NotConnected)?;
        if member.role.is_admin() {
            return Err(Error::NotAuthorized);
        }
        if member.waiting {
            return Err(Error::PhaseViolation(self.game.phase));
        }
        if !member.connected() {
            return Err(Error::NotConnected);
        }
        if self.game.answers.contains_key(&member_id) {
            return Err(Error::AlreadyAnswered);
        }
        if !(0..4).contains(&choice) {
            return Err(Error::OptionOutOfRange);
        }
        let choice = choice as usize;

        let ts = self.clock.observe(client_ts);
        let elapsed_ms = self
            .game
            .question_started
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0)
            .min(question.deadline_ms());
        let points = scoring::score_answer(question.is_correct(choice), elapsed_ms, question.deadline_ms());

        self.game.answers.insert(
            member_id,
            AnswerRecord {
                choice: Some(choice),
                logical_ts: ts,
                elapsed_ms,
                points,
            },
        );
        self.roster.add_score(member_id, points)?;
        if let Some(m) = self.roster.find_mut(member_id) {
            m.answered = true;
            m.last_answer_ts = Some(ts);
        }

        let answered = self.game.answers.len();
        let total = self.roster.active_players().count();
        debug!(code = %self.code, member_id = %member_id, choice, ts, points, "Answer accepted");
        self.emit(&ServerEvent::PlayerAnswered { answered, total });

        // Everyone in: collapse the deadline timer and show results.
        if answered >= total {
            self.enter_results();
        }
        Ok(())
    }

    /// Called after any removal: a session with no remaining players ends
    /// rather than stalling on a deadline nobody can meet.
    pub(crate) fn reap_session(&mut self) {
        if self.game.phase.in_game()
            && !self.roster.is_empty()
            && self.roster.active_players().count() == 0
        {
            warn!(code = %self.code, "No active players left, ending session");
            self.reset_session();
            self.emit(&ServerEvent::GameEnded {
                members: self.roster.snapshot(),
            });
        }
    }

    fn enter_countdown(&mut self, rooms: &Arc<Rooms>) {
        invariants::assert_phase_edge(self.game.phase, Phase::Countdown);
        self.game.timer_gen += 1;
        self.game.phase = Phase::Countdown;
        self.emit(&ServerEvent::Countdown {
            seconds: COUNTDOWN_SECS,
        });
        schedule_countdown(rooms.clone(), self.code.clone(), self.game.timer_gen);
    }

    pub(crate) fn enter_question(&mut self, rooms: &Arc<Rooms>) {
        let Some(index) = self.game.current else {
            return;
        };
        let Some(question) = self.bank.get(index).cloned() else {
            return;
        };

        invariants::assert_phase_edge(self.game.phase, Phase::Question);
        self.game.timer_gen += 1;
        self.game.phase = Phase::Question;
        self.roster.reset_for_question();
        self.game.answers.clear();
        self.game.question_started = Some(Instant::now());

        let ts = self.clock.tick();
        self.emit(&ServerEvent::Question {
            question: question.view(),
            number: index + 1,
            total: self.bank.count(),
            timestamp: ts,
        });
        schedule_deadline(
            rooms.clone(),
            self.code.clone(),
            self.game.timer_gen,
            question.deadline_secs,
        );
    }

    pub(crate) fn enter_results(&mut self) {
        invariants::assert_phase_edge(self.game.phase, Phase::Results);
        self.game.timer_gen += 1;
        self.game.phase = Phase::Results;

        let Some(question) = self.game.current.and_then(|i| self.bank.get(i)).cloned() else {
            return;
        };

        // Absent players are marked as timeouts before the tally.
        let absent: Vec<Uuid> = self
            .roster
            .active_players()
            .filter(|m| !self.game.answers.contains_key(&m.id))
            .map(|m| m.id)
            .collect();
        for id in absent {
            let ts = self.clock.tick();
            self.game
                .answers
                .insert(id, AnswerRecord::timeout(ts, question.deadline_ms()));
            if let Some(m) = self.roster.find_mut(id) {
                m.last_delta = 0;
            }
        }

        let mut stats = [0usize; 4];
        for record in self.game.answers.values() {
            if let Some(choice) = record.choice {
                stats[choice] += 1;
            }
        }

        self.emit(&ServerEvent::Results {
            ranking: self.roster.ranking(),
            correct: question.correct,
            stats,
        });
    }

    fn enter_podium(&mut self, rooms: &Arc<Rooms>) {
        invariants::assert_phase_edge(self.game.phase, Phase::Podium);
        self.game.timer_gen += 1;
        self.game.phase = Phase::Podium;
        self.emit(&ServerEvent::PodiumStart);
        schedule_podium(rooms.clone(), self.code.clone(), self.game.timer_gen);
    }

    pub(crate) fn enter_leaderboard(&mut self) {
        invariants::assert_phase_edge(self.game.phase, Phase::Leaderboard);
        self.game.timer_gen += 1;
        self.game.phase = Phase::Leaderboard;
        self.emit(&ServerEvent::PodiumComplete {
            ranking: self.roster.ranking(),
        });
    }

    /// Cancel timers and put the room back in the lobby, keeping members.
    fn reset_session(&mut self) {
        self.game.timer_gen += 1;
        self.game.phase = Phase::Lobby;
        self.game.current = None;
        self.game.answers.clear();
        self.game.question_started = None;
        self.roster.reset_scores();
        self.roster.clear_waiting();
    }

    pub fn timer_gen(&self) -> u64 {
        self.game.timer_gen
    }
}

/// Countdown expiry: open the question if the room is still counting down.
fn schedule_countdown(rooms: Arc<Rooms>, code: String, gen: u64) {
    tokio::spawn(async move {
        sleep(Duration::from_secs(u64::from(COUNTDOWN_SECS))).await;
        let Some(room) = rooms.find(&code).await else {
            return;
        };
        let mut st = room.lock().await;
        if st.timer_gen() != gen || st.game.phase != Phase::Countdown {
            return;
        }
        st.enter_question(&rooms);
    });
}

/// Question deadline: collapse to results unless an answer already did.
fn schedule_deadline(rooms: Arc<Rooms>, code: String, gen: u64, secs: u32) {
    tokio::spawn(async move {
        sleep(Duration::from_secs(u64::from(secs))).await;
        let Some(room) = rooms.find(&code).await else {
            return;
        };
        let mut st = room.lock().await;
        if st.timer_gen() != gen || st.game.phase != Phase::Question {
            debug!(code = %code, "Stale question timer ignored");
            return;
        }
        debug!(code = %code, "Question deadline reached");
        st.enter_results();
    });
}

/// Podium cadence: reveal the top three bottom-up, one second apart, then
/// the complete ranking two seconds after the winner.
fn schedule_podium(rooms: Arc<Rooms>, code: String, gen: u64) {
    tokio::spawn(async move {
        let mut position = {
            let Some(room) = rooms.find(&code).await else {
                return;
            };
            let st = room.lock().await;
            if st.timer_gen() != gen {
                return;
            }
            st.roster.ranking().len().min(3)
        };

        while position >= 1 {
            sleep(PODIUM_STEP).await;
            let Some(room) = rooms.find(&code).await else {
                return;
            };
            let mut st = room.lock().await;
            if st.timer_gen() != gen || st.game.phase != Phase::Podium {
                return;
            }
            let entry = st.roster.ranking().into_iter().nth(position - 1);
            if let Some(entry) = entry {
                if let Some(view) = st.roster.find(entry.id).map(|m| m.view()) {
                    st.emit(&ServerEvent::PodiumPosition {
                        position,
                        member: view,
                    });
                }
            }
            position -= 1;
        }

        sleep(PODIUM_FINAL_PAUSE).await;
        let Some(room) = rooms.find(&code).await else {
            return;
        };
        let mut st = room.lock().await;
        if st.timer_gen() != gen || st.game.phase != Phase::Podium {
            return;
        }
        st.enter_leaderboard();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{ConnHandle, SEND_QUEUE_CAPACITY};
    use crate::room::Room;
    use tokio::sync::{mpsc, Notify};
    use trivion_core::Question;

    fn conn() -> (ConnHandle, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
        (
            ConnHandle::new(Uuid::new_v4(), tx, Arc::new(Notify::new())),
            rx,
        )
    }

    fn question(deadline: u32) -> Question {
        Question::new(
            "2+2".into(),
            vec!["3".into(), "4".into(), "5".into(), "6".into()],
            1,
            deadline,
        )
        .unwrap()
    }

    async fn room_with_players(
        rooms: &Arc<Rooms>,
        players: &[&str],
    ) -> (Arc<Room>, Vec<Uuid>, Vec<mpsc::Receiver<Arc<String>>>) {
        let room = rooms.create("Test", true, None).await.unwrap();
        let mut ids = Vec::new();
        let mut receivers = Vec::new();
        {
            let mut st = room.lock().await;
            st.add_question(question(10)).unwrap();
            let (c, rx) = conn();
            receivers.push(rx);
            st.join("Host", None, true, c).unwrap();
            for name in players {
                let (c, rx) = conn();
                receivers.push(rx);
                ids.push(st.join(name, None, false, c).unwrap().id);
            }
        }
        (room, ids, receivers)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_requires_player_and_question() {
        let rooms = Rooms::new(None);
        let room = rooms.create("Empty", true, None).await.unwrap();
        let mut st = room.lock().await;
        // No players, no questions.
        assert!(st.start_game(None, &rooms).is_err());

        let (c, _rx) = conn();
        st.join("Alice", None, false, c).unwrap();
        // Player present but still no question.
        assert!(st.start_game(None, &rooms).is_err());

        st.add_question(question(10)).unwrap();
        assert!(st.start_game(None, &rooms).is_ok());
        assert_eq!(st.game.phase, Phase::Countdown);
        // Starting twice is a phase violation.
        assert!(matches!(
            st.start_game(None, &rooms),
            Err(Error::PhaseViolation(Phase::Countdown))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_opens_question() {
        let rooms = Rooms::new(None);
        let (room, _ids, _rxs) = room_with_players(&rooms, &["Alice"]).await;
        room.lock().await.start_game(None, &rooms).unwrap();

        sleep(Duration::from_millis(3_100)).await;
        assert_eq!(room.lock().await.game.phase, Phase::Question);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_rules() {
        let rooms = Rooms::new(None);
        let (room, ids, _rxs) = room_with_players(&rooms, &["Alice", "Bob"]).await;
        let alice = ids[0];
        let bob = ids[1];

        // Answers outside the question phase are rejected.
        assert!(matches!(
            room.lock().await.submit_answer(alice, 1, 0),
            Err(Error::PhaseViolation(Phase::Lobby))
        ));

        room.lock().await.start_game(None, &rooms).unwrap();
        sleep(Duration::from_millis(3_100)).await;

        let mut st = room.lock().await;
        // Pin the elapsed measurement to zero for exact score assertions.
        st.game.question_started = Some(Instant::now());
        let admin = st.roster.admin().unwrap().id;
        assert!(matches!(
            st.submit_answer(admin, 1, 0),
            Err(Error::NotAuthorized)
        ));
        assert!(matches!(
            st.submit_answer(alice, 7, 0),
            Err(Error::OptionOutOfRange)
        ));
        assert!(matches!(
            st.submit_answer(alice, -1, 0),
            Err(Error::OptionOutOfRange)
        ));

        st.submit_answer(alice, 1, 0).unwrap();
        assert!(matches!(
            st.submit_answer(alice, 2, 0),
            Err(Error::AlreadyAnswered)
        ));

        // Last answer collapses the timer straight into results.
        st.submit_answer(bob, 2, 0).unwrap();
        assert_eq!(st.game.phase, Phase::Results);
        assert_eq!(st.roster.find(alice).unwrap().score, 1000);
        assert_eq!(st.roster.find(bob).unwrap().score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_marks_absent_players_as_timeout() {
        let rooms = Rooms::new(None);
        let (room, ids, _rxs) = room_with_players(&rooms, &["Alice"]).await;
        room.lock().await.start_game(None, &rooms).unwrap();

        sleep(Duration::from_millis(13_200)).await;
        let st = room.lock().await;
        assert_eq!(st.game.phase, Phase::Results);
        let record = st.game.answers.get(&ids[0]).unwrap();
        assert!(record.is_timeout());
        assert_eq!(st.roster.find(ids[0]).unwrap().score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_cancels_pending_timers() {
        let rooms = Rooms::new(None);
        let (room, _ids, _rxs) = room_with_players(&rooms, &["Alice"]).await;
        room.lock().await.start_game(None, &rooms).unwrap();
        room.lock().await.end_game(None).unwrap();
        assert_eq!(room.lock().await.game.phase, Phase::Lobby);

        // The countdown timer fires into a bumped generation: no-op.
        sleep(Duration::from_secs(20)).await;
        assert_eq!(room.lock().await.game.phase, Phase::Lobby);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_requires_results() {
        let rooms = Rooms::new(None);
        let (room, _ids, _rxs) = room_with_players(&rooms, &["Alice"]).await;
        assert!(matches!(
            room.lock().await.next(None, &rooms),
            Err(Error::PhaseViolation(Phase::Lobby))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scores_survive_reconnect_window_but_not_reset() {
        let rooms = Rooms::new(None);
        let (room, ids, _rxs) = room_with_players(&rooms, &["Alice"]).await;
        room.lock().await.start_game(None, &rooms).unwrap();
        sleep(Duration::from_millis(3_100)).await;
        room.lock().await.game.question_started = Some(Instant::now());
        room.lock().await.submit_answer(ids[0], 1, 0).unwrap();
        assert_eq!(room.lock().await.roster.find(ids[0]).unwrap().score, 1000);

        room.lock().await.end_game(None).unwrap();
        assert_eq!(room.lock().await.roster.find(ids[0]).unwrap().score, 0);
    }
}
