//! Wire protocol message types
//!
//! All frames are JSON text of the shape `{tag, payload}`. Both directions
//! are closed discriminated unions; unknown inbound tags fail to decode and
//! are answered with a targeted `error` frame.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use trivion_core::{Error, MemberView, Phase, QuestionView, RankingEntry, RoomListing, RoomSummary};

/// Events sent by clients over the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tag", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    ListRooms,
    CreateRoom {
        name: String,
        #[serde(default = "default_public")]
        public: bool,
        #[serde(default)]
        password: Option<String>,
    },
    JoinRoom {
        #[serde(default)]
        code: Option<String>,
        name: String,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        as_admin: bool,
    },
    LeaveRoom,
    Reconnect {
        member_id: Uuid,
    },
    Answer {
        choice: i64,
        #[serde(default)]
        timestamp: u64,
    },
    GetState,
    PongHeartbeat,
    // Administrator commands; role-checked before dispatch.
    StartGame,
    Next,
    EndGame,
    BackToLobby,
    RemoveMember {
        member_id: Uuid,
    },
}

fn default_public() -> bool {
    true
}

/// Events emitted by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    AvailableRooms {
        rooms: Vec<RoomListing>,
    },
    RoomCreated {
        room: RoomSummary,
        code: String,
    },
    Welcome {
        member: MemberView,
        room: RoomSummary,
        state: StateSnapshot,
    },
    ReconnectSuccess {
        member_id: Uuid,
        name: String,
        room_code: String,
        score: u32,
        waiting: bool,
    },
    ReconnectFailed {
        message: String,
    },
    State(StateSnapshot),
    MemberJoined {
        member: MemberView,
        members: Vec<MemberView>,
    },
    MemberLeft {
        name: String,
        members: Vec<MemberView>,
    },
    WaitingMember {
        member: MemberView,
    },
    Countdown {
        seconds: u32,
    },
    Question {
        question: QuestionView,
        number: usize,
        total: usize,
        timestamp: u64,
    },
    PlayerAnswered {
        answered: usize,
        total: usize,
    },
    Results {
        ranking: Vec<RankingEntry>,
        correct: usize,
        stats: [usize; 4],
    },
    PodiumStart,
    PodiumPosition {
        position: usize,
        member: MemberView,
    },
    PodiumComplete {
        ranking: Vec<RankingEntry>,
    },
    GameEnded {
        members: Vec<MemberView>,
    },
    RoomClosed,
    Kicked {
        reason: String,
    },
    PingHeartbeat,
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Targeted error frame carrying the user-readable message.
    pub fn error(err: &Error) -> Self {
        ServerEvent::Error {
            message: err.user_message(),
        }
    }

    /// Gameplay traffic is withheld from waiting members: they joined
    /// mid-session and receive only snapshots and membership updates until
    /// the next lobby.
    pub fn is_gameplay(&self) -> bool {
        matches!(
            self,
            ServerEvent::Countdown { .. }
                | ServerEvent::Question { .. }
                | ServerEvent::PlayerAnswered { .. }
                | ServerEvent::Results { .. }
                | ServerEvent::PodiumStart
                | ServerEvent::PodiumPosition { .. }
                | ServerEvent::PodiumComplete { .. }
        )
    }
}

/// Full room state, replayed on `get_state`, `welcome` and reconnection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub phase: Phase,
    pub members: Vec<MemberView>,
    pub question: Option<QuestionView>,
    pub question_index: Option<usize>,
    pub total_questions: usize,
}
