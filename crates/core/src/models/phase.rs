//! Game phase

use serde::{Deserialize, Serialize};

/// Discrete stage of a room's coordinator. Progression is linear:
/// lobby → countdown → question → results → (countdown … | podium) →
/// leaderboard → lobby. Administrator `end` returns to lobby from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lobby,
    Countdown,
    Question,
    Results,
    Podium,
    Leaderboard,
}

impl Phase {
    /// Legal edges of the phase graph. `end` makes lobby reachable from
    /// every phase.
    pub fn can_transition_to(self, next: Phase) -> bool {
        if next == Phase::Lobby {
            return true;
        }
        matches!(
            (self, next),
            (Phase::Lobby, Phase::Countdown)
                | (Phase::Countdown, Phase::Question)
                | (Phase::Question, Phase::Results)
                | (Phase::Results, Phase::Countdown)
                | (Phase::Results, Phase::Podium)
                | (Phase::Podium, Phase::Leaderboard)
        )
    }

    /// True while a session is running (anything but the lobby).
    pub fn in_game(self) -> bool {
        self != Phase::Lobby
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Lobby => "lobby",
            Phase::Countdown => "countdown",
            Phase::Question => "question",
            Phase::Results => "results",
            Phase::Podium => "podium",
            Phase::Leaderboard => "leaderboard",
        };
        write!(f, "{}", name)
    }
}
