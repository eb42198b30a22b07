//! Room summary models

use serde::{Deserialize, Serialize};

use super::Phase;

/// Full summary of a room: `room_created`, `welcome` and the admin UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub code: String,
    pub name: String,
    pub public: bool,
    /// Current member count.
    pub players: usize,
    pub phase: Phase,
}

impl RoomSummary {
    /// Narrow to the `available_rooms` wire shape.
    pub fn listing(&self) -> RoomListing {
        RoomListing {
            code: self.code.clone(),
            name: self.name.clone(),
            players: self.players,
        }
    }
}

/// One row of the public room list. The `available_rooms` payload carries
/// exactly these fields and nothing more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomListing {
    pub code: String,
    pub name: String,
    pub players: usize,
}
