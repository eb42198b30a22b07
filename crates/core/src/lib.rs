//! Trivion Core Library
//!
//! Domain types and rules for the Trivion quiz service: rooms, members,
//! questions, the per-room Lamport clock, and answer scoring. Everything in
//! this crate is synchronous; callers serialize access under the room lock.

pub mod bank;
pub mod clock;
pub mod code;
pub mod error;
pub mod invariants;
pub mod models;
pub mod roster;
pub mod scoring;
pub mod secret;

pub use bank::QuestionBank;
pub use clock::LamportClock;
pub use error::{Error, Result};
pub use models::*;
pub use roster::{RankingEntry, Roster};
pub use secret::PasswordHash;
