//! Data models for Trivion

mod answer;
mod member;
mod phase;
mod question;
mod room;

pub use answer::AnswerRecord;
pub use member::{validate_display_name, Member, MemberView, Role, NAME_MAX_CHARS, NAME_MIN_CHARS};
pub use phase::Phase;
pub use question::{
    Question, QuestionDetail, QuestionView, DEADLINE_DEFAULT_SECS, DEADLINE_MAX_SECS,
    DEADLINE_MIN_SECS, OPTION_COUNT,
};
pub use room::{RoomListing, RoomSummary};
