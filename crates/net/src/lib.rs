//! Trivion Network Library
//!
//! The async half of the quiz service: wire protocol, broadcast bus, room
//! registry, game coordinator, reconnection tracking, and the WebSocket +
//! HTTP transport.
//!
//! # Architecture
//!
//! - **Transport adapter**: one socket per client at `/ws`, frames of the
//!   shape `{tag, payload}`; a REST surface under `/api` for the admin UI
//! - **Rooms**: registry map under its own lock, one mutex per room
//! - **Coordinator**: phase machine driven by commands, answers and
//!   generation-counted timers
//!
//! # Usage
//!
//! ```ignore
//! let app = App::new(None);
//! let router = trivion_net::router(app);
//! axum::serve(listener, router).await?;
//! ```

pub mod bus;
pub mod coordinator;
pub mod http;
pub mod protocol;
pub mod pubsub;
pub mod reconnect;
pub mod registry;
pub mod room;
pub mod ws;

use std::sync::Arc;

pub use bus::{ConnHandle, Forwarder, SEND_QUEUE_CAPACITY};
pub use http::router;
pub use protocol::{ClientEvent, ServerEvent, StateSnapshot};
pub use pubsub::PubSub;
pub use reconnect::{Attachment, ReconnectTracker, RECONNECT_WINDOW};
pub use registry::Rooms;
pub use room::{Room, RoomState};

/// Shared service state handed to every transport handler.
pub struct App {
    pub rooms: Arc<Rooms>,
    pub reconnect: Arc<ReconnectTracker>,
}

pub type AppHandle = Arc<App>;

impl App {
    /// Build the service, optionally mirroring broadcasts into an external
    /// pub/sub broker.
    pub fn new(forward: Option<Forwarder>) -> AppHandle {
        Arc::new(Self {
            rooms: Rooms::new(forward),
            reconnect: ReconnectTracker::new(),
        })
    }
}
