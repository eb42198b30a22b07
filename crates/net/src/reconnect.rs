//! Reconnection tracker - grace window for disconnected members
//!
//! A dropped connection does not remove its member. The member stays in the
//! roster with no connection handle for ten seconds; a `reconnect` with the
//! member id inside that window swaps a new connection in and replays the
//! room state. On expiry the member is removed for good and `member_left`
//! goes out.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use trivion_core::{Error, Result};

use crate::bus::ConnHandle;
use crate::protocol::ServerEvent;
use crate::registry::Rooms;

/// How long a disconnected member may take to come back.
pub const RECONNECT_WINDOW: Duration = Duration::from_secs(10);

/// Where a connection is attached: one room, one member.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub room_code: String,
    pub member_id: Uuid,
}

struct Slot {
    room_code: String,
    gen: u64,
    opened_at: Instant,
}

/// Pending reconnection slots, keyed by member id.
pub struct ReconnectTracker {
    slots: Mutex<Slots>,
}

#[derive(Default)]
struct Slots {
    by_member: HashMap<Uuid, Slot>,
    next_gen: u64,
}

impl ReconnectTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(Slots::default()),
        })
    }

    /// Open a slot, superseding any previous one for the same member.
    async fn open(&self, member_id: Uuid, room_code: &str) -> u64 {
        let mut slots = self.slots.lock().await;
        slots.next_gen += 1;
        let gen = slots.next_gen;
        slots.by_member.insert(
            member_id,
            Slot {
                room_code: room_code.to_string(),
                gen,
                opened_at: Instant::now(),
            },
        );
        gen
    }

    /// Claim a slot for reconnection; fails once the window has elapsed.
    async fn claim(&self, member_id: Uuid) -> Option<String> {
        let mut slots = self.slots.lock().await;
        let slot = slots.by_member.remove(&member_id)?;
        if slot.opened_at.elapsed() > RECONNECT_WINDOW {
            return None;
        }
        Some(slot.room_code)
    }

    /// Remove the slot if it still belongs to the given expiry task.
    async fn take_if(&self, member_id: Uuid, gen: u64) -> bool {
        let mut slots = self.slots.lock().await;
        match slots.by_member.get(&member_id) {
            Some(slot) if slot.gen == gen => {
                slots.by_member.remove(&member_id);
                true
            }
            _ => false,
        }
    }

    /// Forget a member entirely (voluntary leave, kick).
    pub async fn purge_member(&self, member_id: Uuid) {
        self.slots.lock().await.by_member.remove(&member_id);
    }

    /// Forget every slot pointing at a destroyed room.
    pub async fn purge_room(&self, room_code: &str) {
        self.slots
            .lock()
            .await
            .by_member
            .retain(|_, slot| slot.room_code != room_code);
    }

    pub async fn pending(&self) -> usize {
        self.slots.lock().await.by_member.len()
    }
}

/// Connection-loss path: detach the member, open a slot and schedule the
/// expiry. The member keeps identity, score and seat for the whole window.
pub async fn handle_disconnect(
    rooms: &Arc<Rooms>,
    tracker: &Arc<ReconnectTracker>,
    room_code: &str,
    member_id: Uuid,
    conn_id: Uuid,
) {
    let Some(room) = rooms.find(room_code).await else {
        return;
    };
    {
        let mut st = room.lock().await;
        st.bus.unsubscribe(conn_id);
        match st.roster.find_mut(member_id) {
            // Only detach if this connection is still the member's current
            // one; a reconnect may already have swapped a new handle in.
            Some(member) if member.conn == Some(conn_id) => {
                member.conn = None;
                info!(code = %room_code, member_id = %member_id, "Member disconnected, window open");
            }
            _ => return,
        }
    }

    let gen = tracker.open(member_id, room_code).await;
    let rooms = rooms.clone();
    let tracker = tracker.clone();
    let room_code = room_code.to_string();
    tokio::spawn(async move {
        sleep(RECONNECT_WINDOW).await;
        if !tracker.take_if(member_id, gen).await {
            return;
        }
        let Some(room) = rooms.find(&room_code).await else {
            return;
        };
        let mut st = room.lock().await;
        let still_gone = st
            .roster
            .find(member_id)
            .map(|m| !m.connected())
            .unwrap_or(false);
        if !still_gone {
            return;
        }
        let Some(member) = st.roster.remove(member_id) else {
            return;
        };
        info!(code = %room_code, name = %member.name, "Reconnection window expired");
        let members = st.roster.snapshot();
        st.emit(&ServerEvent::MemberLeft {
            name: member.name.clone(),
            members,
        });
        st.reap_session();
        let empty = st.roster.is_empty();
        drop(st);
        if empty {
            rooms.destroy_if_empty(&room_code).await;
        }
    });
}

/// Reconnect path: swap the new connection in and replay the full state on
/// it. Returns the attachment for the transport adapter.
pub async fn handle_reconnect(
    rooms: &Arc<Rooms>,
    tracker: &Arc<ReconnectTracker>,
    member_id: Uuid,
    conn: ConnHandle,
) -> Result<Attachment> {
    let room_code = tracker
        .claim(member_id)
        .await
        .ok_or(Error::MemberNotFound)?;
    let room = rooms.find(&room_code).await.ok_or(Error::RoomNotFound)?;

    let mut st = room.lock().await;
    let member = st
        .roster
        .find_mut(member_id)
        .ok_or(Error::MemberNotFound)?;
    member.conn = Some(conn.id);
    let view = member.view();
    debug!(code = %room_code, name = %view.name, "Member reconnected");

    st.bus.subscribe(member_id, conn.clone());
    let members = st.roster.snapshot();
    st.emit(&ServerEvent::MemberJoined {
        member: view.clone(),
        members,
    });

    conn.send(&ServerEvent::ReconnectSuccess {
        member_id,
        name: view.name.clone(),
        room_code: room_code.clone(),
        score: view.score,
        waiting: view.waiting,
    });
    conn.send(&ServerEvent::State(st.snapshot()));

    Ok(Attachment {
        room_code,
        member_id,
    })
}
