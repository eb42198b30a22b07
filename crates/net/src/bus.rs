//! Broadcast bus - typed fan-out to every socket subscribed to a room
//!
//! Emission happens under the room lock: frames are serialized once and
//! pushed onto each subscriber's bounded queue with `try_send`, so the lock
//! is never held across network I/O. A full queue means the subscriber is
//! too slow; it is dropped and its connection is told to shut down. Frames
//! queued within one critical section therefore reach every surviving
//! subscriber in emission order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::ServerEvent;

/// Capacity of each subscriber's outbound frame queue.
pub const SEND_QUEUE_CAPACITY: usize = 64;

/// Channel used to mirror frames into an external pub/sub broker.
pub type Forwarder = mpsc::UnboundedSender<(String, String)>;

/// Writable half of one connection, shared between the transport adapter
/// and the bus.
#[derive(Debug, Clone)]
pub struct ConnHandle {
    pub id: Uuid,
    frames: mpsc::Sender<Arc<String>>,
    kill: Arc<Notify>,
}

impl ConnHandle {
    pub fn new(id: Uuid, frames: mpsc::Sender<Arc<String>>, kill: Arc<Notify>) -> Self {
        Self { id, frames, kill }
    }

    /// Queue a targeted event on this connection.
    pub fn send(&self, event: &ServerEvent) {
        self.send_frame(encode(event));
    }

    /// Queue a pre-encoded frame. On overflow the connection is killed.
    pub fn send_frame(&self, frame: Arc<String>) -> bool {
        match self.frames.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn_id = %self.id, "Send queue overflow, dropping connection");
                self.kill.notify_one();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Ask the owning connection task to close.
    pub fn shutdown(&self) {
        self.kill.notify_one();
    }
}

/// Serialize an event into a shareable wire frame.
pub fn encode(event: &ServerEvent) -> Arc<String> {
    // The protocol contains no non-string map keys; serialization is total.
    Arc::new(serde_json::to_string(event).unwrap_or_default())
}

#[derive(Debug)]
struct Subscriber {
    member_id: Uuid,
    conn: ConnHandle,
}

/// Per-room fan-out table, keyed by connection id.
#[derive(Debug)]
pub struct Bus {
    code: String,
    subscribers: HashMap<Uuid, Subscriber>,
    forward: Option<Forwarder>,
}

impl Bus {
    pub fn new(code: String, forward: Option<Forwarder>) -> Self {
        Self {
            code,
            subscribers: HashMap::new(),
            forward,
        }
    }

    pub fn subscribe(&mut self, member_id: Uuid, conn: ConnHandle) {
        self.subscribers.insert(conn.id, Subscriber { member_id, conn });
    }

    pub fn unsubscribe(&mut self, conn_id: Uuid) {
        self.subscribers.remove(&conn_id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Fan an event out to every subscriber except the members in `skip`.
    /// Overflowing subscribers are removed; their connections observe the
    /// kill signal and run the regular disconnect path.
    pub fn emit(&mut self, event: &ServerEvent, skip: &HashSet<Uuid>) {
        let frame = encode(event);
        let mut dead = Vec::new();
        for (conn_id, sub) in &self.subscribers {
            if skip.contains(&sub.member_id) {
                continue;
            }
            if !sub.conn.send_frame(frame.clone()) {
                dead.push(*conn_id);
            }
        }
        for conn_id in dead {
            debug!(code = %self.code, conn_id = %conn_id, "Removing dead subscriber");
            self.subscribers.remove(&conn_id);
        }
        if let Some(forward) = &self.forward {
            let _ = forward.send((self.code.clone(), frame.as_ref().clone()));
        }
    }

    /// Targeted send to one member's connection, if subscribed.
    pub fn send_to_member(&self, member_id: Uuid, event: &ServerEvent) -> bool {
        for sub in self.subscribers.values() {
            if sub.member_id == member_id {
                return sub.conn.send_frame(encode(event));
            }
        }
        false
    }

    /// Drop every subscriber and tell their connections to close. Used when
    /// the room itself is destroyed.
    pub fn clear(&mut self) {
        for sub in self.subscribers.values() {
            sub.conn.shutdown();
        }
        self.subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> (ConnHandle, mpsc::Receiver<Arc<String>>, Arc<Notify>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
        let kill = Arc::new(Notify::new());
        (ConnHandle::new(Uuid::new_v4(), tx, kill.clone()), rx, kill)
    }

    #[tokio::test]
    async fn test_emit_preserves_order() {
        let mut bus = Bus::new("ABC123".into(), None);
        let (conn, mut rx, _kill) = test_conn();
        bus.subscribe(Uuid::new_v4(), conn);

        bus.emit(&ServerEvent::Countdown { seconds: 3 }, &HashSet::new());
        bus.emit(&ServerEvent::PodiumStart, &HashSet::new());

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.contains("countdown"));
        assert!(second.contains("podium_start"));
    }

    #[tokio::test]
    async fn test_skip_set_filters_members() {
        let mut bus = Bus::new("ABC123".into(), None);
        let waiting = Uuid::new_v4();
        let playing = Uuid::new_v4();
        let (conn_a, mut rx_a, _k1) = test_conn();
        let (conn_b, mut rx_b, _k2) = test_conn();
        bus.subscribe(waiting, conn_a);
        bus.subscribe(playing, conn_b);

        let skip: HashSet<Uuid> = [waiting].into_iter().collect();
        bus.emit(&ServerEvent::Countdown { seconds: 3 }, &skip);

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.recv().await.unwrap().contains("countdown"));
    }

    #[tokio::test]
    async fn test_overflow_drops_subscriber() {
        let mut bus = Bus::new("ABC123".into(), None);
        let (tx, _rx, kill) = {
            let (tx, rx) = mpsc::channel(1);
            (tx, rx, Arc::new(Notify::new()))
        };
        let conn = ConnHandle::new(Uuid::new_v4(), tx, kill.clone());
        bus.subscribe(Uuid::new_v4(), conn);

        // First frame fills the queue, second overflows it.
        bus.emit(&ServerEvent::PodiumStart, &HashSet::new());
        bus.emit(&ServerEvent::PodiumStart, &HashSet::new());
        assert_eq!(bus.subscriber_count(), 0);

        // The kill signal is latched for the connection task.
        tokio::time::timeout(std::time::Duration::from_millis(50), kill.notified())
            .await
            .expect("kill signal expected");
    }

    #[tokio::test]
    async fn test_forwarder_mirrors_frames() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut bus = Bus::new("ABC123".into(), Some(tx));
        bus.emit(&ServerEvent::Countdown { seconds: 3 }, &HashSet::new());

        let (code, frame) = rx.recv().await.unwrap();
        assert_eq!(code, "ABC123");
        assert!(frame.contains("countdown"));
    }
}
