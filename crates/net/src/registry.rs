//! Room registry - create, find and destroy rooms
//!
//! Process-wide map of live rooms behind its own lock. The registry lock is
//! held only for map operations and always released before a room lock is
//! taken, so operations in distinct rooms proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use trivion_core::{code, Error, PasswordHash, Result, RoomSummary};

use crate::bus::Forwarder;
use crate::protocol::ServerEvent;
use crate::room::Room;

/// Give up code allocation after this many consecutive collisions.
const MAX_CODE_ATTEMPTS: usize = 10;

pub struct Rooms {
    inner: RwLock<HashMap<String, Arc<Room>>>,
    forward: Option<Forwarder>,
}

impl Rooms {
    pub fn new(forward: Option<Forwarder>) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(HashMap::new()),
            forward,
        })
    }

    /// Create a room under a freshly allocated code.
    pub async fn create(
        &self,
        name: &str,
        public: bool,
        password: Option<&str>,
    ) -> Result<Arc<Room>> {
        if name.trim().is_empty() {
            return Err(Error::NameInvalid);
        }
        let hash = password.filter(|p| !p.is_empty()).map(PasswordHash::new);

        let mut map = self.inner.write().await;
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = code::generate(&mut rng);
            if map.contains_key(&candidate) {
                continue;
            }
            let room = Arc::new(Room::new(
                candidate.clone(),
                name.trim().to_string(),
                public,
                hash,
                self.forward.clone(),
            ));
            map.insert(candidate.clone(), room.clone());
            info!(code = %candidate, name = %name, public, "Room created");
            return Ok(room);
        }
        warn!("Room code allocation failed after {} attempts", MAX_CODE_ATTEMPTS);
        Err(Error::CapacityExhausted)
    }

    /// Look a room up by (case-insensitive) code.
    pub async fn find(&self, raw_code: &str) -> Option<Arc<Room>> {
        let normalized = code::normalize(raw_code);
        self.inner.read().await.get(&normalized).cloned()
    }

    /// Summaries of every public room.
    pub async fn list_public(&self) -> Vec<RoomSummary> {
        let rooms: Vec<Arc<Room>> = self.inner.read().await.values().cloned().collect();
        let mut summaries = Vec::new();
        for room in rooms {
            let st = room.lock().await;
            if st.public {
                summaries.push(st.summary());
            }
        }
        summaries
    }

    /// Remove a room, telling every subscriber it is gone.
    pub async fn destroy(&self, raw_code: &str) -> Result<Arc<Room>> {
        let normalized = code::normalize(raw_code);
        let room = self
            .inner
            .write()
            .await
            .remove(&normalized)
            .ok_or(Error::RoomNotFound)?;

        let mut st = room.lock().await;
        st.emit(&ServerEvent::RoomClosed);
        st.bus.clear();
        drop(st);

        info!(code = %normalized, "Room destroyed");
        Ok(room)
    }

    /// Destroy a room whose member set has emptied. Rechecks under both
    /// locks so a concurrent join wins the race.
    pub async fn destroy_if_empty(&self, raw_code: &str) -> bool {
        let normalized = code::normalize(raw_code);
        let mut map = self.inner.write().await;
        let Some(room) = map.get(&normalized).cloned() else {
            return false;
        };
        let st = room.lock().await;
        if !st.roster.is_empty() {
            return false;
        }
        drop(st);
        map.remove(&normalized);
        info!(code = %normalized, "Room removed (empty)");
        true
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
