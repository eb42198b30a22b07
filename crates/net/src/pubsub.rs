//! Optional external pub/sub forwarder
//!
//! When `PUBSUB_URL` is configured, every frame the broadcast bus emits is
//! also published to a Redis channel named after the room, letting sibling
//! processes fan the same events out to their own subscribers. Publishing
//! happens on a dedicated task fed by an unbounded channel, so the room
//! lock never waits on the broker.

use redis::AsyncCommands;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::bus::Forwarder;

/// Channel name carrying a room's event stream.
fn channel_for(room_code: &str) -> String {
    format!("trivion.room.{}", room_code)
}

/// Handle to the running forwarder task.
pub struct PubSub {
    tx: Forwarder,
}

impl PubSub {
    /// Connect to the broker and spawn the publisher task.
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_tokio_connection().await?;
        info!(url = %url, "Pub/sub forwarder connected");

        let (tx, mut rx) = mpsc::unbounded_channel::<(String, String)>();
        tokio::spawn(async move {
            while let Some((room_code, frame)) = rx.recv().await {
                let channel = channel_for(&room_code);
                if let Err(e) = conn.publish::<_, _, ()>(&channel, &frame).await {
                    warn!(channel = %channel, error = %e, "Pub/sub publish failed");
                }
            }
        });

        Ok(Self { tx })
    }

    /// Sender handed to each room's bus.
    pub fn forwarder(&self) -> Forwarder {
        self.tx.clone()
    }
}
