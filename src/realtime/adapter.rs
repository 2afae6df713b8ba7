//! Redis pub/sub fan-out between nodes.
//!
//! Each node publishes every emit on one channel and delivers envelopes from
//! other nodes to its local members. Delivery is exactly what Redis pub/sub
//! offers: at most once, no replay.

use futures::StreamExt;
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::realtime::hub::{ConnectionId, Hub};

/// Adjust a user's count and drop the field once it reaches zero, atomically
static BUMP_PRESENCE: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r"
        local n = redis.call('HINCRBY', KEYS[1], ARGV[1], ARGV[2])
        if n <= 0 then
            redis.call('HDEL', KEYS[1], ARGV[1])
        end
        return n
        ",
    )
});

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Adapter already started")]
    AlreadyStarted,
}

/// Message exchanged between nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterEnvelope {
    pub node: String,
    pub room: String,
    pub payload: String,
    #[serde(default)]
    pub except: Option<ConnectionId>,
}

#[derive(Debug)]
enum AdapterCommand {
    Publish(AdapterEnvelope),
    Presence { user_id: String, delta: i64 },
}

pub struct RedisAdapter {
    node_id: String,
    channel: String,
    presence_key: String,
    client: redis::Client,
    conn: ConnectionManager,
    commands: mpsc::UnboundedSender<AdapterCommand>,
    pending: Mutex<Option<mpsc::UnboundedReceiver<AdapterCommand>>>,
}

impl RedisAdapter {
    pub async fn connect(redis_url: &str, channel: &str, node_id: &str) -> Result<Arc<Self>, AdapterError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        let (commands, pending) = mpsc::unbounded_channel();

        tracing::info!(node_id, channel, "Realtime adapter connected");
        Ok(Arc::new(Self {
            node_id: node_id.to_string(),
            channel: channel.to_string(),
            presence_key: presence_key(channel),
            client,
            conn,
            commands,
            pending: Mutex::new(Some(pending)),
        }))
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Spawn the publisher and subscriber tasks
    pub fn start(self: &Arc<Self>, hub: Arc<Hub>) -> Result<(), AdapterError> {
        let receiver = self
            .pending
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or(AdapterError::AlreadyStarted)?;

        tokio::spawn(Arc::clone(self).run_commands(receiver));
        tokio::spawn(Arc::clone(self).run_subscriber(hub));
        Ok(())
    }

    /// Queue an envelope for publishing. Failures are logged by the publisher.
    pub fn publish(&self, envelope: AdapterEnvelope) {
        if self.commands.send(AdapterCommand::Publish(envelope)).is_err() {
            tracing::warn!("Realtime adapter publisher is gone");
        }
    }

    /// Queue a change to this user's cluster-wide connection count
    pub fn track_presence(&self, user_id: &str, delta: i64) {
        let command = AdapterCommand::Presence {
            user_id: user_id.to_string(),
            delta,
        };
        if self.commands.send(command).is_err() {
            tracing::warn!("Realtime adapter publisher is gone");
        }
    }

    /// Connections of `user_id` across all nodes
    pub async fn remote_connections(&self, user_id: &str) -> Result<i64, AdapterError> {
        let mut conn = self.conn.clone();
        let count: Option<i64> = redis::cmd("HGET")
            .arg(&self.presence_key)
            .arg(user_id)
            .query_async(&mut conn)
            .await?;
        Ok(count.unwrap_or(0))
    }

    async fn run_commands(self: Arc<Self>, mut receiver: mpsc::UnboundedReceiver<AdapterCommand>) {
        let mut conn = self.conn.clone();
        while let Some(command) = receiver.recv().await {
            let result = match command {
                AdapterCommand::Publish(envelope) => self.publish_now(&mut conn, &envelope).await,
                AdapterCommand::Presence { user_id, delta } => {
                    self.bump_presence(&mut conn, &user_id, delta).await.map(|_| ())
                }
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "Realtime adapter command failed");
            }
        }
    }

    async fn publish_now(&self, conn: &mut ConnectionManager, envelope: &AdapterEnvelope) -> Result<(), AdapterError> {
        let json = serde_json::to_string(envelope)?;
        let _receivers: i64 = redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(json)
            .query_async(conn)
            .await?;
        Ok(())
    }

    async fn bump_presence(&self, conn: &mut ConnectionManager, user_id: &str, delta: i64) -> Result<i64, AdapterError> {
        let count: i64 = BUMP_PRESENCE
            .key(&self.presence_key)
            .arg(user_id)
            .arg(delta)
            .invoke_async(conn)
            .await?;
        Ok(count)
    }

    async fn run_subscriber(self: Arc<Self>, hub: Arc<Hub>) {
        loop {
            match self.subscribe_once(&hub).await {
                Ok(()) => tracing::warn!(channel = %self.channel, "Realtime subscription ended, resubscribing"),
                Err(e) => tracing::error!(channel = %self.channel, error = %e, "Realtime subscription failed"),
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    async fn subscribe_once(&self, hub: &Hub) -> Result<(), AdapterError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        tracing::info!(channel = %self.channel, "Subscribed to realtime channel");

        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable realtime payload");
                    continue;
                }
            };
            match decode_envelope(&payload) {
                Ok(envelope) => {
                    hub.deliver_remote(&envelope);
                }
                Err(e) => tracing::warn!(error = %e, "Malformed realtime envelope"),
            }
        }
        Ok(())
    }
}

pub fn decode_envelope(payload: &str) -> Result<AdapterEnvelope, AdapterError> {
    Ok(serde_json::from_str(payload)?)
}

fn presence_key(channel: &str) -> String {
    format!("{}:presence", channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_envelope_without_except() {
        let envelope = decode_envelope(r#"{"node":"n1","room":"feed","payload":"{}"}"#).unwrap();
        assert_eq!(envelope.node, "n1");
        assert_eq!(envelope.room, "feed");
        assert!(envelope.except.is_none());
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode_envelope("nope").is_err());
    }

    #[test]
    fn test_presence_key() {
        assert_eq!(presence_key("pawfect:realtime"), "pawfect:realtime:presence");
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_envelopes_cross_nodes() {
        use crate::realtime::protocol::ServerEvent;
        use crate::realtime::rooms::Room;

        let url = "redis://127.0.0.1:6379";
        let channel = "pawfect:test:realtime";

        let hub_a = Arc::new(Hub::new("node-a", 5));
        let hub_b = Arc::new(Hub::new("node-b", 5));
        let adapter_a = RedisAdapter::connect(url, channel, "node-a").await.unwrap();
        let adapter_b = RedisAdapter::connect(url, channel, "node-b").await.unwrap();
        hub_a.attach_adapter(adapter_a.clone());
        hub_b.attach_adapter(adapter_b.clone());
        adapter_a.start(hub_a.clone()).unwrap();
        adapter_b.start(hub_b.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut bob = hub_b.register("bob");
        hub_a.emit(&Room::user("bob"), &ServerEvent::error("hi"), None);

        let frame = tokio::time::timeout(Duration::from_secs(2), bob.receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(frame.contains("\"error\""));
        assert!(hub_a.is_user_reachable("bob").await);
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_presence_decrements_interleaved_across_nodes() {
        let url = "redis://127.0.0.1:6379";
        let channel = format!("pawfect:test:{}", uuid::Uuid::new_v4());
        let node_a = RedisAdapter::connect(url, &channel, "node-a").await.unwrap();
        let node_b = RedisAdapter::connect(url, &channel, "node-b").await.unwrap();

        // a phone on node b stays connected while a laptop on node a flaps
        let flapping = {
            let node = node_a.clone();
            tokio::spawn(async move {
                let mut conn = node.conn.clone();
                for _ in 0..50 {
                    node.bump_presence(&mut conn, "carol", 1).await.unwrap();
                    node.bump_presence(&mut conn, "carol", -1).await.unwrap();
                }
            })
        };
        let steady = {
            let node = node_b.clone();
            tokio::spawn(async move {
                let mut conn = node.conn.clone();
                node.bump_presence(&mut conn, "carol", 1).await.unwrap();
            })
        };
        flapping.await.unwrap();
        steady.await.unwrap();

        assert_eq!(node_a.remote_connections("carol").await.unwrap(), 1);
        assert_eq!(node_b.remote_connections("carol").await.unwrap(), 1);

        let mut conn = node_b.conn.clone();
        assert_eq!(node_b.bump_presence(&mut conn, "carol", -1).await.unwrap(), 0);
        let exists: bool = redis::cmd("HEXISTS")
            .arg(&node_b.presence_key)
            .arg("carol")
            .query_async(&mut conn)
            .await
            .unwrap();
        assert!(!exists);
    }
}
