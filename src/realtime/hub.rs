//! Connection and room registry for this node.
//!
//! Every connection owns an unbounded channel of serialized frames. Rooms map
//! to sets of connection ids. Events are serialized once per emit and the same
//! `Arc<str>` is handed to every member.

use chrono::Utc;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::realtime::adapter::{AdapterEnvelope, RedisAdapter};
use crate::realtime::presence::{OnlineUser, PresenceRegistry};
use crate::realtime::protocol::ServerEvent;
use crate::realtime::rooms::Room;
use crate::realtime::typing::TypingTracker;

/// Serialized frame queued for a connection
pub type Outbound = Arc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Connection {
    user_id: String,
    tx: mpsc::UnboundedSender<Outbound>,
    rooms: HashSet<Room>,
    /// Channel found closed; out of every room, awaiting `unregister`
    closed: bool,
}

/// Result of registering a connection
pub struct Registration {
    pub id: ConnectionId,
    pub receiver: mpsc::UnboundedReceiver<Outbound>,
    pub came_online: bool,
}

/// What a closed connection leaves behind
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub user_id: String,
    pub match_rooms: Vec<Uuid>,
    pub went_offline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub node_id: String,
    pub connections: usize,
    pub rooms: usize,
    pub online_users: usize,
    pub events_delivered: u64,
    pub adapter_enabled: bool,
}

pub struct Hub {
    node_id: String,
    connections: DashMap<ConnectionId, Connection>,
    rooms: DashMap<Room, HashSet<ConnectionId>>,
    presence: PresenceRegistry,
    typing: TypingTracker,
    adapter: OnceCell<Arc<RedisAdapter>>,
    events_delivered: AtomicU64,
}

impl Hub {
    pub fn new(node_id: impl Into<String>, typing_ttl_secs: i64) -> Self {
        Self {
            node_id: node_id.into(),
            connections: DashMap::new(),
            rooms: DashMap::new(),
            presence: PresenceRegistry::new(),
            typing: TypingTracker::new(typing_ttl_secs),
            adapter: OnceCell::new(),
            events_delivered: AtomicU64::new(0),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn typing(&self) -> &TypingTracker {
        &self.typing
    }

    /// Attach the cross-node adapter. Only the first call has an effect.
    pub fn attach_adapter(&self, adapter: Arc<RedisAdapter>) -> bool {
        self.adapter.set(adapter).is_ok()
    }

    pub fn register(&self, user_id: &str) -> Registration {
        let id = ConnectionId::new();
        let (tx, receiver) = mpsc::unbounded_channel();

        self.connections.insert(
            id,
            Connection {
                user_id: user_id.to_string(),
                tx,
                rooms: HashSet::new(),
                closed: false,
            },
        );
        self.join(id, Room::user(user_id));

        let came_online = self.presence.connect(user_id, Utc::now());
        if let Some(adapter) = self.adapter.get() {
            adapter.track_presence(user_id, 1);
        }

        tracing::debug!(connection = %id, user_id, came_online, "Connection registered");
        Registration { id, receiver, came_online }
    }

    /// Remove a connection from every room. `None` if it was already gone.
    pub fn unregister(&self, id: ConnectionId) -> Option<Departure> {
        let (_, connection) = self.connections.remove(&id)?;

        let mut match_rooms = Vec::new();
        for room in &connection.rooms {
            self.remove_member(room, id);
            if let Room::Match(match_id) = room {
                match_rooms.push(*match_id);
            }
        }
        match_rooms.sort();

        let went_offline = self.presence.disconnect(&connection.user_id, Utc::now());
        if let Some(adapter) = self.adapter.get() {
            adapter.track_presence(&connection.user_id, -1);
        }

        tracing::debug!(connection = %id, user_id = %connection.user_id, went_offline, "Connection unregistered");
        Some(Departure {
            user_id: connection.user_id,
            match_rooms,
            went_offline,
        })
    }

    pub fn join(&self, id: ConnectionId, room: Room) -> bool {
        match self.connections.get_mut(&id) {
            Some(mut connection) if !connection.closed => {
                connection.rooms.insert(room.clone());
            }
            _ => return false,
        }
        self.rooms.entry(room.clone()).or_default().insert(id);

        // unregister or drop_dead may have run between the two inserts
        if !self.is_live(id) {
            self.remove_member(&room, id);
            return false;
        }
        true
    }

    fn is_live(&self, id: ConnectionId) -> bool {
        self.connections.get(&id).map(|c| !c.closed).unwrap_or(false)
    }

    pub fn leave(&self, id: ConnectionId, room: &Room) -> bool {
        let was_member = match self.connections.get_mut(&id) {
            Some(mut connection) => connection.rooms.remove(room),
            None => false,
        };
        self.remove_member(room, id);
        was_member
    }

    fn remove_member(&self, room: &Room, id: ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }

    pub fn rooms_of(&self, id: ConnectionId) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .connections
            .get(&id)
            .map(|c| c.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort_by_key(|r| r.to_string());
        rooms
    }

    pub fn is_member(&self, id: ConnectionId, room: &Room) -> bool {
        self.connections
            .get(&id)
            .map(|c| c.rooms.contains(room))
            .unwrap_or(false)
    }

    pub fn room_size(&self, room: &Room) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    pub fn user_connection_count(&self, user_id: &str) -> usize {
        self.presence.connection_count(user_id)
    }

    pub fn online_users(&self) -> Vec<OnlineUser> {
        self.presence.online_users()
    }

    /// Whether any connection of `user_id` exists on this node or, with the
    /// adapter attached, on any other node.
    pub async fn is_user_reachable(&self, user_id: &str) -> bool {
        if self.presence.is_online(user_id) {
            return true;
        }
        match self.adapter.get() {
            Some(adapter) => match adapter.remote_connections(user_id).await {
                Ok(count) => count > 0,
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Adapter presence lookup failed");
                    false
                }
            },
            None => false,
        }
    }

    /// Deliver `event` to every member of `room` except `except`, then hand it
    /// to the adapter. Returns the number of local deliveries.
    pub fn emit(&self, room: &Room, event: &ServerEvent, except: Option<ConnectionId>) -> usize {
        let text: Outbound = match event.to_text() {
            Ok(text) => Arc::from(text),
            Err(e) => {
                tracing::error!(room = %room, error = %e, "Failed to serialize event");
                return 0;
            }
        };

        let delivered = self.deliver_local(room, &text, except);

        if let Some(adapter) = self.adapter.get() {
            adapter.publish(AdapterEnvelope {
                node: self.node_id.clone(),
                room: room.to_string(),
                payload: text.to_string(),
                except,
            });
        }

        delivered
    }

    pub fn emit_to_user(&self, user_id: &str, event: &ServerEvent) -> usize {
        self.emit(&Room::user(user_id), event, None)
    }

    pub fn broadcast_feed(&self, event: &ServerEvent) -> usize {
        self.emit(&Room::Feed, event, None)
    }

    /// Reply on a single connection. Never crosses nodes.
    pub fn send_to(&self, id: ConnectionId, event: &ServerEvent) -> bool {
        let text = match event.to_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(connection = %id, error = %e, "Failed to serialize event");
                return false;
            }
        };

        let sent = self
            .connections
            .get(&id)
            .map(|c| c.tx.send(Arc::from(text)).is_ok());

        match sent {
            Some(true) => {
                self.events_delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Some(false) => {
                self.drop_dead(id);
                false
            }
            None => false,
        }
    }

    /// Deliver an envelope published by another node
    pub fn deliver_remote(&self, envelope: &AdapterEnvelope) -> usize {
        if envelope.node == self.node_id {
            return 0;
        }
        let room: Room = match envelope.room.parse() {
            Ok(room) => room,
            Err(e) => {
                tracing::warn!(room = %envelope.room, error = %e, "Dropping envelope for unknown room");
                return 0;
            }
        };
        let text: Outbound = Arc::from(envelope.payload.as_str());
        self.deliver_local(&room, &text, envelope.except)
    }

    fn deliver_local(&self, room: &Room, text: &Outbound, except: Option<ConnectionId>) -> usize {
        let members: Vec<ConnectionId> = match self.rooms.get(room) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for id in members {
            if Some(id) == except {
                continue;
            }
            let sent = self.connections.get(&id).map(|c| c.tx.send(text.clone()).is_ok());
            match sent {
                Some(true) => delivered += 1,
                Some(false) => dead.push(id),
                None => {}
            }
        }

        for id in dead {
            self.drop_dead(id);
        }

        self.events_delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    /// Take a connection whose receiver is gone out of every room. The entry
    /// stays until the owning session calls `unregister`, which still reports
    /// the full departure.
    fn drop_dead(&self, id: ConnectionId) {
        let rooms: Vec<Room> = match self.connections.get_mut(&id) {
            Some(mut connection) if !connection.closed => {
                connection.closed = true;
                connection.rooms.iter().cloned().collect()
            }
            _ => return,
        };
        for room in &rooms {
            self.remove_member(room, id);
        }
        tracing::warn!(connection = %id, "Detached connection with closed channel");
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            node_id: self.node_id.clone(),
            connections: self.connections.len(),
            rooms: self.rooms.len(),
            online_users: self.presence.online_count(),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            adapter_enabled: self.adapter.get().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pong() -> ServerEvent {
        ServerEvent::Pong { server_time: Utc::now() }
    }

    #[tokio::test]
    async fn test_register_joins_user_room() {
        let hub = Hub::new("node-a", 5);
        let reg = hub.register("alice");
        assert!(reg.came_online);
        assert_eq!(hub.rooms_of(reg.id), vec![Room::user("alice")]);
        assert_eq!(hub.room_size(&Room::user("alice")), 1);
    }

    #[tokio::test]
    async fn test_emit_respects_except() {
        let hub = Hub::new("node-a", 5);
        let match_room = Room::Match(Uuid::new_v4());
        let mut a = hub.register("alice");
        let mut b = hub.register("bob");
        hub.join(a.id, match_room.clone());
        hub.join(b.id, match_room.clone());

        assert_eq!(hub.emit(&match_room, &pong(), Some(a.id)), 1);
        assert!(b.receiver.try_recv().is_ok());
        assert!(a.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_reports_match_rooms() {
        let hub = Hub::new("node-a", 5);
        let match_id = Uuid::new_v4();
        let reg = hub.register("alice");
        hub.join(reg.id, Room::Match(match_id));
        hub.join(reg.id, Room::Feed);

        let departure = hub.unregister(reg.id).unwrap();
        assert_eq!(departure.match_rooms, vec![match_id]);
        assert!(departure.went_offline);
        assert_eq!(hub.room_size(&Room::Match(match_id)), 0);
        assert_eq!(hub.stats().rooms, 0);
        assert!(hub.unregister(reg.id).is_none());
    }

    #[tokio::test]
    async fn test_closed_channel_dropped_lazily() {
        let hub = Hub::new("node-a", 5);
        let match_id = Uuid::new_v4();
        let reg = hub.register("alice");
        hub.join(reg.id, Room::Match(match_id));
        drop(reg.receiver);

        assert_eq!(hub.emit_to_user("alice", &pong()), 0);
        assert_eq!(hub.room_size(&Room::user("alice")), 0);
        assert_eq!(hub.room_size(&Room::Match(match_id)), 0);
        assert!(!hub.join(reg.id, Room::Feed));

        // the session's own teardown still sees the whole departure
        let departure = hub.unregister(reg.id).unwrap();
        assert_eq!(departure.match_rooms, vec![match_id]);
        assert!(departure.went_offline);
        assert_eq!(hub.stats().connections, 0);
        assert_eq!(hub.user_connection_count("alice"), 0);
    }

    #[tokio::test]
    async fn test_join_after_unregister_leaves_no_member() {
        let hub = Hub::new("node-a", 5);
        let reg = hub.register("alice");
        hub.unregister(reg.id);

        assert!(!hub.join(reg.id, Room::Feed));
        assert_eq!(hub.room_size(&Room::Feed), 0);
    }

    #[tokio::test]
    async fn test_remote_envelope_from_self_ignored() {
        let hub = Hub::new("node-a", 5);
        let mut reg = hub.register("alice");
        let envelope = AdapterEnvelope {
            node: "node-a".to_string(),
            room: "user_alice".to_string(),
            payload: "{}".to_string(),
            except: None,
        };
        assert_eq!(hub.deliver_remote(&envelope), 0);

        let foreign = AdapterEnvelope { node: "node-b".to_string(), ..envelope };
        assert_eq!(hub.deliver_remote(&foreign), 1);
        assert_eq!(&*reg.receiver.try_recv().unwrap(), "{}");
    }
}
