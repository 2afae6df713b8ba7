use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone)]
struct PresenceEntry {
    connections: usize,
    last_seen: DateTime<Utc>,
}

/// Snapshot row returned by `online_users`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: String,
    pub last_seen: DateTime<Utc>,
    pub connections: usize,
}

/// Connection-counted presence for this node
///
/// A user stays online while any of their connections is open.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    users: DashMap<String, PresenceEntry>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the user just came online
    pub fn connect(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        let mut entry = self
            .users
            .entry(user_id.to_string())
            .or_insert(PresenceEntry { connections: 0, last_seen: now });
        entry.connections += 1;
        entry.last_seen = now;
        entry.connections == 1
    }

    /// Returns true when the user's last connection closed
    pub fn disconnect(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        let went_offline = match self.users.get_mut(user_id) {
            Some(mut entry) => {
                entry.connections = entry.connections.saturating_sub(1);
                entry.last_seen = now;
                entry.connections == 0
            }
            None => return false,
        };

        if went_offline {
            self.users.remove_if(user_id, |_, e| e.connections == 0);
        }
        went_offline
    }

    /// Refreshes `last_seen` on inbound traffic
    pub fn touch(&self, user_id: &str, now: DateTime<Utc>) {
        if let Some(mut entry) = self.users.get_mut(user_id) {
            entry.last_seen = now;
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.users
            .get(user_id)
            .map(|e| e.connections > 0)
            .unwrap_or(false)
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.users.get(user_id).map(|e| e.connections).unwrap_or(0)
    }

    pub fn online_users(&self) -> Vec<OnlineUser> {
        let mut users: Vec<OnlineUser> = self
            .users
            .iter()
            .filter(|e| e.connections > 0)
            .map(|e| OnlineUser {
                user_id: e.key().clone(),
                last_seen: e.last_seen,
                connections: e.connections,
            })
            .collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        users
    }

    pub fn online_count(&self) -> usize {
        self.users.iter().filter(|e| e.connections > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_device_keeps_user_online() {
        let presence = PresenceRegistry::new();
        let now = Utc::now();

        assert!(presence.connect("alice", now));
        assert!(!presence.connect("alice", now));
        assert_eq!(presence.connection_count("alice"), 2);

        assert!(!presence.disconnect("alice", now));
        assert!(presence.is_online("alice"));

        assert!(presence.disconnect("alice", now));
        assert!(!presence.is_online("alice"));
        assert!(presence.online_users().is_empty());
    }

    #[test]
    fn test_disconnect_unknown_user() {
        let presence = PresenceRegistry::new();
        assert!(!presence.disconnect("ghost", Utc::now()));
    }

    #[test]
    fn test_online_users_listing() {
        let presence = PresenceRegistry::new();
        let now = Utc::now();
        presence.connect("bob", now);
        presence.connect("alice", now);

        let online = presence.online_users();
        assert_eq!(online.len(), 2);
        assert_eq!(online[0].user_id, "alice");
        assert_eq!(presence.online_count(), 2);
    }
}
