use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_TYPING_TTL_SECS: i64 = 5;

/// A user currently typing in a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEntry {
    pub user_id: String,
    pub user_name: String,
    pub started_at: DateTime<Utc>,
}

/// Per-match typing indicators with expiry
#[derive(Debug)]
pub struct TypingTracker {
    ttl: Duration,
    matches: DashMap<Uuid, HashMap<String, TypingEntry>>,
}

impl TypingTracker {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs.max(1)),
            matches: DashMap::new(),
        }
    }

    pub fn start(&self, match_id: Uuid, user_id: &str, user_name: &str, now: DateTime<Utc>) {
        self.matches.entry(match_id).or_default().insert(
            user_id.to_string(),
            TypingEntry {
                user_id: user_id.to_string(),
                user_name: user_name.to_string(),
                started_at: now,
            },
        );
    }

    pub fn stop(&self, match_id: Uuid, user_id: &str) {
        if let Some(mut typists) = self.matches.get_mut(&match_id) {
            typists.remove(user_id);
        }
        self.matches.remove_if(&match_id, |_, t| t.is_empty());
    }

    /// Live typists of a match, oldest first, without `exclude`
    pub fn active(&self, match_id: Uuid, now: DateTime<Utc>, exclude: Option<&str>) -> Vec<TypingEntry> {
        let Some(typists) = self.matches.get(&match_id) else {
            return Vec::new();
        };

        let mut entries: Vec<TypingEntry> = typists
            .values()
            .filter(|e| now - e.started_at < self.ttl)
            .filter(|e| exclude.map_or(true, |x| x != e.user_id))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.started_at);
        entries
    }

    /// Drops expired entries; returns how many were purged
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut purged = 0;
        for mut typists in self.matches.iter_mut() {
            let before = typists.len();
            typists.retain(|_, e| now - e.started_at < self.ttl);
            purged += before - typists.len();
        }
        self.matches.retain(|_, t| !t.is_empty());
        purged
    }

    pub fn tracked_matches(&self) -> usize {
        self.matches.len()
    }
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_TTL_SECS)
    }
}
