use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Active,
    Pending,
    Expired,
    Blocked,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Active => "active",
            MatchStatus::Pending => "pending",
            MatchStatus::Expired => "expired",
            MatchStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MatchStatus::Active),
            "pending" => Ok(MatchStatus::Pending),
            "expired" => Ok(MatchStatus::Expired),
            "blocked" => Ok(MatchStatus::Blocked),
            other => Err(format!("unknown match status: {}", other)),
        }
    }
}

/// Flags each participant keeps on a match independently
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMatchActions {
    pub is_archived: bool,
    pub is_favorite: bool,
    pub is_blocked: bool,
}

/// Which side of a match a user sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    User1,
    User2,
}

impl Participant {
    /// Column prefix used for per-user flags
    pub fn column_prefix(&self) -> &'static str {
        match self {
            Participant::User1 => "user1",
            Participant::User2 => "user2",
        }
    }
}

/// Mutual match between two pets and their owners
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: Uuid,
    pub user1_id: String,
    pub user2_id: String,
    pub pet1_id: Uuid,
    pub pet2_id: Uuid,
    pub initiated_by: String,
    pub status: MatchStatus,
    pub user1_actions: UserMatchActions,
    pub user2_actions: UserMatchActions,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn participant(&self, user_id: &str) -> Option<Participant> {
        if self.user1_id == user_id {
            Some(Participant::User1)
        } else if self.user2_id == user_id {
            Some(Participant::User2)
        } else {
            None
        }
    }

    pub fn includes(&self, user_id: &str) -> bool {
        self.participant(user_id).is_some()
    }

    /// The counterpart of `user_id`, if `user_id` is a participant
    pub fn other_user(&self, user_id: &str) -> Option<&str> {
        match self.participant(user_id)? {
            Participant::User1 => Some(&self.user2_id),
            Participant::User2 => Some(&self.user1_id),
        }
    }

    pub fn actions_for(&self, user_id: &str) -> Option<&UserMatchActions> {
        match self.participant(user_id)? {
            Participant::User1 => Some(&self.user1_actions),
            Participant::User2 => Some(&self.user2_actions),
        }
    }

    /// A block from either side shuts the conversation for both
    pub fn is_blocked(&self) -> bool {
        self.status == MatchStatus::Blocked
            || self.user1_actions.is_blocked
            || self.user2_actions.is_blocked
    }

    pub fn is_active(&self) -> bool {
        self.status == MatchStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    File,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::File => "file",
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "video" => Ok(MessageType::Video),
            "file" => Ok(MessageType::File),
            other => Err(format!("unknown message type: {}", other)),
        }
    }
}

/// Delivery state: sent, then delivered, then read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            other => Err(format!("unknown message status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub user_id: String,
    pub emoji: String,
    pub reacted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub user_id: String,
    pub read_at: DateTime<Utc>,
}

/// Quoted message shown above a reply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPreview {
    pub id: Uuid,
    pub sender_id: String,
    pub content: String,
    pub message_type: MessageType,
}

/// Chat message inside a match
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub match_id: Uuid,
    pub sender_id: String,
    pub content: String,
    pub message_type: MessageType,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reply_to: Option<Uuid>,
    pub sent_at: DateTime<Utc>,
    pub status: MessageStatus,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub read_by: Vec<ReadReceipt>,
}

impl Message {
    pub fn has_reaction(&self, user_id: &str, emoji: &str) -> bool {
        self.reactions
            .iter()
            .any(|r| r.user_id == user_id && r.emoji == emoji)
    }
}

/// Row of the match list, seen from one participant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    #[serde(flatten)]
    pub r#match: Match,
    pub other_user_id: String,
    pub other_pet_name: String,
    pub other_pet_species: String,
    pub is_archived: bool,
    pub is_favorite: bool,
    pub unread_count: i64,
}

/// Per-user match counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStats {
    pub total_matches: i64,
    pub active_matches: i64,
    pub archived_matches: i64,
    pub blocked_matches: i64,
    pub favorite_matches: i64,
    pub unread_messages: i64,
}

/// Which slice of a user's matches a listing shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchScope {
    /// Active, not archived and not blocked by the viewer
    Active,
    Archived,
    Blocked,
    All,
}

impl FromStr for MatchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(MatchScope::Active),
            "archived" => Ok(MatchScope::Archived),
            "blocked" => Ok(MatchScope::Blocked),
            "all" => Ok(MatchScope::All),
            other => Err(format!("unknown match status filter: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchSort {
    #[default]
    Newest,
    Oldest,
    /// By the other pet's name
    Alpha,
}

impl FromStr for MatchSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newest" => Ok(MatchSort::Newest),
            "oldest" => Ok(MatchSort::Oldest),
            "alpha" => Ok(MatchSort::Alpha),
            other => Err(format!("unknown sort: {}", other)),
        }
    }
}

/// Listing parameters after validation
#[derive(Debug, Clone, PartialEq)]
pub struct MatchListFilter {
    pub scope: MatchScope,
    pub sort: MatchSort,
    pub search: Option<String>,
    pub species: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl MatchListFilter {
    /// Rows to skip, saturating so any `page` query value is safe
    pub fn offset(&self) -> i64 {
        let skipped = u64::from(self.page.max(1) - 1) * u64::from(self.limit);
        i64::try_from(skipped).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match() -> Match {
        let now = Utc::now();
        Match {
            id: Uuid::new_v4(),
            user1_id: "alice".to_string(),
            user2_id: "bob".to_string(),
            pet1_id: Uuid::new_v4(),
            pet2_id: Uuid::new_v4(),
            initiated_by: "bob".to_string(),
            status: MatchStatus::Active,
            user1_actions: UserMatchActions::default(),
            user2_actions: UserMatchActions::default(),
            created_at: now,
            last_activity: now,
            last_message_at: None,
        }
    }

    #[test]
    fn test_other_user() {
        let m = sample_match();
        assert_eq!(m.other_user("alice"), Some("bob"));
        assert_eq!(m.other_user("bob"), Some("alice"));
        assert_eq!(m.other_user("carol"), None);
    }

    #[test]
    fn test_block_from_either_side() {
        let mut m = sample_match();
        assert!(!m.is_blocked());
        m.user2_actions.is_blocked = true;
        assert!(m.is_blocked());
        assert_eq!(m.actions_for("bob").map(|a| a.is_blocked), Some(true));
        assert_eq!(m.actions_for("alice").map(|a| a.is_blocked), Some(false));
    }

    #[test]
    fn test_scope_and_sort_parse() {
        assert_eq!("Archived".parse::<MatchScope>().unwrap(), MatchScope::Archived);
        assert!("weird".parse::<MatchScope>().is_err());
        assert_eq!("alpha".parse::<MatchSort>().unwrap(), MatchSort::Alpha);
        assert_eq!(MatchSort::default(), MatchSort::Newest);
    }

    #[test]
    fn test_filter_offset() {
        let filter = MatchListFilter {
            scope: MatchScope::Active,
            sort: MatchSort::Newest,
            search: None,
            species: None,
            page: 3,
            limit: 20,
        };
        assert_eq!(filter.offset(), 40);
    }

    #[test]
    fn test_filter_offset_huge_page() {
        let filter = MatchListFilter {
            scope: MatchScope::Active,
            sort: MatchSort::Newest,
            search: None,
            species: None,
            page: 50_000_000,
            limit: 100,
        };
        assert_eq!(filter.offset(), 4_999_999_900);

        let last = MatchListFilter { page: u32::MAX, limit: u32::MAX, ..filter };
        assert!(last.offset() > 0);
    }

    #[test]
    fn test_attachment_type_field() {
        let json = r#"{"type":"image","url":"https://cdn/x.png"}"#;
        let attachment: Attachment = serde_json::from_str(json).unwrap();
        assert_eq!(attachment.kind, "image");
        assert!(attachment.file_name.is_none());
    }
}
