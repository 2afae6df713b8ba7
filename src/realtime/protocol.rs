//! Wire format of the realtime socket.
//!
//! Inbound frames are flat JSON objects tagged by `type`. Outbound frames wrap
//! their payload: `{"type": "...", "data": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Attachment, FeedPost, Message, MessageType, Reaction, ReplyPreview};
use crate::realtime::hub::ConnectionId;
use crate::realtime::typing::TypingEntry;

/// Per-user action on a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchAction {
    Archive,
    Unarchive,
    Favorite,
    Unfavorite,
    Block,
    Report,
}

/// Frame sent by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinMatch {
        match_id: Uuid,
    },
    LeaveMatch {
        match_id: Uuid,
    },
    SendMessage {
        match_id: Uuid,
        content: String,
        #[serde(default)]
        message_type: MessageType,
        #[serde(default)]
        attachments: Vec<Attachment>,
        #[serde(default)]
        reply_to: Option<Uuid>,
    },
    EditMessage {
        match_id: Uuid,
        message_id: Uuid,
        content: String,
    },
    DeleteMessage {
        match_id: Uuid,
        message_id: Uuid,
    },
    AddReaction {
        match_id: Uuid,
        message_id: Uuid,
        emoji: String,
    },
    RemoveReaction {
        match_id: Uuid,
        message_id: Uuid,
        emoji: String,
    },
    Typing {
        match_id: Uuid,
        is_typing: bool,
    },
    MarkMessagesRead {
        match_id: Uuid,
    },
    MatchAction {
        match_id: Uuid,
        action: MatchAction,
    },
    JoinFeed,
    LeaveFeed,
    Ping,
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinMatch { .. } => "join_match",
            ClientEvent::LeaveMatch { .. } => "leave_match",
            ClientEvent::SendMessage { .. } => "send_message",
            ClientEvent::EditMessage { .. } => "edit_message",
            ClientEvent::DeleteMessage { .. } => "delete_message",
            ClientEvent::AddReaction { .. } => "add_reaction",
            ClientEvent::RemoveReaction { .. } => "remove_reaction",
            ClientEvent::Typing { .. } => "typing",
            ClientEvent::MarkMessagesRead { .. } => "mark_messages_read",
            ClientEvent::MatchAction { .. } => "match_action",
            ClientEvent::JoinFeed => "join_feed",
            ClientEvent::LeaveFeed => "leave_feed",
            ClientEvent::Ping => "ping",
        }
    }
}

/// Frame sent by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Connected {
        user_id: String,
        connection_id: ConnectionId,
        server_time: DateTime<Utc>,
    },
    UserOnline {
        user_id: String,
        user_name: String,
        online_at: DateTime<Utc>,
    },
    UserOffline {
        user_id: String,
        offline_at: DateTime<Utc>,
    },
    TypingStatus {
        match_id: Uuid,
        typing: Vec<TypingEntry>,
    },
    UserTyping {
        match_id: Uuid,
        user_id: String,
        user_name: String,
        is_typing: bool,
        timestamp: i64,
    },
    MessageSent {
        match_id: Uuid,
        message_id: Uuid,
        message: Message,
    },
    NewMessage {
        match_id: Uuid,
        message: Message,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply: Option<ReplyPreview>,
    },
    MessageDelivered {
        match_id: Uuid,
        message_id: Uuid,
        delivered_at: DateTime<Utc>,
    },
    MessageEdited {
        match_id: Uuid,
        message_id: Uuid,
        message: Message,
    },
    MessageDeleted {
        match_id: Uuid,
        message_id: Uuid,
        deleted_at: DateTime<Utc>,
    },
    ReactionAdded {
        match_id: Uuid,
        message_id: Uuid,
        reaction: Reaction,
    },
    ReactionRemoved {
        match_id: Uuid,
        message_id: Uuid,
        user_id: String,
        emoji: String,
    },
    MessagesRead {
        match_id: Uuid,
        message_ids: Vec<Uuid>,
        read_by: String,
        read_at: DateTime<Utc>,
    },
    MatchArchived {
        match_id: Uuid,
    },
    MatchUnarchived {
        match_id: Uuid,
    },
    MatchFavorited {
        match_id: Uuid,
    },
    MatchUnfavorited {
        match_id: Uuid,
    },
    MatchBlocked {
        match_id: Uuid,
    },
    MatchReported {
        match_id: Uuid,
    },
    MatchUpdated {
        match_id: Uuid,
        action: String,
    },
    NewMatch {
        match_id: Uuid,
        pet_id: Uuid,
        other_pet_id: Uuid,
        other_user_id: String,
    },
    Notification {
        #[serde(rename = "type")]
        kind: String,
        title: String,
        body: String,
        match_id: Uuid,
        sender_id: String,
        message_id: Uuid,
    },
    FeedPost(FeedPost),
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    Pong {
        server_time: DateTime<Utc>,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
            code: None,
        }
    }

    pub fn error_with_code(message: impl Into<String>, code: &str) -> Self {
        ServerEvent::Error {
            message: message.into(),
            code: Some(code.to_string()),
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_parse_send_message() {
        let id = Uuid::new_v4();
        let frame = json!({
            "type": "send_message",
            "matchId": id,
            "content": "Hello via WebSocket!",
            "messageType": "text"
        });
        let event = ClientEvent::parse(&frame.to_string()).unwrap();
        match event {
            ClientEvent::SendMessage { match_id, content, message_type, attachments, reply_to } => {
                assert_eq!(match_id, id);
                assert_eq!(content, "Hello via WebSocket!");
                assert_eq!(message_type, MessageType::Text);
                assert!(attachments.is_empty());
                assert!(reply_to.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_unit_and_action_events() {
        assert_eq!(ClientEvent::parse(r#"{"type":"ping"}"#).unwrap(), ClientEvent::Ping);
        let id = Uuid::new_v4();
        let frame = json!({"type": "match_action", "matchId": id, "action": "favorite"});
        assert_eq!(
            ClientEvent::parse(&frame.to_string()).unwrap(),
            ClientEvent::MatchAction { match_id: id, action: MatchAction::Favorite }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(ClientEvent::parse(r#"{"type":"invalid_type","data":"x"}"#).is_err());
        assert!(ClientEvent::parse("not json").is_err());
    }

    #[test]
    fn test_server_event_shape() {
        let id = Uuid::new_v4();
        let event = ServerEvent::UserTyping {
            match_id: id,
            user_id: "u1".to_string(),
            user_name: "Sam".to_string(),
            is_typing: true,
            timestamp: 42,
        };
        let value: Value = serde_json::from_str(&event.to_text().unwrap()).unwrap();
        assert_eq!(value["type"], "user_typing");
        assert_eq!(value["data"]["isTyping"], true);
        assert_eq!(value["data"]["userId"], "u1");
    }

    #[test]
    fn test_error_event_code() {
        let value: Value = serde_json::from_str(
            &ServerEvent::error_with_code("nope", "PREMIUM_FEATURE_REQUIRED").to_text().unwrap(),
        )
        .unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["data"]["code"], "PREMIUM_FEATURE_REQUIRED");

        let plain: Value = serde_json::from_str(&ServerEvent::error("x").to_text().unwrap()).unwrap();
        assert!(plain["data"].get("code").is_none());
    }
}
