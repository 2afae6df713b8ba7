//! Chat rules shared by the websocket handlers and the HTTP routes.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::models::{Match, Message};

/// Longest accepted message, in characters
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Content that replaces a soft-deleted message
pub const DELETED_PLACEHOLDER: &str = "This message was deleted";

const MAX_EMOJI_CHARS: usize = 16;

pub fn edit_window() -> Duration {
    Duration::minutes(5)
}

pub fn delete_window() -> Duration {
    Duration::hours(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Message content is required")]
    EmptyContent,

    #[error("Message too long (max {max} characters)")]
    TooLong { max: usize },

    #[error("Match not found or access denied")]
    MatchNotFound,

    #[error("Cannot send message to inactive match")]
    MatchInactive,

    #[error("Cannot use a blocked match")]
    MatchBlocked,

    #[error("Reply message not found")]
    ReplyNotFound,

    #[error("Message not found or access denied")]
    MessageNotFound,

    #[error("Messages can only be edited within 5 minutes")]
    EditWindowExpired,

    #[error("Messages can only be deleted within 1 hour")]
    DeleteWindowExpired,

    #[error("Message was already deleted")]
    AlreadyDeleted,

    #[error("Invalid emoji")]
    InvalidEmoji,

    #[error("Already reacted with this emoji")]
    AlreadyReacted,

    #[error("Reaction not found")]
    ReactionNotFound,

    #[error("Premium subscription required: {feature} are available for Premium subscribers")]
    PremiumRequired { feature: &'static str },
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::EmptyContent => "EMPTY_CONTENT",
            ChatError::TooLong { .. } => "MESSAGE_TOO_LONG",
            ChatError::MatchNotFound => "MATCH_NOT_FOUND",
            ChatError::MatchInactive => "MATCH_INACTIVE",
            ChatError::MatchBlocked => "MATCH_BLOCKED",
            ChatError::ReplyNotFound => "REPLY_NOT_FOUND",
            ChatError::MessageNotFound => "MESSAGE_NOT_FOUND",
            ChatError::EditWindowExpired => "EDIT_WINDOW_EXPIRED",
            ChatError::DeleteWindowExpired => "DELETE_WINDOW_EXPIRED",
            ChatError::AlreadyDeleted => "MESSAGE_DELETED",
            ChatError::InvalidEmoji => "INVALID_EMOJI",
            ChatError::AlreadyReacted => "ALREADY_REACTED",
            ChatError::ReactionNotFound => "REACTION_NOT_FOUND",
            ChatError::PremiumRequired { .. } => "PREMIUM_FEATURE_REQUIRED",
        }
    }

    /// HTTP status the REST surface maps this error to
    pub fn status_code(&self) -> u16 {
        match self {
            ChatError::MatchNotFound | ChatError::MessageNotFound | ChatError::ReplyNotFound
            | ChatError::ReactionNotFound => 404,
            ChatError::MatchBlocked | ChatError::PremiumRequired { .. } => 403,
            ChatError::AlreadyReacted => 409,
            _ => 400,
        }
    }
}

/// Trimmed message body, or why it is unacceptable
pub fn validate_content(content: &str, max_chars: usize) -> Result<String, ChatError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ChatError::EmptyContent);
    }
    if trimmed.chars().count() > max_chars {
        return Err(ChatError::TooLong { max: max_chars });
    }
    Ok(trimmed.to_string())
}

/// Joining the room only needs membership and no block
pub fn ensure_can_join(m: &Match, user_id: &str) -> Result<(), ChatError> {
    if !m.includes(user_id) {
        return Err(ChatError::MatchNotFound);
    }
    if m.is_blocked() {
        return Err(ChatError::MatchBlocked);
    }
    Ok(())
}

pub fn ensure_can_post(m: &Match, user_id: &str) -> Result<(), ChatError> {
    if !m.includes(user_id) {
        return Err(ChatError::MatchNotFound);
    }
    if m.is_blocked() {
        return Err(ChatError::MatchBlocked);
    }
    if !m.is_active() {
        return Err(ChatError::MatchInactive);
    }
    Ok(())
}

fn ensure_own_live_message(message: &Message, user_id: &str) -> Result<(), ChatError> {
    if message.sender_id != user_id {
        return Err(ChatError::MessageNotFound);
    }
    if message.is_deleted {
        return Err(ChatError::AlreadyDeleted);
    }
    Ok(())
}

pub fn ensure_can_edit(message: &Message, user_id: &str, now: DateTime<Utc>) -> Result<(), ChatError> {
    ensure_own_live_message(message, user_id)?;
    if now - message.sent_at > edit_window() {
        return Err(ChatError::EditWindowExpired);
    }
    Ok(())
}

pub fn ensure_can_delete(message: &Message, user_id: &str, now: DateTime<Utc>) -> Result<(), ChatError> {
    ensure_own_live_message(message, user_id)?;
    if now - message.sent_at > delete_window() {
        return Err(ChatError::DeleteWindowExpired);
    }
    Ok(())
}

pub fn validate_emoji(emoji: &str) -> Result<&str, ChatError> {
    let emoji = emoji.trim();
    if emoji.is_empty() || emoji.chars().count() > MAX_EMOJI_CHARS {
        return Err(ChatError::InvalidEmoji);
    }
    Ok(emoji)
}

pub fn ensure_can_react(message: &Message, user_id: &str, emoji: &str) -> Result<(), ChatError> {
    if message.is_deleted {
        return Err(ChatError::AlreadyDeleted);
    }
    if message.has_reaction(user_id, emoji) {
        return Err(ChatError::AlreadyReacted);
    }
    Ok(())
}

pub fn ensure_can_unreact(message: &Message, user_id: &str, emoji: &str) -> Result<(), ChatError> {
    if !message.has_reaction(user_id, emoji) {
        return Err(ChatError::ReactionNotFound);
    }
    Ok(())
}

/// Slice of a chronologically ordered history for one page, newest page first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: usize,
    pub end: usize,
    pub has_more: bool,
}

pub fn page_window(total: usize, page: u32, limit: u32) -> PageWindow {
    let page = page.max(1) as usize;
    let limit = limit.max(1) as usize;

    let end = total.saturating_sub((page - 1).saturating_mul(limit));
    let start = total.saturating_sub(page.saturating_mul(limit));

    PageWindow {
        start,
        end,
        has_more: start > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use crate::models::{MatchStatus, MessageStatus, MessageType, Reaction, ReadReceipt, UserMatchActions};

    fn sample_match(status: MatchStatus) -> Match {
        let now = Utc::now();
        Match {
            id: Uuid::new_v4(),
            user1_id: "alice".to_string(),
            user2_id: "bob".to_string(),
            pet1_id: Uuid::new_v4(),
            pet2_id: Uuid::new_v4(),
            initiated_by: "bob".to_string(),
            status,
            user1_actions: UserMatchActions::default(),
            user2_actions: UserMatchActions::default(),
            created_at: now,
            last_activity: now,
            last_message_at: None,
        }
    }

    fn message(sender: &str, sent_at: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            match_id: Uuid::new_v4(),
            sender_id: sender.to_string(),
            content: "hi".to_string(),
            message_type: MessageType::Text,
            attachments: vec![],
            reply_to: None,
            sent_at,
            status: MessageStatus::Sent,
            is_edited: false,
            edited_at: None,
            is_deleted: false,
            deleted_at: None,
            reactions: vec![],
            read_by: vec![ReadReceipt { user_id: sender.to_string(), read_at: sent_at }],
        }
    }

    #[test]
    fn test_validate_content() {
        assert_eq!(validate_content("  hello ", 1000).unwrap(), "hello");
        assert_eq!(validate_content("   ", 1000), Err(ChatError::EmptyContent));
        let long = "a".repeat(1001);
        assert_eq!(validate_content(&long, 1000), Err(ChatError::TooLong { max: 1000 }));
        // multibyte characters count once
        assert!(validate_content(&"🐶".repeat(1000), 1000).is_ok());
    }

    #[test]
    fn test_post_rules() {
        let active = sample_match(MatchStatus::Active);
        assert!(ensure_can_post(&active, "alice").is_ok());
        assert_eq!(ensure_can_post(&active, "mallory"), Err(ChatError::MatchNotFound));
        assert_eq!(
            ensure_can_post(&sample_match(MatchStatus::Expired), "alice"),
            Err(ChatError::MatchInactive)
        );

        let mut blocked = sample_match(MatchStatus::Active);
        blocked.user1_actions.is_blocked = true;
        assert_eq!(ensure_can_post(&blocked, "bob"), Err(ChatError::MatchBlocked));
        assert_eq!(ensure_can_join(&blocked, "bob"), Err(ChatError::MatchBlocked));
    }

    #[test]
    fn test_edit_and_delete_windows() {
        let now = Utc::now();
        let fresh = message("alice", now - Duration::minutes(2));
        assert!(ensure_can_edit(&fresh, "alice", now).is_ok());
        assert_eq!(ensure_can_edit(&fresh, "bob", now), Err(ChatError::MessageNotFound));

        let older = message("alice", now - Duration::minutes(30));
        assert_eq!(ensure_can_edit(&older, "alice", now), Err(ChatError::EditWindowExpired));
        assert!(ensure_can_delete(&older, "alice", now).is_ok());

        let ancient = message("alice", now - Duration::hours(2));
        assert_eq!(ensure_can_delete(&ancient, "alice", now), Err(ChatError::DeleteWindowExpired));
    }

    #[test]
    fn test_reactions() {
        let now = Utc::now();
        let mut msg = message("alice", now);
        assert!(ensure_can_react(&msg, "bob", "❤️").is_ok());
        msg.reactions.push(Reaction { user_id: "bob".to_string(), emoji: "❤️".to_string(), reacted_at: now });
        assert_eq!(ensure_can_react(&msg, "bob", "❤️"), Err(ChatError::AlreadyReacted));
        assert!(ensure_can_react(&msg, "alice", "❤️").is_ok());
        assert!(ensure_can_unreact(&msg, "bob", "❤️").is_ok());
        assert_eq!(ensure_can_unreact(&msg, "bob", "👍"), Err(ChatError::ReactionNotFound));
        assert_eq!(validate_emoji("  "), Err(ChatError::InvalidEmoji));
    }

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(120, 1, 50), PageWindow { start: 70, end: 120, has_more: true });
        assert_eq!(page_window(120, 3, 50), PageWindow { start: 0, end: 20, has_more: false });
        assert_eq!(page_window(10, 5, 50), PageWindow { start: 0, end: 0, has_more: false });
        assert_eq!(page_window(10, u32::MAX, u32::MAX), PageWindow { start: 0, end: 0, has_more: false });
    }
}
