//! Chat operations behind the socket events and the message routes.
//!
//! Every operation validates against the stored match, persists, then fans
//! out through the hub. Socket callers get failures back as `error` events on
//! their own connection; HTTP callers get them as `ApiError`s.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::core::chat::{self, ChatError, DELETED_PLACEHOLDER, MAX_MESSAGE_CHARS};
use crate::core::notify;
use crate::models::{
    Attachment, Match, Message, MessageStatus, MessageType, Reaction, ReadReceipt, ReplyPreview,
};
use crate::realtime::hub::{ConnectionId, Departure, Hub};
use crate::realtime::protocol::{ClientEvent, MatchAction, ServerEvent};
use crate::realtime::rooms::Room;
use crate::services::{AccountDirectory, MatchFlag, PostgresClient, PostgresError, PushClient, PushNotification};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Join the match before sending typing updates")]
    NotJoined,

    #[error("Database error: {0}")]
    Database(#[from] PostgresError),
}

impl HandlerError {
    pub fn code(&self) -> &'static str {
        match self {
            HandlerError::Chat(e) => e.code(),
            HandlerError::NotJoined => "NOT_IN_MATCH",
            HandlerError::Database(_) => "INTERNAL_ERROR",
        }
    }

    /// Error frame for the socket; database details stay in the logs
    pub fn to_event(&self) -> ServerEvent {
        match self {
            HandlerError::Database(_) => ServerEvent::error_with_code("Internal server error", self.code()),
            other => ServerEvent::error_with_code(other.to_string(), other.code()),
        }
    }
}

/// The authenticated side of a socket
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub conn: ConnectionId,
    pub user_id: String,
    pub user_name: String,
}

/// Someone posting a message, over either transport
#[derive(Debug, Clone)]
pub struct Sender<'a> {
    pub user_id: &'a str,
    pub user_name: &'a str,
    /// Socket that sent it; gets the `message_sent` acknowledgement
    pub origin: Option<ConnectionId>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    pub content: String,
    pub message_type: MessageType,
    pub attachments: Vec<Attachment>,
    pub reply_to: Option<Uuid>,
}

pub struct ChatService {
    db: Arc<PostgresClient>,
    hub: Arc<Hub>,
    push: Arc<PushClient>,
    accounts: AccountDirectory,
}

impl ChatService {
    pub fn new(db: Arc<PostgresClient>, hub: Arc<Hub>, push: Arc<PushClient>, accounts: AccountDirectory) -> Self {
        Self { db, hub, push, accounts }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Handle one inbound frame; failures are reported to the sender only
    pub async fn dispatch(&self, ctx: &SessionContext, event: ClientEvent) {
        let name = event.name();
        if let Err(e) = self.handle(ctx, event).await {
            match &e {
                HandlerError::Database(db) => {
                    tracing::error!(user_id = %ctx.user_id, event = name, error = %db, "Realtime event failed")
                }
                other => {
                    tracing::debug!(user_id = %ctx.user_id, event = name, error = %other, "Realtime event rejected")
                }
            }
            self.hub.send_to(ctx.conn, &e.to_event());
        }
    }

    async fn handle(&self, ctx: &SessionContext, event: ClientEvent) -> Result<(), HandlerError> {
        let now = Utc::now();
        match event {
            ClientEvent::JoinMatch { match_id } => self.join_match(ctx, match_id, now).await,
            ClientEvent::LeaveMatch { match_id } => {
                self.leave_match(ctx, match_id, now);
                Ok(())
            }
            ClientEvent::SendMessage { match_id, content, message_type, attachments, reply_to } => {
                let sender = Sender {
                    user_id: &ctx.user_id,
                    user_name: &ctx.user_name,
                    origin: Some(ctx.conn),
                };
                let draft = MessageDraft { content, message_type, attachments, reply_to };
                self.send_message(&sender, match_id, draft).await.map(|_| ())
            }
            ClientEvent::EditMessage { match_id, message_id, content } => {
                self.edit_message(&ctx.user_id, match_id, message_id, &content).await.map(|_| ())
            }
            ClientEvent::DeleteMessage { match_id, message_id } => {
                self.delete_message(&ctx.user_id, match_id, message_id).await
            }
            ClientEvent::AddReaction { match_id, message_id, emoji } => {
                self.add_reaction(&ctx.user_id, match_id, message_id, &emoji).await
            }
            ClientEvent::RemoveReaction { match_id, message_id, emoji } => {
                self.remove_reaction(&ctx.user_id, match_id, message_id, &emoji).await
            }
            ClientEvent::Typing { match_id, is_typing } => self.typing(ctx, match_id, is_typing, now),
            ClientEvent::MarkMessagesRead { match_id } => self.mark_messages_read(&ctx.user_id, match_id, now).await,
            ClientEvent::MatchAction { match_id, action } => self.match_action(ctx, match_id, action).await,
            ClientEvent::JoinFeed => {
                self.hub.join(ctx.conn, Room::Feed);
                Ok(())
            }
            ClientEvent::LeaveFeed => {
                self.hub.leave(ctx.conn, &Room::Feed);
                Ok(())
            }
            ClientEvent::Ping => {
                self.hub.send_to(ctx.conn, &ServerEvent::Pong { server_time: now });
                Ok(())
            }
        }
    }

    /// The match, if it exists and `user_id` takes part in it
    pub async fn load_match(&self, match_id: Uuid, user_id: &str) -> Result<Match, HandlerError> {
        match self.db.get_match(match_id).await? {
            Some(m) if m.includes(user_id) => Ok(m),
            _ => Err(ChatError::MatchNotFound.into()),
        }
    }

    async fn join_match(&self, ctx: &SessionContext, match_id: Uuid, now: DateTime<Utc>) -> Result<(), HandlerError> {
        let m = self.load_match(match_id, &ctx.user_id).await?;
        chat::ensure_can_join(&m, &ctx.user_id)?;

        let room = Room::Match(match_id);
        self.hub.join(ctx.conn, room.clone());
        tracing::debug!(user_id = %ctx.user_id, %match_id, "Joined match room");

        self.mark_read_on_open(&m, &ctx.user_id, now).await?;

        self.hub.emit(
            &room,
            &ServerEvent::UserOnline {
                user_id: ctx.user_id.clone(),
                user_name: ctx.user_name.clone(),
                online_at: now,
            },
            Some(ctx.conn),
        );

        let typing = self.hub.typing().active(match_id, now, Some(&ctx.user_id));
        if !typing.is_empty() {
            self.hub.send_to(ctx.conn, &ServerEvent::TypingStatus { match_id, typing });
        }
        Ok(())
    }

    fn leave_match(&self, ctx: &SessionContext, match_id: Uuid, now: DateTime<Utc>) {
        let room = Room::Match(match_id);
        if !self.hub.leave(ctx.conn, &room) {
            return;
        }
        self.hub.typing().stop(match_id, &ctx.user_id);
        self.hub.emit(
            &room,
            &ServerEvent::UserOffline {
                user_id: ctx.user_id.clone(),
                offline_at: now,
            },
            None,
        );
        tracing::debug!(user_id = %ctx.user_id, %match_id, "Left match room");
    }

    pub async fn send_message(
        &self,
        sender: &Sender<'_>,
        match_id: Uuid,
        draft: MessageDraft,
    ) -> Result<Message, HandlerError> {
        let content = chat::validate_content(&draft.content, MAX_MESSAGE_CHARS)?;
        let m = self.load_match(match_id, sender.user_id).await?;
        chat::ensure_can_post(&m, sender.user_id)?;

        let reply = match draft.reply_to {
            Some(reply_id) => {
                let quoted = self
                    .db
                    .get_message(match_id, reply_id)
                    .await?
                    .ok_or(ChatError::ReplyNotFound)?;
                Some(ReplyPreview {
                    id: quoted.id,
                    sender_id: quoted.sender_id,
                    content: quoted.content,
                    message_type: quoted.message_type,
                })
            }
            None => None,
        };

        let recipient = m.other_user(sender.user_id).unwrap_or_default().to_string();
        let recipient_online = self.hub.is_user_reachable(&recipient).await;
        let now = Utc::now();

        let message = Message {
            id: Uuid::new_v4(),
            match_id,
            sender_id: sender.user_id.to_string(),
            content,
            message_type: draft.message_type,
            attachments: draft.attachments,
            reply_to: draft.reply_to,
            sent_at: now,
            status: if recipient_online { MessageStatus::Delivered } else { MessageStatus::Sent },
            is_edited: false,
            edited_at: None,
            is_deleted: false,
            deleted_at: None,
            reactions: Vec::new(),
            read_by: vec![ReadReceipt {
                user_id: sender.user_id.to_string(),
                read_at: now,
            }],
        };

        if let Err(e) = self.db.insert_message(&message).await {
            tracing::error!(%match_id, sender = %sender.user_id, error = %e, "Failed to persist message");
            return Err(e.into());
        }

        self.hub.typing().stop(match_id, sender.user_id);

        if let Some(conn) = sender.origin {
            self.hub.send_to(
                conn,
                &ServerEvent::MessageSent {
                    match_id,
                    message_id: message.id,
                    message: message.clone(),
                },
            );
            if recipient_online {
                self.hub.send_to(
                    conn,
                    &ServerEvent::MessageDelivered {
                        match_id,
                        message_id: message.id,
                        delivered_at: now,
                    },
                );
            }
        }

        self.hub.emit(
            &Room::Match(match_id),
            &ServerEvent::NewMessage {
                match_id,
                message: message.clone(),
                reply,
            },
            None,
        );

        if !recipient_online {
            self.notify_offline_recipient(&recipient, sender, &message).await;
        }

        Ok(message)
    }

    async fn notify_offline_recipient(&self, recipient: &str, sender: &Sender<'_>, message: &Message) {
        let account = match self.accounts.get(recipient).await {
            Ok(Some(account)) => account,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(recipient, error = %e, "Could not load recipient for notification");
                return;
            }
        };
        if !notify::should_push_message(&account.notifications, Utc::now()) {
            tracing::debug!(recipient, "Push suppressed by notification settings");
            return;
        }

        let body = notify::preview(&message.content);
        let title = format!("New message from {}", sender.user_name);
        let push = PushNotification {
            user_id: recipient.to_string(),
            title: title.clone(),
            body: body.clone(),
            data: json!({
                "type": "new_message",
                "matchId": message.match_id,
                "messageId": message.id,
                "senderId": message.sender_id,
            }),
        };
        if let Err(e) = self.push.send(&push).await {
            tracing::warn!(recipient, error = %e, "Push delivery failed");
        }

        self.hub.emit_to_user(
            recipient,
            &ServerEvent::Notification {
                kind: "new_message".to_string(),
                title,
                body,
                match_id: message.match_id,
                sender_id: message.sender_id.clone(),
                message_id: message.id,
            },
        );
    }

    async fn message_in(&self, match_id: Uuid, message_id: Uuid) -> Result<Message, HandlerError> {
        self.db
            .get_message(match_id, message_id)
            .await?
            .ok_or_else(|| ChatError::MessageNotFound.into())
    }

    pub async fn edit_message(
        &self,
        user_id: &str,
        match_id: Uuid,
        message_id: Uuid,
        content: &str,
    ) -> Result<Message, HandlerError> {
        let content = chat::validate_content(content, MAX_MESSAGE_CHARS)?;
        self.load_match(match_id, user_id).await?;
        let mut message = self.message_in(match_id, message_id).await?;

        let now = Utc::now();
        chat::ensure_can_edit(&message, user_id, now)?;
        self.db.edit_message(message_id, &content, now).await?;

        message.content = content;
        message.is_edited = true;
        message.edited_at = Some(now);

        self.hub.emit(
            &Room::Match(match_id),
            &ServerEvent::MessageEdited {
                match_id,
                message_id,
                message: message.clone(),
            },
            None,
        );
        Ok(message)
    }

    pub async fn delete_message(&self, user_id: &str, match_id: Uuid, message_id: Uuid) -> Result<(), HandlerError> {
        self.load_match(match_id, user_id).await?;
        let message = self.message_in(match_id, message_id).await?;

        let now = Utc::now();
        chat::ensure_can_delete(&message, user_id, now)?;
        self.db.soft_delete_message(message_id, DELETED_PLACEHOLDER, now).await?;

        self.hub.emit(
            &Room::Match(match_id),
            &ServerEvent::MessageDeleted {
                match_id,
                message_id,
                deleted_at: now,
            },
            None,
        );
        Ok(())
    }

    pub async fn add_reaction(&self, user_id: &str, match_id: Uuid, message_id: Uuid, emoji: &str) -> Result<(), HandlerError> {
        let emoji = chat::validate_emoji(emoji)?;
        self.load_match(match_id, user_id).await?;
        let message = self.message_in(match_id, message_id).await?;
        chat::ensure_can_react(&message, user_id, emoji)?;

        let reaction = Reaction {
            user_id: user_id.to_string(),
            emoji: emoji.to_string(),
            reacted_at: Utc::now(),
        };
        // The row may have appeared since the message was loaded
        if !self.db.add_reaction(message_id, &reaction).await? {
            return Err(ChatError::AlreadyReacted.into());
        }

        self.hub.emit(
            &Room::Match(match_id),
            &ServerEvent::ReactionAdded { match_id, message_id, reaction },
            None,
        );
        Ok(())
    }

    pub async fn remove_reaction(&self, user_id: &str, match_id: Uuid, message_id: Uuid, emoji: &str) -> Result<(), HandlerError> {
        let emoji = chat::validate_emoji(emoji)?;
        self.load_match(match_id, user_id).await?;
        let message = self.message_in(match_id, message_id).await?;
        chat::ensure_can_unreact(&message, user_id, emoji)?;

        if !self.db.remove_reaction(message_id, user_id, emoji).await? {
            return Err(ChatError::ReactionNotFound.into());
        }

        self.hub.emit(
            &Room::Match(match_id),
            &ServerEvent::ReactionRemoved {
                match_id,
                message_id,
                user_id: user_id.to_string(),
                emoji: emoji.to_string(),
            },
            None,
        );
        Ok(())
    }

    fn typing(&self, ctx: &SessionContext, match_id: Uuid, is_typing: bool, now: DateTime<Utc>) -> Result<(), HandlerError> {
        let room = Room::Match(match_id);
        if !self.hub.is_member(ctx.conn, &room) {
            return Err(HandlerError::NotJoined);
        }

        if is_typing {
            self.hub.typing().start(match_id, &ctx.user_id, &ctx.user_name, now);
        } else {
            self.hub.typing().stop(match_id, &ctx.user_id);
        }

        self.hub.emit(
            &room,
            &ServerEvent::UserTyping {
                match_id,
                user_id: ctx.user_id.clone(),
                user_name: ctx.user_name.clone(),
                is_typing,
                timestamp: now.timestamp_millis(),
            },
            Some(ctx.conn),
        );
        Ok(())
    }

    /// Reads recorded when a chat is opened. Only readers with read receipts
    /// tell the other side.
    pub async fn mark_read_on_open(&self, m: &Match, reader_id: &str, now: DateTime<Utc>) -> Result<Vec<Uuid>, HandlerError> {
        let ids = self.db.mark_match_read(m.id, reader_id, now).await?;
        if ids.is_empty() {
            return Ok(ids);
        }

        let announces = match self.accounts.get(reader_id).await {
            Ok(Some(account)) => account.premium.has_read_receipts(now),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(reader_id, error = %e, "Could not load reader account");
                false
            }
        };
        if announces {
            self.announce_reads(m, reader_id, &ids, now);
        }
        Ok(ids)
    }

    async fn mark_messages_read(&self, user_id: &str, match_id: Uuid, now: DateTime<Utc>) -> Result<(), HandlerError> {
        let account = self.accounts.get(user_id).await?;
        let allowed = account.map(|a| a.premium.has_read_receipts(now)).unwrap_or(false);
        if !allowed {
            return Err(ChatError::PremiumRequired { feature: "read receipts" }.into());
        }

        let m = self.load_match(match_id, user_id).await?;
        let ids = self.db.mark_match_read(match_id, user_id, now).await?;
        if !ids.is_empty() {
            self.announce_reads(&m, user_id, &ids, now);
        }
        Ok(())
    }

    fn announce_reads(&self, m: &Match, reader_id: &str, ids: &[Uuid], at: DateTime<Utc>) {
        if let Some(other) = m.other_user(reader_id) {
            self.hub.emit_to_user(
                other,
                &ServerEvent::MessagesRead {
                    match_id: m.id,
                    message_ids: ids.to_vec(),
                    read_by: reader_id.to_string(),
                    read_at: at,
                },
            );
        }
    }

    async fn match_action(&self, ctx: &SessionContext, match_id: Uuid, action: MatchAction) -> Result<(), HandlerError> {
        let room = Room::Match(match_id);
        let ack = match action {
            MatchAction::Archive => {
                self.set_flag(&ctx.user_id, match_id, MatchFlag::Archived, true).await?;
                self.hub.emit(
                    &room,
                    &ServerEvent::MatchUpdated {
                        match_id,
                        action: "archive".to_string(),
                    },
                    None,
                );
                ServerEvent::MatchArchived { match_id }
            }
            MatchAction::Unarchive => {
                self.set_flag(&ctx.user_id, match_id, MatchFlag::Archived, false).await?;
                ServerEvent::MatchUnarchived { match_id }
            }
            MatchAction::Favorite => {
                self.set_flag(&ctx.user_id, match_id, MatchFlag::Favorite, true).await?;
                ServerEvent::MatchFavorited { match_id }
            }
            MatchAction::Unfavorite => {
                self.set_flag(&ctx.user_id, match_id, MatchFlag::Favorite, false).await?;
                ServerEvent::MatchUnfavorited { match_id }
            }
            MatchAction::Block => {
                // set_flag already announced the block to the room
                self.set_flag(&ctx.user_id, match_id, MatchFlag::Blocked, true).await?;
                return Ok(());
            }
            MatchAction::Report => {
                self.load_match(match_id, &ctx.user_id).await?;
                tracing::info!(user_id = %ctx.user_id, %match_id, "Match reported");
                ServerEvent::MatchReported { match_id }
            }
        };
        self.hub.send_to(ctx.conn, &ack);
        Ok(())
    }

    /// Set one of the caller's flags on a match; blocking is announced to the room
    pub async fn set_flag(&self, user_id: &str, match_id: Uuid, flag: MatchFlag, value: bool) -> Result<Match, HandlerError> {
        let m = self.load_match(match_id, user_id).await?;
        let participant = m.participant(user_id).ok_or(ChatError::MatchNotFound)?;
        self.db.set_match_flag(match_id, participant, flag, value).await?;

        if flag == MatchFlag::Blocked && value {
            tracing::info!(user_id, %match_id, "Match blocked");
            self.hub.emit(&Room::Match(match_id), &ServerEvent::MatchBlocked { match_id }, None);
        }

        self.load_match(match_id, user_id).await
    }

    /// Fan-out after a socket closed
    pub async fn on_disconnect(&self, departure: &Departure) {
        let now = Utc::now();
        for match_id in &departure.match_rooms {
            self.hub.typing().stop(*match_id, &departure.user_id);
            self.hub.emit(
                &Room::Match(*match_id),
                &ServerEvent::UserOffline {
                    user_id: departure.user_id.clone(),
                    offline_at: now,
                },
                None,
            );
        }

        if departure.went_offline {
            match self.db.touch_last_active(&departure.user_id, now).await {
                Ok(()) => self.accounts.invalidate(&departure.user_id).await,
                Err(e) => tracing::warn!(user_id = %departure.user_id, error = %e, "Failed to record last_active"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_database_errors_are_opaque() {
        let err = HandlerError::Database(PostgresError::NotFound("secret table".to_string()));
        let value: Value = serde_json::from_str(&err.to_event().to_text().unwrap()).unwrap();
        assert_eq!(value["data"]["message"], "Internal server error");
        assert_eq!(value["data"]["code"], "INTERNAL_ERROR");
    }

    #[test]
    fn test_chat_error_codes_pass_through() {
        let err: HandlerError = ChatError::PremiumRequired { feature: "read receipts" }.into();
        assert_eq!(err.code(), "PREMIUM_FEATURE_REQUIRED");
        assert_eq!(HandlerError::NotJoined.code(), "NOT_IN_MATCH");
    }

    fn service() -> (ChatService, Arc<Hub>) {
        let db = Arc::new(PostgresClient::connect_lazy("postgres://localhost:1/none").unwrap());
        let hub = Arc::new(Hub::new("test", 5));
        let accounts = AccountDirectory::new(db.clone(), None);
        let service = ChatService::new(db, hub.clone(), Arc::new(PushClient::disabled()), accounts);
        (service, hub)
    }

    fn ctx(hub: &Hub, user: &str) -> (SessionContext, tokio::sync::mpsc::UnboundedReceiver<crate::realtime::hub::Outbound>) {
        let reg = hub.register(user);
        (
            SessionContext {
                conn: reg.id,
                user_id: user.to_string(),
                user_name: user.to_uppercase(),
            },
            reg.receiver,
        )
    }

    #[tokio::test]
    async fn test_ping_and_feed_membership() {
        let (service, hub) = service();
        let (alice, mut rx) = ctx(&hub, "alice");

        service.dispatch(&alice, ClientEvent::Ping).await;
        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "pong");

        service.dispatch(&alice, ClientEvent::JoinFeed).await;
        assert!(hub.is_member(alice.conn, &Room::Feed));
        service.dispatch(&alice, ClientEvent::LeaveFeed).await;
        assert!(!hub.is_member(alice.conn, &Room::Feed));
    }

    #[tokio::test]
    async fn test_typing_requires_room_membership() {
        let (service, hub) = service();
        let (alice, mut rx) = ctx(&hub, "alice");
        let match_id = Uuid::new_v4();

        service.dispatch(&alice, ClientEvent::Typing { match_id, is_typing: true }).await;
        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "error");
        assert_eq!(frame["data"]["code"], "NOT_IN_MATCH");
    }

    #[tokio::test]
    async fn test_typing_reaches_others_only() {
        let (service, hub) = service();
        let (alice, mut alice_rx) = ctx(&hub, "alice");
        let (bob, mut bob_rx) = ctx(&hub, "bob");
        let match_id = Uuid::new_v4();
        hub.join(alice.conn, Room::Match(match_id));
        hub.join(bob.conn, Room::Match(match_id));

        service.dispatch(&alice, ClientEvent::Typing { match_id, is_typing: true }).await;

        let frame: Value = serde_json::from_str(&bob_rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "user_typing");
        assert_eq!(frame["data"]["userName"], "ALICE");
        assert!(alice_rx.try_recv().is_err());
        assert_eq!(hub.typing().active(match_id, Utc::now(), None).len(), 1);

        service.dispatch(&alice, ClientEvent::Typing { match_id, is_typing: false }).await;
        assert!(hub.typing().active(match_id, Utc::now(), None).is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected_before_database() {
        let (service, hub) = service();
        let (alice, mut rx) = ctx(&hub, "alice");

        let event = ClientEvent::SendMessage {
            match_id: Uuid::new_v4(),
            content: "   ".to_string(),
            message_type: MessageType::Text,
            attachments: Vec::new(),
            reply_to: None,
        };
        service.dispatch(&alice, event).await;

        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "error");
        assert_eq!(frame["data"]["code"], ChatError::EmptyContent.code());
    }

    #[tokio::test]
    async fn test_leave_match_announces_offline() {
        let (service, hub) = service();
        let (alice, _alice_rx) = ctx(&hub, "alice");
        let (bob, mut bob_rx) = ctx(&hub, "bob");
        let match_id = Uuid::new_v4();
        hub.join(alice.conn, Room::Match(match_id));
        hub.join(bob.conn, Room::Match(match_id));

        service.dispatch(&alice, ClientEvent::LeaveMatch { match_id }).await;

        let frame: Value = serde_json::from_str(&bob_rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "user_offline");
        assert_eq!(frame["data"]["userId"], "alice");
        assert!(!hub.is_member(alice.conn, &Room::Match(match_id)));
    }

    #[tokio::test]
    async fn test_lazily_dropped_connection_still_announces_offline() {
        let (service, hub) = service();
        let (alice, alice_rx) = ctx(&hub, "alice");
        let (bob, mut bob_rx) = ctx(&hub, "bob");
        let match_id = Uuid::new_v4();
        hub.join(alice.conn, Room::Match(match_id));
        hub.join(bob.conn, Room::Match(match_id));

        // alice's socket task ended; a fan-out notices before her teardown runs
        drop(alice_rx);
        hub.emit(&Room::Match(match_id), &ServerEvent::Pong { server_time: Utc::now() }, None);
        assert!(bob_rx.try_recv().is_ok());

        let departure = hub.unregister(alice.conn).unwrap();
        assert_eq!(departure.match_rooms, vec![match_id]);
        service.on_disconnect(&departure).await;

        let frame: Value = serde_json::from_str(&bob_rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "user_offline");
        assert_eq!(frame["data"]["userId"], "alice");
    }
}
