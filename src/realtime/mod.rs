// Realtime layer: rooms, presence, typing and the websocket sessions
pub mod adapter;
pub mod handlers;
pub mod hub;
pub mod presence;
pub mod protocol;
pub mod rooms;
pub mod session;
pub mod typing;

pub use adapter::{AdapterEnvelope, AdapterError, RedisAdapter};
pub use handlers::{ChatService, HandlerError, MessageDraft, Sender, SessionContext};
pub use hub::{ConnectionId, Hub, HubStats};
pub use presence::OnlineUser;
pub use protocol::{ClientEvent, MatchAction, ServerEvent};
pub use rooms::Room;
pub use typing::TypingEntry;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Expire stale typing indicators in the background
pub fn spawn_typing_sweeper(hub: Arc<Hub>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let swept = hub.typing().sweep(Utc::now());
            if swept > 0 {
                tracing::trace!(swept, "Expired typing indicators");
            }
        }
    })
}
