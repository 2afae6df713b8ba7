//! One task per websocket: authentication, heartbeat and frame routing.

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{CloseReason, Message, MessageStream, Session};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::error::ApiError;
use crate::realtime::handlers::{ChatService, SessionContext};
use crate::realtime::hub::Outbound;
use crate::realtime::protocol::{ClientEvent, ServerEvent};
use crate::routes::AppState;
use crate::services::auth::extract_token;
use crate::services::{display_name, AuthError};

#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Heartbeat {
    pub fn new(interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs.max(1)),
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }
}

/// Upgrade endpoint
///
/// GET /ws
pub async fn websocket(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let token = extract_token(&req).ok_or(AuthError::MissingToken)?;
    let user = state.auth.authenticate(&token).await.map_err(|e| {
        tracing::info!(error = %e, "Rejected websocket handshake");
        e
    })?;

    let (response, session, stream) = actix_ws::handle(&req, body)?;

    let hub = state.hub.clone();
    let registration = hub.register(&user.user_id);
    let ctx = SessionContext {
        conn: registration.id,
        user_id: user.user_id.clone(),
        user_name: display_name(&user.account),
    };

    tracing::info!(
        user_id = %ctx.user_id,
        connection_id = %ctx.conn,
        came_online = registration.came_online,
        "Websocket connected"
    );

    hub.send_to(
        ctx.conn,
        &ServerEvent::Connected {
            user_id: ctx.user_id.clone(),
            connection_id: ctx.conn,
            server_time: Utc::now(),
        },
    );

    let realtime = &state.settings.realtime;
    let heartbeat = Heartbeat::new(realtime.heartbeat_interval_secs, realtime.client_timeout_secs);
    let chat = state.chat.clone();

    actix_web::rt::spawn(async move {
        let reason = run(session, stream, registration.receiver, &ctx, &chat, heartbeat).await;

        tracing::info!(
            user_id = %ctx.user_id,
            connection_id = %ctx.conn,
            reason = ?reason,
            "Websocket disconnected"
        );

        if let Some(departure) = chat.hub().unregister(ctx.conn) {
            chat.on_disconnect(&departure).await;
        }
    });

    Ok(response)
}

async fn run(
    mut session: Session,
    mut stream: MessageStream,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    ctx: &SessionContext,
    chat: &Arc<ChatService>,
    heartbeat: Heartbeat,
) -> Option<CloseReason> {
    let mut ticker = interval(heartbeat.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    let reason = loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if session.text(String::from(&*frame)).await.is_err() {
                        break None;
                    }
                }
                None => break None,
            },

            msg = stream.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::warn!(connection_id = %ctx.conn, error = %e, "Websocket protocol error");
                        break None;
                    }
                    None => break None,
                };

                last_seen = Instant::now();
                chat.hub().presence().touch(&ctx.user_id, Utc::now());

                match msg {
                    Message::Text(text) => match ClientEvent::parse(&text) {
                        Ok(event) => chat.dispatch(ctx, event).await,
                        Err(e) => {
                            tracing::debug!(connection_id = %ctx.conn, error = %e, "Unparseable client frame");
                            chat.hub().send_to(
                                ctx.conn,
                                &ServerEvent::error_with_code(format!("Invalid event: {}", e), "INVALID_EVENT"),
                            );
                        }
                    },
                    Message::Binary(_) => {
                        chat.hub().send_to(
                            ctx.conn,
                            &ServerEvent::error_with_code("Binary frames are not supported", "INVALID_EVENT"),
                        );
                    }
                    Message::Ping(bytes) => {
                        if session.pong(&bytes).await.is_err() {
                            break None;
                        }
                    }
                    Message::Close(reason) => break reason,
                    _ => {}
                }
            }

            _ = ticker.tick() => {
                if Instant::now().duration_since(last_seen) > heartbeat.timeout {
                    tracing::info!(connection_id = %ctx.conn, "Client heartbeat timed out");
                    break None;
                }
                if session.ping(b"").await.is_err() {
                    break None;
                }
            }
        }
    };

    let _ = session.close(reason.clone()).await;
    reason
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_never_zero() {
        let hb = Heartbeat::new(0, 0);
        assert_eq!(hb.interval, Duration::from_secs(1));
        assert_eq!(hb.timeout, Duration::from_secs(1));

        let hb = Heartbeat::new(25, 60);
        assert!(hb.timeout > hb.interval);
    }
}
