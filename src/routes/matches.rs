use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::core::chat::page_window;
use crate::error::ApiError;
use crate::models::{
    ListMatchesQuery, MatchFlagResponse, MatchesResponse, MessageType, MessagesQuery, MessagesResponse,
    Pagination, SendMessageRequest,
};
use crate::realtime::{MessageDraft, Sender};
use crate::routes::AppState;
use crate::services::{display_name, AuthenticatedUser, MatchFlag};

const MAX_LIST_LIMIT: u32 = 100;
const MAX_MESSAGE_PAGE: u32 = 100;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/matches", web::get().to(list_matches))
        .route("/matches/stats", web::get().to(match_stats))
        .route("/matches/{match_id}", web::get().to(get_match))
        .route("/matches/{match_id}/messages", web::get().to(get_messages))
        .route("/matches/{match_id}/messages", web::post().to(post_message))
        .route("/matches/{match_id}/typing", web::get().to(typing_status))
        .route("/matches/{match_id}/archive", web::patch().to(toggle_archive))
        .route("/matches/{match_id}/favorite", web::patch().to(toggle_favorite))
        .route("/matches/{match_id}/block", web::patch().to(block_match));
}

/// List the caller's matches
///
/// GET /api/v1/matches?status=active|archived|blocked|all&page&limit&sort=newest|oldest|alpha&q&species
async fn list_matches(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<ListMatchesQuery>,
) -> Result<HttpResponse, ApiError> {
    let filter = query.to_filter(MAX_LIST_LIMIT).map_err(ApiError::bad_request)?;
    let (matches, has_more) = state.db.list_match_summaries(&user.user_id, &filter).await?;

    tracing::debug!(user_id = %user.user_id, count = matches.len(), scope = ?filter.scope, "Listed matches");

    Ok(HttpResponse::Ok().json(MatchesResponse {
        matches,
        pagination: Pagination {
            page: filter.page,
            limit: filter.limit,
            has_more,
            total: None,
        },
    }))
}

/// GET /api/v1/matches/stats
async fn match_stats(state: web::Data<AppState>, user: AuthenticatedUser) -> Result<HttpResponse, ApiError> {
    let stats = state.db.match_stats(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// One match; opening it marks the other side's messages read
///
/// GET /api/v1/matches/{match_id}
async fn get_match(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let match_id = path.into_inner();
    let m = state.chat.load_match(match_id, &user.user_id).await?;

    if m.actions_for(&user.user_id).map_or(false, |a| a.is_blocked) {
        return Err(ApiError::forbidden("You have blocked this match").with_code("MATCH_BLOCKED"));
    }

    let marked = state.chat.mark_read_on_open(&m, &user.user_id, Utc::now()).await?;
    if !marked.is_empty() {
        tracing::debug!(user_id = %user.user_id, %match_id, marked = marked.len(), "Marked messages read");
    }

    Ok(HttpResponse::Ok().json(m))
}

/// Message history, newest page first
///
/// GET /api/v1/matches/{match_id}/messages?page&limit
async fn get_messages(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    query: web::Query<MessagesQuery>,
) -> Result<HttpResponse, ApiError> {
    let match_id = path.into_inner();
    state.chat.load_match(match_id, &user.user_id).await?;

    let page = query.page.max(1);
    let limit = query.limit.clamp(1, MAX_MESSAGE_PAGE);

    let total = state.db.count_messages(match_id).await?;
    let window = page_window(total, page, limit);
    let mut messages = state
        .db
        .messages_range(match_id, window.start, window.end - window.start)
        .await?;
    messages.reverse();

    Ok(HttpResponse::Ok().json(MessagesResponse {
        messages,
        pagination: Pagination {
            page,
            limit,
            has_more: window.has_more,
            total: Some(total),
        },
    }))
}

/// Post a message over HTTP; delivered to the room like a socket message
///
/// POST /api/v1/matches/{match_id}/messages
async fn post_message(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, ApiError> {
    let match_id = path.into_inner();
    let user_name = display_name(&user.account);
    let sender = Sender {
        user_id: &user.user_id,
        user_name: &user_name,
        origin: None,
    };

    let req = req.into_inner();
    let draft = MessageDraft {
        content: req.content,
        message_type: req.message_type,
        attachments: req.attachments,
        reply_to: req.reply_to,
    };
    let message = state.chat.send_message(&sender, match_id, draft).await?;

    if message.message_type != MessageType::Text {
        tracing::debug!(%match_id, kind = message.message_type.as_str(), "Media message posted");
    }

    Ok(HttpResponse::Created().json(message))
}

/// Who is typing in a match, excluding the caller
///
/// GET /api/v1/matches/{match_id}/typing
async fn typing_status(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let match_id = path.into_inner();
    state.chat.load_match(match_id, &user.user_id).await?;

    let typing = state.hub.typing().active(match_id, Utc::now(), Some(&user.user_id));
    Ok(HttpResponse::Ok().json(json!({
        "matchId": match_id,
        "typing": typing,
    })))
}

async fn toggle_flag(state: &AppState, user: &AuthenticatedUser, match_id: Uuid, flag: MatchFlag) -> Result<HttpResponse, ApiError> {
    let m = state.chat.load_match(match_id, &user.user_id).await?;
    let current = m.actions_for(&user.user_id).copied().unwrap_or_default();
    let value = match flag {
        MatchFlag::Archived => !current.is_archived,
        MatchFlag::Favorite => !current.is_favorite,
        MatchFlag::Blocked => true,
    };

    state.chat.set_flag(&user.user_id, match_id, flag, value).await?;

    Ok(HttpResponse::Ok().json(MatchFlagResponse {
        match_id,
        flag: flag.as_str().to_string(),
        value,
    }))
}

/// PATCH /api/v1/matches/{match_id}/archive
async fn toggle_archive(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    toggle_flag(&state, &user, path.into_inner(), MatchFlag::Archived).await
}

/// PATCH /api/v1/matches/{match_id}/favorite
async fn toggle_favorite(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    toggle_flag(&state, &user, path.into_inner(), MatchFlag::Favorite).await
}

/// Blocking is one-way; there is no unblock
///
/// PATCH /api/v1/matches/{match_id}/block
async fn block_match(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    toggle_flag(&state, &user, path.into_inner(), MatchFlag::Blocked).await
}
