use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::models::{FeedPost, FeedPostRequest};
use crate::realtime::ServerEvent;
use crate::routes::AppState;
use crate::services::AuthenticatedUser;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/feed/posts", web::post().to(create_post));
}

/// Push an item to everyone in the feed room
///
/// POST /api/v1/feed/posts (admin)
async fn create_post(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<FeedPostRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    req.validate()?;

    let req = req.into_inner();
    let post = FeedPost {
        id: Uuid::new_v4(),
        kind: req.kind,
        title: req.title,
        body: req.body,
        payload: req.payload,
        author_id: user.user_id.clone(),
        created_at: Utc::now(),
    };

    let delivered = state.hub.broadcast_feed(&ServerEvent::FeedPost(post.clone()));
    tracing::info!(post_id = %post.id, kind = %post.kind, delivered, "Feed post broadcast");

    Ok(HttpResponse::Created().json(json!({
        "post": post,
        "delivered": delivered,
    })))
}
