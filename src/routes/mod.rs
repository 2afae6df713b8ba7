// Route exports
pub mod feed;
pub mod health;
pub mod matches;
pub mod presence;
pub mod recommendations;
pub mod swipes;
pub mod ui_config;

use actix_web::web;
use std::sync::Arc;

use crate::config::Settings;
use crate::core::{Recommender, SwipePolicy};
use crate::realtime::{session, ChatService, Hub};
use crate::services::{AccountDirectory, AuthService, CacheManager, PostgresClient};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<PostgresClient>,
    pub cache: Option<Arc<CacheManager>>,
    pub accounts: AccountDirectory,
    pub auth: Arc<AuthService>,
    pub hub: Arc<Hub>,
    pub chat: Arc<ChatService>,
    pub recommender: Recommender,
    pub swipe_policy: SwipePolicy,
    pub settings: Arc<Settings>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(health::configure)
            .configure(recommendations::configure)
            .configure(swipes::configure)
            .configure(matches::configure)
            .configure(presence::configure)
            .configure(feed::configure)
            .configure(ui_config::configure),
    )
    .route("/ws", web::get().to(session::websocket));
}
