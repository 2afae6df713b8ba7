use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::routes::AppState;
use crate::services::AuthenticatedUser;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/presence/online", web::get().to(online_users));
}

/// Users with at least one socket on this node
///
/// GET /api/v1/presence/online
async fn online_users(state: web::Data<AppState>, _user: AuthenticatedUser) -> impl Responder {
    let users = state.hub.online_users();
    HttpResponse::Ok().json(json!({
        "count": users.len(),
        "users": users,
    }))
}
