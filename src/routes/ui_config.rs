use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::core::ui_config::{rollout_bucket, select_config, validate_ui_config};
use crate::core::AudienceContext;
use crate::error::ApiError;
use crate::models::{FeedPost, UiConfig, UiConfigQuery};
use crate::realtime::ServerEvent;
use crate::routes::AppState;
use crate::services::{AuthenticatedUser, CacheKey, PostgresError};

/// Stored prod configs considered when resolving an audience
const CANDIDATE_CONFIGS: usize = 50;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ui-config", web::get().to(get_ui_config))
        .route("/ui-config", web::post().to(publish_ui_config));
}

/// Active config for the caller; anonymous callers only see full rollouts
///
/// GET /api/v1/ui-config?env&country
async fn get_ui_config(
    state: web::Data<AppState>,
    user: Option<AuthenticatedUser>,
    query: web::Query<UiConfigQuery>,
) -> Result<HttpResponse, ApiError> {
    let ctx = AudienceContext {
        user_id: user.map(|u| u.user_id),
        env: query.env.clone(),
        country: query.country.clone(),
    };
    let bucket = ctx.user_id.as_deref().map(rollout_bucket);
    let key = CacheKey::ui_config(ctx.env.as_deref(), ctx.country.as_deref(), bucket);

    let db = state.db.clone();
    let load = || async move {
        let configs = db.prod_ui_configs(CANDIDATE_CONFIGS).await?;
        Ok::<_, PostgresError>(select_config(&configs, &ctx).cloned())
    };

    let config = match &state.cache {
        Some(cache) => cache.get_or_load(&key, load).await?,
        None => load().await?,
    };

    match config {
        Some(config) => Ok(HttpResponse::Ok().json(config)),
        None => Err(ApiError::not_found("No UI config available").with_code("UI_CONFIG_NOT_FOUND")),
    }
}

/// Validate and store a config, then tell connected clients
///
/// POST /api/v1/ui-config (admin)
async fn publish_ui_config(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<UiConfig>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;

    let config = req.into_inner();
    validate_ui_config(&config)?;
    state.db.insert_ui_config(&config).await?;

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.invalidate_pattern(CacheKey::ui_config_pattern()).await {
            tracing::warn!(error = %e, "Failed to invalidate UI config cache");
        }
    }

    let post = FeedPost {
        id: Uuid::new_v4(),
        kind: "ui_config_updated".to_string(),
        title: format!("UI config {}", config.version),
        body: Some(config.meta.changelog.clone()),
        payload: json!({
            "version": config.version,
            "status": config.status,
        }),
        author_id: user.user_id.clone(),
        created_at: Utc::now(),
    };
    let delivered = state.hub.broadcast_feed(&ServerEvent::FeedPost(post));

    tracing::info!(
        version = %config.version,
        status = config.status.as_str(),
        admin = %user.user_id,
        delivered,
        "UI config published"
    );

    Ok(HttpResponse::Created().json(json!({
        "version": config.version,
        "status": config.status,
    })))
}
