use actix_cors::Cors;
use actix_web::{error, middleware, web, App, HttpRequest, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pawfect_match::config::Settings;
use pawfect_match::core::{Recommender, SwipePolicy};
use pawfect_match::error::ApiError;
use pawfect_match::models::DiscoveryWeights;
use pawfect_match::realtime::{spawn_typing_sweeper, ChatService, Hub, RedisAdapter};
use pawfect_match::routes::{self, AppState};
use pawfect_match::services::{AccountDirectory, AuthService, CacheManager, JwtVerifier, PostgresClient, PushClient};

/// Handle JSON payload errors
fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    ApiError::bad_request(format!("Invalid JSON: {}", err))
        .with_code("INVALID_JSON")
        .into()
}

/// Handle query payload errors
fn handle_query_payload_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::bad_request(format!("Invalid query: {}", err))
        .with_code("INVALID_QUERY")
        .into()
}

fn handle_path_error(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::bad_request(format!("Invalid path: {}", err))
        .with_code("INVALID_PATH")
        .into()
}

fn init_logging(settings: &Settings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if settings.logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_logging(&settings);
    info!("Starting PawfectMatch backend...");

    let db = PostgresClient::from_settings(
        &settings.database.url,
        settings.database.max_connections,
        settings.database.min_connections,
        settings.database.acquire_timeout_secs,
        settings.database.idle_timeout_secs,
    )
    .await
    .map_err(|e| {
        error!("Failed to connect to PostgreSQL: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    let db = Arc::new(db);
    info!("PostgreSQL client initialized");

    // Cache is optional; accounts and UI configs fall back to the database
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(1000);
    let cache = match CacheManager::new(&settings.cache.redis_url, l1_cache_size, cache_ttl).await {
        Ok(c) => {
            info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);
            let cache = Arc::new(c);
            cache.spawn_invalidation_listener();
            Some(cache)
        }
        Err(e) => {
            warn!("Failed to connect to Redis ({}), running without cache", e);
            None
        }
    };

    let accounts = AccountDirectory::new(db.clone(), cache.clone());
    let auth = Arc::new(AuthService::new(
        JwtVerifier::new(&settings.auth.jwt_secret, settings.auth.leeway_secs),
        accounts.clone(),
    ));

    let realtime = &settings.realtime;
    let node_id = realtime
        .node_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let hub = Arc::new(Hub::new(node_id.clone(), realtime.typing_ttl_secs));

    if realtime.redis_adapter {
        match RedisAdapter::connect(&settings.cache.redis_url, &realtime.channel, &node_id).await {
            Ok(adapter) => {
                hub.attach_adapter(adapter.clone());
                if let Err(e) = adapter.start(hub.clone()) {
                    error!("Failed to start realtime adapter: {}", e);
                } else {
                    info!(node_id = %node_id, channel = %realtime.channel, "Redis realtime adapter enabled");
                }
            }
            Err(e) => error!("Redis realtime adapter unavailable, running single-node: {}", e),
        }
    }

    let push = match PushClient::new(&settings.push) {
        Ok(client) => client,
        Err(e) => {
            warn!("Push client misconfigured ({}), notifications disabled", e);
            PushClient::disabled()
        }
    };
    info!(enabled = push.is_enabled(), "Push client initialized");

    let chat = Arc::new(ChatService::new(db.clone(), hub.clone(), Arc::new(push), accounts.clone()));

    let weights = DiscoveryWeights::from(&settings.discovery.weights);
    info!("Recommender initialized with weights: {:?}", weights);

    spawn_typing_sweeper(hub.clone(), Duration::from_secs(1));

    let app_state = AppState {
        db,
        cache,
        accounts,
        auth: auth.clone(),
        hub,
        chat,
        recommender: Recommender::new(weights, settings.discovery.min_score),
        swipe_policy: SwipePolicy::new(settings.swipes.free_daily_limit),
        settings: settings.clone(),
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::from(auth.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
