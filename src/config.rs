use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::models::DiscoveryWeights;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub realtime: RealtimeSettings,
    #[serde(default)]
    pub swipes: SwipeSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub push: PushSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub redis_url: String,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,
}

fn default_leeway() -> u64 { 30 }

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeSettings {
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_client_timeout")]
    pub client_timeout_secs: u64,
    #[serde(default = "default_typing_ttl")]
    pub typing_ttl_secs: i64,
    #[serde(default)]
    pub redis_adapter: bool,
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Defaults to a random id per process
    pub node_id: Option<String>,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            client_timeout_secs: default_client_timeout(),
            typing_ttl_secs: default_typing_ttl(),
            redis_adapter: false,
            channel: default_channel(),
            node_id: None,
        }
    }
}

fn default_heartbeat_interval() -> u64 { 25 }
fn default_client_timeout() -> u64 { 60 }
fn default_typing_ttl() -> i64 { 5 }
fn default_channel() -> String { "pawfect:realtime".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct SwipeSettings {
    #[serde(default = "default_free_daily_limit")]
    pub free_daily_limit: u32,
}

impl Default for SwipeSettings {
    fn default() -> Self {
        Self { free_daily_limit: default_free_daily_limit() }
    }
}

fn default_free_daily_limit() -> u32 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySettings {
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            weights: WeightsConfig::default(),
            min_score: default_min_score(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_min_score() -> f64 { 5.0 }
fn default_limit() -> usize { 20 }
fn default_max_limit() -> usize { 100 }

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_distance_weight")]
    pub distance: f64,
    #[serde(default = "default_age_weight")]
    pub age: f64,
    #[serde(default = "default_personality_weight")]
    pub personality: f64,
    #[serde(default = "default_verified_weight")]
    pub verified: f64,
    #[serde(default = "default_intent_weight")]
    pub intent: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            distance: default_distance_weight(),
            age: default_age_weight(),
            personality: default_personality_weight(),
            verified: default_verified_weight(),
            intent: default_intent_weight(),
        }
    }
}

impl From<&WeightsConfig> for DiscoveryWeights {
    fn from(w: &WeightsConfig) -> Self {
        DiscoveryWeights {
            distance: w.distance,
            age: w.age,
            personality: w.personality,
            verified: w.verified,
            intent: w.intent,
        }
    }
}

fn default_distance_weight() -> f64 { 0.35 }
fn default_age_weight() -> f64 { 0.20 }
fn default_personality_weight() -> f64 { 0.25 }
fn default_verified_weight() -> f64 { 0.10 }
fn default_intent_weight() -> f64 { 0.10 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Later sources override earlier ones:
    /// 1. config/default.toml
    /// 2. config/local.toml (development overrides)
    /// 3. Environment variables prefixed with PAWFECT
    /// 4. DATABASE_URL, REDIS_URL and JWT_SECRET
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., PAWFECT__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("PAWFECT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = apply_env_overrides(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("PAWFECT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Conventional unprefixed variables win over everything else
fn apply_env_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    for (var, key) in [
        ("DATABASE_URL", "database.url"),
        ("REDIS_URL", "cache.redis_url"),
        ("JWT_SECRET", "auth.jwt_secret"),
    ] {
        if let Ok(value) = env::var(var) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let weights = WeightsConfig::default();
        assert_eq!(weights.distance, 0.35);
        assert_eq!(weights.age, 0.20);
        assert_eq!(weights.personality, 0.25);
        assert_eq!(weights.verified, 0.10);
        assert_eq!(weights.intent, 0.10);
    }

    #[test]
    fn test_realtime_defaults() {
        let realtime = RealtimeSettings::default();
        assert_eq!(realtime.typing_ttl_secs, 5);
        assert!(!realtime.redis_adapter);
        assert!(realtime.client_timeout_secs > realtime.heartbeat_interval_secs);
    }

    #[test]
    fn test_default_logging() {
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_log_format(), "json");
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("pawfect-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
url = "postgres://localhost/pawfect"

[cache]
redis_url = "redis://localhost:6379"

[auth]
jwt_secret = "secret"

[swipes]
free_daily_limit = 7

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.swipes.free_daily_limit, 7);
        assert_eq!(settings.logging.format, "json");
        assert_eq!(settings.realtime.channel, "pawfect:realtime");
        assert_eq!(settings.discovery.max_limit, 100);
    }
}
