use futures::StreamExt;
use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Channel on which nodes announce L2 deletions so peers drop their L1 copy.
/// Services that write accounts elsewhere publish here too.
pub const INVALIDATION_CHANNEL: &str = "pawfect:cache:invalidate";

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// What a peer asked every node to forget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Invalidation {
    Key(String),
    Pattern(String),
}

impl Invalidation {
    pub fn decode(payload: &str) -> Result<Self, CacheError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Two-tier cache for accounts and UI configs
///
/// L1 is a per-process moka cache; L2 is Redis and shared by every node.
/// Both tiers hold the same JSON encoding. Deletions are broadcast on
/// `INVALIDATION_CHANNEL` so other nodes do not serve a stale L1 entry.
pub struct CacheManager {
    client: redis::Client,
    redis: Arc<tokio::sync::Mutex<ConnectionManager>>,
    l1_cache: moka::future::Cache<String, Arc<str>>,
    ttl_secs: u64,
}

impl CacheManager {
    pub async fn new(redis_url: &str, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client.clone()).await?;

        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Ok(Self {
            client,
            redis: Arc::new(tokio::sync::Mutex::new(redis)),
            l1_cache,
            ttl_secs,
        })
    }

    /// Look a key up in L1, then L2. `Ok(None)` is a miss in both.
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        if let Some(json) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(Some(serde_json::from_str(&json)?));
        }

        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        drop(conn);

        match value {
            Some(json) => {
                tracing::trace!("L2 cache hit: {}", key);
                let decoded = serde_json::from_str(&json)?;
                self.l1_cache.insert(key.to_string(), Arc::from(json)).await;
                Ok(Some(decoded))
            }
            None => {
                tracing::trace!("Cache miss: {}", key);
                Ok(None)
            }
        }
    }

    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;

        let mut conn = self.redis.lock().await;
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(self.ttl_secs)
            .arg(&json)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        self.l1_cache.insert(key.to_string(), Arc::from(json)).await;
        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Read through the cache
    ///
    /// Cache failures are logged and fall back to `load`; only `load` errors
    /// reach the caller. `None` results are not cached.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &str, load: F) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(hit)) => return Ok(Some(hit)),
            Ok(None) => {}
            Err(e) => tracing::warn!(key, error = %e, "Cache read failed, loading from source"),
        }

        let loaded = load().await?;
        if let Some(value) = &loaded {
            if let Err(e) = self.set(key, value).await {
                tracing::warn!(key, error = %e, "Cache write failed");
            }
        }
        Ok(loaded)
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.l1_cache.invalidate(key).await;
        let mut conn = self.redis.lock().await;
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut *conn).await?;
        drop(conn);

        self.announce(&Invalidation::Key(key.to_string())).await
    }

    /// Drop every key matching a Redis glob
    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<(), CacheError> {
        // L1 keys are not indexed by pattern, so the whole tier goes
        self.l1_cache.invalidate_all();

        let mut conn = self.redis.lock().await;
        let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut *conn).await?;

        if !keys.is_empty() {
            let _: () = redis::cmd("DEL").arg(&keys).query_async(&mut *conn).await?;
        }

        drop(conn);

        tracing::debug!("Invalidated {} keys matching {}", keys.len(), pattern);
        self.announce(&Invalidation::Pattern(pattern.to_string())).await
    }

    async fn announce(&self, invalidation: &Invalidation) -> Result<(), CacheError> {
        let json = serde_json::to_string(invalidation)?;
        let mut conn = self.redis.lock().await;
        let _receivers: i64 = redis::cmd("PUBLISH")
            .arg(INVALIDATION_CHANNEL)
            .arg(json)
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }

    /// Drop the local copy named by a peer's invalidation
    pub async fn apply(&self, invalidation: &Invalidation) {
        match invalidation {
            Invalidation::Key(key) => self.l1_cache.invalidate(key).await,
            // L1 keys are not indexed by pattern
            Invalidation::Pattern(_) => self.l1_cache.invalidate_all(),
        }
    }

    /// Follow `INVALIDATION_CHANNEL` for the life of the process
    pub fn spawn_invalidation_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match cache.listen_once().await {
                    Ok(()) => tracing::warn!("Cache invalidation subscription ended, resubscribing"),
                    Err(e) => tracing::error!(error = %e, "Cache invalidation subscription failed"),
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        })
    }

    async fn listen_once(&self) -> Result<(), CacheError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(INVALIDATION_CHANNEL).await?;

        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable cache invalidation");
                    continue;
                }
            };
            match Invalidation::decode(&payload) {
                Ok(invalidation) => self.apply(&invalidation).await,
                Err(e) => tracing::warn!(error = %e, "Malformed cache invalidation"),
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_size: self.l1_cache.entry_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_size: u64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    pub fn account(user_id: &str) -> String {
        format!("account:{}", user_id)
    }

    /// Key of the UI config resolved for one audience slice
    pub fn ui_config(env: Option<&str>, country: Option<&str>, bucket: Option<u32>) -> String {
        format!(
            "ui_config:{}:{}:{}",
            env.unwrap_or("*"),
            country.map(|c| c.to_uppercase()).unwrap_or_else(|| "*".to_string()),
            bucket.map(|b| b.to_string()).unwrap_or_else(|| "anon".to_string())
        )
    }

    pub fn ui_config_pattern() -> &'static str {
        "ui_config:*"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_cache_set_get() {
        let cache = CacheManager::new("redis://127.0.0.1:6379", 1000, 60)
            .await
            .expect("Failed to create cache");

        let key = CacheKey::account("cache-test");
        cache.set(&key, &"value").await.unwrap();
        let result: Option<String> = cache.get(&key).await.unwrap();
        assert_eq!(result.as_deref(), Some("value"));

        cache.delete(&key).await.unwrap();
        assert!(cache.get::<String>(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_get_or_load_populates() {
        let cache = CacheManager::new("redis://127.0.0.1:6379", 1000, 60)
            .await
            .expect("Failed to create cache");
        let key = CacheKey::account("load-test");
        cache.delete(&key).await.unwrap();

        let loaded: Result<Option<u32>, ()> = cache.get_or_load(&key, || async { Ok(Some(7)) }).await;
        assert_eq!(loaded, Ok(Some(7)));

        let cached: Result<Option<u32>, ()> = cache.get_or_load(&key, || async { Ok(None) }).await;
        assert_eq!(cached, Ok(Some(7)));
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_delete_reaches_peer_l1() {
        let writer = Arc::new(CacheManager::new("redis://127.0.0.1:6379", 1000, 60).await.unwrap());
        let peer = Arc::new(CacheManager::new("redis://127.0.0.1:6379", 1000, 60).await.unwrap());
        let listener = peer.spawn_invalidation_listener();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let key = CacheKey::account("peer-test");
        writer.set(&key, &"premium").await.unwrap();
        // warm the peer's L1
        assert_eq!(peer.get::<String>(&key).await.unwrap().as_deref(), Some("premium"));

        writer.delete(&key).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(peer.get::<String>(&key).await.unwrap().is_none());

        listener.abort();
    }

    #[test]
    fn test_invalidation_wire_format() {
        let key = Invalidation::Key("account:u1".to_string());
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"kind":"key","target":"account:u1"}"#);
        assert_eq!(Invalidation::decode(&json).unwrap(), key);

        let pattern = Invalidation::decode(r#"{"kind":"pattern","target":"ui_config:*"}"#).unwrap();
        assert_eq!(pattern, Invalidation::Pattern("ui_config:*".to_string()));
        assert!(Invalidation::decode("account:u1").is_err());
    }

    #[test]
    fn test_cache_key_builder() {
        assert_eq!(CacheKey::account("user123"), "account:user123");
        assert_eq!(CacheKey::ui_config(Some("prod"), Some("de"), Some(42)), "ui_config:prod:DE:42");
        assert_eq!(CacheKey::ui_config(None, None, None), "ui_config:*:*:anon");
        assert!(CacheKey::ui_config(None, None, None).starts_with("ui_config:"));
    }
}
