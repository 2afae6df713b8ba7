use std::sync::Arc;

use crate::models::UserAccount;
use crate::services::cache::{CacheKey, CacheManager};
use crate::services::postgres::{PostgresClient, PostgresError};

/// Account lookups shared by HTTP routes and realtime sessions
#[derive(Clone)]
pub struct AccountDirectory {
    db: Arc<PostgresClient>,
    cache: Option<Arc<CacheManager>>,
}

impl AccountDirectory {
    pub fn new(db: Arc<PostgresClient>, cache: Option<Arc<CacheManager>>) -> Self {
        Self { db, cache }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<UserAccount>, PostgresError> {
        match &self.cache {
            Some(cache) => {
                cache
                    .get_or_load(&CacheKey::account(user_id), || self.db.get_account(user_id))
                    .await
            }
            None => self.db.get_account(user_id).await,
        }
    }

    /// Forget the cached copy after the account changed
    pub async fn invalidate(&self, user_id: &str) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(&CacheKey::account(user_id)).await {
                tracing::warn!(user_id, error = %e, "Failed to invalidate cached account");
            }
        }
    }
}

/// Name shown in typing events and push titles: the first name only
pub fn display_name(account: &UserAccount) -> String {
    match account.first_name.trim() {
        "" => "Someone".to_string(),
        first => first.to_string(),
    }
}
