use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::chat::{Attachment, MatchListFilter, MatchScope, MatchSort, MessageType};
use crate::models::domain::DiscoveryPreferences;

/// Query for the swipe deck
///
/// List-valued filters are comma separated, e.g. `species=dog,cat`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsQuery {
    #[serde(default)]
    pub limit: Option<u16>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[serde(default = "default_max_distance")]
    #[validate(range(min = 1, max = 500))]
    pub max_distance_km: u16,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub sizes: Option<String>,
    #[serde(default)]
    pub intents: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub min_age: Option<u8>,
    #[serde(default)]
    pub max_age: Option<u8>,
    #[serde(default)]
    pub exclude_pet_ids: Option<String>,
}

fn default_limit() -> u16 {
    20
}

fn default_max_distance() -> u16 {
    50
}

fn split_list(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

impl RecommendationsQuery {
    pub fn to_preferences(&self, user_id: &str) -> DiscoveryPreferences {
        DiscoveryPreferences {
            user_id: user_id.to_string(),
            species: split_list(&self.species),
            sizes: split_list(&self.sizes),
            intents: split_list(&self.intents),
            min_age: self.min_age.unwrap_or(0),
            max_age: self.max_age.unwrap_or(30),
            preferred_tags: split_list(&self.tags),
            max_distance_km: self.max_distance_km,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// Malformed ids are skipped rather than rejected
    pub fn excluded_pets(&self) -> Vec<Uuid> {
        split_list(&self.exclude_pet_ids)
            .iter()
            .filter_map(|id| Uuid::parse_str(id).ok())
            .collect()
    }
}

/// Request to record a swipe
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SwipeRequest {
    #[serde(alias = "pet_id")]
    pub pet_id: Uuid,
    #[validate(length(min = 1))]
    pub action: String,
}

/// Request body for posting a chat message over HTTP
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reply_to: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMatchesQuery {
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u16,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
}

fn default_status() -> String {
    "active".to_string()
}

impl ListMatchesQuery {
    /// Unknown sort values fall back to newest first; an unknown status is an error
    pub fn to_filter(&self, max_limit: u32) -> Result<MatchListFilter, String> {
        let scope: MatchScope = self.status.parse()?;
        let sort = self
            .sort
            .as_deref()
            .and_then(|s| s.parse::<MatchSort>().ok())
            .unwrap_or_default();
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(MatchListFilter {
            scope,
            sort,
            search: non_empty(&self.q),
            species: non_empty(&self.species),
            page: self.page.max(1),
            limit: u32::from(self.limit).clamp(1, max_limit.max(1)),
        })
    }
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_message_limit")]
    pub limit: u32,
}

fn default_message_limit() -> u32 {
    50
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiConfigQuery {
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Admin request to push an item to the live feed
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeedPostRequest {
    #[validate(length(min = 1, max = 64))]
    pub kind: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}
