use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::notify::QuietHours;

/// Pet profile with demographic and location data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetProfile {
    #[serde(rename = "petId")]
    pub pet_id: Uuid,
    #[serde(rename = "ownerId")]
    pub owner_id: String,
    pub name: String,
    pub species: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(rename = "ageYears")]
    pub age_years: u8,
    pub size: String,
    pub intent: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "isVerified", default)]
    pub is_verified: bool,
    #[serde(rename = "isActive", default = "default_true")]
    pub is_active: bool,
    #[serde(rename = "photoUrls", default)]
    pub photo_urls: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "personalityTags", default)]
    pub personality_tags: Vec<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool { true }

/// What a user is looking for while swiping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryPreferences {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub species: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub intents: Vec<String>,
    #[serde(rename = "minAge", default)]
    pub min_age: u8,
    #[serde(rename = "maxAge", default = "default_max_age")]
    pub max_age: u8,
    #[serde(rename = "preferredTags", default)]
    pub preferred_tags: Vec<String>,
    #[serde(rename = "maxDistanceKm", default = "default_max_distance")]
    pub max_distance_km: u16,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

fn default_max_age() -> u8 { 30 }
fn default_max_distance() -> u16 { 50 }

/// Ranked recommendation returned to the swipe deck
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPet {
    #[serde(rename = "petId")]
    pub pet_id: Uuid,
    #[serde(rename = "ownerId")]
    pub owner_id: String,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    #[serde(rename = "ageYears")]
    pub age_years: u8,
    pub size: String,
    pub intent: String,
    #[serde(rename = "distanceKm")]
    pub distance_km: f64,
    #[serde(rename = "matchScore")]
    pub match_score: f64,
    #[serde(rename = "sharedTags")]
    pub shared_tags: Vec<String>,
    #[serde(rename = "isVerified")]
    pub is_verified: bool,
    #[serde(rename = "photoUrls")]
    pub photo_urls: Vec<String>,
    pub description: Option<String>,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Candidate query parameters
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub bounding_box: BoundingBox,
    pub species: Vec<String>,
    pub sizes: Vec<String>,
    pub intents: Vec<String>,
    pub min_age: u8,
    pub max_age: u8,
    pub exclude_owner_id: String,
    pub exclude_pet_ids: Vec<Uuid>,
    pub limit: usize,
}

/// Weights of the recommendation score components
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryWeights {
    pub distance: f64,
    pub age: f64,
    pub personality: f64,
    pub verified: f64,
    pub intent: f64,
}

impl Default for DiscoveryWeights {
    fn default() -> Self {
        Self {
            distance: 0.35,
            age: 0.20,
            personality: 0.25,
            verified: 0.10,
            intent: 0.10,
        }
    }
}

/// A swipe on a candidate pet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeAction {
    Like,
    Pass,
    Superlike,
}

impl SwipeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeAction::Like => "like",
            SwipeAction::Pass => "pass",
            SwipeAction::Superlike => "superlike",
        }
    }

    /// Likes and superlikes can complete a match, passes never do
    pub fn is_positive(&self) -> bool {
        matches!(self, SwipeAction::Like | SwipeAction::Superlike)
    }
}

impl fmt::Display for SwipeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwipeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "like" => Ok(SwipeAction::Like),
            "pass" => Ok(SwipeAction::Pass),
            "superlike" => Ok(SwipeAction::Superlike),
            other => Err(format!("unknown swipe action: {}", other)),
        }
    }
}

/// Persisted swipe
/// Subscription state relevant to swipe quotas and chat features
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumStatus {
    pub is_active: bool,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unlimited_likes: bool,
    #[serde(default)]
    pub read_receipts: bool,
    #[serde(default)]
    pub iap_super_likes: i32,
}

impl PremiumStatus {
    /// Active and not past its expiry
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |exp| exp > now)
    }

    pub fn has_read_receipts(&self, now: DateTime<Utc>) -> bool {
        let plan_allows = self
            .plan
            .as_deref()
            .map(|p| p.eq_ignore_ascii_case("premium") || p.eq_ignore_ascii_case("ultimate"))
            .unwrap_or(false);
        self.is_current(now) && plan_allows && self.read_receipts
    }
}

/// Per-user notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub messages: bool,
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { messages: true, quiet_hours: None }
    }
}

/// The account behind a connection or request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub user_id: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    pub is_active: bool,
    pub is_blocked: bool,
    #[serde(default)]
    pub premium: PremiumStatus,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// Whether the account may open a realtime session or call the API
    pub fn can_connect(&self) -> bool {
        self.is_active && !self.is_blocked
    }
}

/// Item pushed to subscribers of the live feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
}
