// Core domain logic, free of I/O
pub mod chat;
pub mod discovery;
pub mod distance;
pub mod filters;
pub mod notify;
pub mod scoring;
pub mod swipes;
pub mod ui_config;

pub use chat::ChatError;
pub use discovery::{RecommendationResult, Recommender};
pub use distance::{calculate_bounding_box, haversine_distance, is_within_bounding_box};
pub use filters::{calculate_personality_score, matches_preferences, matches_query_constraints};
pub use notify::QuietHours;
pub use scoring::calculate_pet_score;
pub use swipes::{SwipeCommit, SwipeDecision, SwipePolicy, SwipeRejection};
pub use ui_config::{AudienceContext, UiConfigError};
