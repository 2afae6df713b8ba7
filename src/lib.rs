//! PawfectMatch - realtime chat, presence and matching backend for the PawfectMatch pet app
//!
//! Pets are ranked for the swipe deck, mutual likes become matches, and
//! matched owners chat over a websocket hub with presence and typing state.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{distance::{calculate_bounding_box, haversine_distance}, Recommender};
pub use models::{DiscoveryPreferences, Match, Message, PetProfile, ScoredPet};
pub use realtime::{Hub, Room, ServerEvent};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let bbox = calculate_bounding_box(52.52, 13.40, 10.0);
        assert!(bbox.min_lat < 52.52);
        assert_eq!(Room::Feed.to_string(), "feed");
    }
}
