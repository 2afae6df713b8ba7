use crate::core::{distance::haversine_distance, filters::calculate_personality_score};
use crate::models::{DiscoveryPreferences, DiscoveryWeights, PetProfile};

/// Score (0-100) of a pet for the requesting user
///
/// score = 100 * (
///     distance_score * w.distance +
///     age_score * w.age +
///     personality_score * w.personality +
///     verified * w.verified +
///     intent_score * w.intent
/// )
///
/// Returns the score, the distance in km and the shared personality tags.
pub fn calculate_pet_score(
    pet: &PetProfile,
    preferences: &DiscoveryPreferences,
    weights: &DiscoveryWeights,
) -> (f64, f64, Vec<String>) {
    let distance_km = haversine_distance(
        preferences.latitude,
        preferences.longitude,
        pet.latitude,
        pet.longitude,
    );

    let distance_score = calculate_distance_score(distance_km, preferences.max_distance_km);
    let age_score = calculate_age_score(pet.age_years, preferences.min_age, preferences.max_age);
    let (personality_score, shared_tags) = calculate_personality_score(pet, preferences);
    let verified_score = if pet.is_verified { 1.0 } else { 0.0 };
    let intent_score = calculate_intent_score(&pet.intent, &preferences.intents);

    let total = (distance_score * weights.distance
        + age_score * weights.age
        + personality_score * weights.personality
        + verified_score * weights.verified
        + intent_score * weights.intent)
        * 100.0;

    (total.clamp(0.0, 100.0), distance_km, shared_tags)
}

/// Exponential decay over the search radius, zero at or beyond it
#[inline]
pub(crate) fn calculate_distance_score(distance_km: f64, max_distance_km: u16) -> f64 {
    let max = max_distance_km as f64;
    if max <= 0.0 || distance_km >= max {
        return 0.0;
    }
    (-distance_km / (max * 0.5)).exp()
}

/// 1.0 in the middle of the preferred range, falling to 0 at its edges
#[inline]
pub(crate) fn calculate_age_score(age: u8, min_age: u8, max_age: u8) -> f64 {
    if max_age <= min_age {
        return 1.0;
    }
    let mid = (min_age as f64 + max_age as f64) / 2.0;
    let half_range = (max_age - min_age) as f64 / 2.0;
    1.0 - ((age as f64 - mid).abs() / half_range).min(1.0)
}

#[inline]
fn calculate_intent_score(intent: &str, preferred: &[String]) -> f64 {
    if preferred.is_empty() {
        0.5
    } else if preferred.iter().any(|p| p.eq_ignore_ascii_case(intent)) {
        1.0
    } else {
        0.0
    }
}
