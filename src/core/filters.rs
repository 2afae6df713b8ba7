use crate::models::{CandidateQuery, DiscoveryPreferences, PetProfile};

fn allows(preferred: &[String], value: &str) -> bool {
    preferred.is_empty() || preferred.iter().any(|p| p.eq_ignore_ascii_case(value))
}

/// Hard preference filter applied after the candidate query
#[inline]
pub fn matches_preferences(pet: &PetProfile, preferences: &DiscoveryPreferences) -> bool {
    if !pet.is_active {
        return false;
    }

    if pet.owner_id == preferences.user_id {
        return false;
    }

    if !allows(&preferences.species, &pet.species)
        || !allows(&preferences.sizes, &pet.size)
        || !allows(&preferences.intents, &pet.intent)
    {
        return false;
    }

    pet.age_years >= preferences.min_age && pet.age_years <= preferences.max_age
}

/// Soft preference alignment in 0..=1 plus the overlapping personality tags
///
/// Each shared tag adds a fifth of the score, capped at five. Without
/// preferred tags every pet is neutral (0.5).
#[inline]
pub fn calculate_personality_score(
    pet: &PetProfile,
    preferences: &DiscoveryPreferences,
) -> (f64, Vec<String>) {
    if preferences.preferred_tags.is_empty() {
        return (0.5, Vec::new());
    }

    let shared: Vec<String> = pet
        .personality_tags
        .iter()
        .filter(|tag| allows(&preferences.preferred_tags, tag))
        .cloned()
        .collect();

    let score = (shared.len().min(5) as f64) / 5.0;
    (score, shared)
}

/// Same constraints the database query applies, re-checked in memory
#[inline]
pub fn matches_query_constraints(pet: &PetProfile, query: &CandidateQuery) -> bool {
    if !super::distance::is_within_bounding_box(pet.latitude, pet.longitude, &query.bounding_box) {
        return false;
    }

    if pet.owner_id == query.exclude_owner_id || query.exclude_pet_ids.contains(&pet.pet_id) {
        return false;
    }

    if pet.age_years < query.min_age || pet.age_years > query.max_age {
        return false;
    }

    allows(&query.species, &pet.species)
        && allows(&query.sizes, &pet.size)
        && allows(&query.intents, &pet.intent)
}
