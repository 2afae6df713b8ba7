use crate::core::{
    distance::calculate_bounding_box,
    filters::{matches_preferences, matches_query_constraints},
    scoring::calculate_pet_score,
};
use crate::models::{CandidateQuery, DiscoveryPreferences, DiscoveryWeights, PetProfile, ScoredPet};
use uuid::Uuid;

/// Result of ranking a candidate batch
#[derive(Debug)]
pub struct RecommendationResult {
    pub pets: Vec<ScoredPet>,
    pub total_candidates: usize,
}

/// Ranks candidate pets for the swipe deck
///
/// # Pipeline Stages
/// 1. Bounding box and query constraints
/// 2. Hard preference filter
/// 3. Exact radius check and scoring
/// 4. Sort by score, then distance
#[derive(Debug, Clone)]
pub struct Recommender {
    weights: DiscoveryWeights,
    min_score: f64,
}

impl Recommender {
    pub fn new(weights: DiscoveryWeights, min_score: f64) -> Self {
        Self { weights, min_score }
    }

    pub fn with_default_weights() -> Self {
        Self::new(DiscoveryWeights::default(), 5.0)
    }

    /// Build the query used to fetch candidates from storage
    pub fn candidate_query(
        &self,
        preferences: &DiscoveryPreferences,
        exclude_pet_ids: Vec<Uuid>,
        limit: usize,
    ) -> CandidateQuery {
        CandidateQuery {
            bounding_box: calculate_bounding_box(
                preferences.latitude,
                preferences.longitude,
                preferences.max_distance_km as f64,
            ),
            species: preferences.species.clone(),
            sizes: preferences.sizes.clone(),
            intents: preferences.intents.clone(),
            min_age: preferences.min_age,
            max_age: preferences.max_age,
            exclude_owner_id: preferences.user_id.clone(),
            exclude_pet_ids,
            limit,
        }
    }

    pub fn recommend(
        &self,
        preferences: &DiscoveryPreferences,
        query: &CandidateQuery,
        candidates: Vec<PetProfile>,
        limit: usize,
    ) -> RecommendationResult {
        let total_candidates = candidates.len();
        let max_distance = preferences.max_distance_km as f64;

        let mut scored: Vec<ScoredPet> = candidates
            .into_iter()
            .filter(|pet| matches_query_constraints(pet, query))
            .filter(|pet| matches_preferences(pet, preferences))
            .filter_map(|pet| {
                let (score, distance_km, shared_tags) =
                    calculate_pet_score(&pet, preferences, &self.weights);

                // bounding box corners lie outside the radius
                if distance_km > max_distance || score < self.min_score {
                    return None;
                }

                Some(ScoredPet {
                    pet_id: pet.pet_id,
                    owner_id: pet.owner_id,
                    name: pet.name,
                    species: pet.species,
                    breed: pet.breed,
                    age_years: pet.age_years,
                    size: pet.size,
                    intent: pet.intent,
                    distance_km,
                    match_score: score,
                    shared_tags,
                    is_verified: pet.is_verified,
                    photo_urls: pet.photo_urls,
                    description: pet.description,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.match_score
                .partial_cmp(&a.match_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.distance_km
                        .partial_cmp(&b.distance_km)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        scored.truncate(limit);

        RecommendationResult {
            pets: scored,
            total_candidates,
        }
    }
}

impl Default for Recommender {
    fn default() -> Self {
        Self::with_default_weights()
    }
}
