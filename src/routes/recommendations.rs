use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::error::ApiError;
use crate::models::{RecommendationsQuery, RecommendationsResponse};
use crate::routes::AppState;
use crate::services::AuthenticatedUser;

/// Candidates fetched per requested result
const CANDIDATE_OVERSAMPLE: usize = 5;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/recommendations", web::get().to(recommendations));
}

/// Swipe deck for the caller
///
/// GET /api/v1/recommendations?latitude&longitude&maxDistanceKm&species&sizes&intents&tags&minAge&maxAge&excludePetIds&limit
async fn recommendations(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<RecommendationsQuery>,
) -> Result<HttpResponse, ApiError> {
    query.validate()?;

    let discovery = &state.settings.discovery;
    let limit = query
        .limit
        .map(usize::from)
        .unwrap_or(discovery.default_limit)
        .clamp(1, discovery.max_limit.max(1));
    let preferences = query.to_preferences(&user.user_id);

    let candidate_query = state
        .recommender
        .candidate_query(&preferences, query.excluded_pets(), limit * CANDIDATE_OVERSAMPLE);
    let candidates = state.db.find_candidates(&candidate_query).await?;

    tracing::debug!(user_id = %user.user_id, candidates = candidates.len(), "Ranking recommendations");

    let result = state
        .recommender
        .recommend(&preferences, &candidate_query, candidates, limit);

    tracing::info!(
        user_id = %user.user_id,
        returned = result.pets.len(),
        total_candidates = result.total_candidates,
        "Recommendations served"
    );

    Ok(HttpResponse::Ok().json(RecommendationsResponse {
        pets: result.pets,
        total_candidates: result.total_candidates,
    }))
}
