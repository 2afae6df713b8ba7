use actix_web::{web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::core::swipes::start_of_day;
use crate::error::ApiError;
use crate::models::{Match, MatchStatus, PetProfile, SwipeAction, SwipeRequest, SwipeResponse, UserMatchActions};
use crate::realtime::ServerEvent;
use crate::routes::AppState;
use crate::services::AuthenticatedUser;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/swipes", web::post().to(swipe));
}

/// Record a swipe
///
/// POST /api/v1/swipes
///
/// Request body:
/// ```json
/// {
///   "petId": "uuid",
///   "action": "like|pass|superlike"
/// }
/// ```
async fn swipe(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<SwipeRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;
    let action: SwipeAction = req.action.parse().map_err(ApiError::bad_request)?;

    let pet = state
        .db
        .get_pet(req.pet_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("Pet not found"))?;

    let now = Utc::now();
    let swipes_today = state.db.count_swipes_since(&user.user_id, start_of_day(now)).await?;
    let decision = state
        .swipe_policy
        .evaluate(&user.account, &pet.owner_id, action, swipes_today, now)
        .map_err(|rejection| {
            tracing::info!(user_id = %user.user_id, code = rejection.code(), "Swipe rejected");
            rejection
        })?;

    // a concurrent request may have used the last free swipe or superlike
    state
        .db
        .commit_swipe(
            &user.user_id,
            pet.pet_id,
            action,
            now,
            start_of_day(now),
            decision.daily_limit,
            decision.consumes_super_like,
        )
        .await?
        .check(&decision)
        .map_err(|rejection| {
            tracing::info!(user_id = %user.user_id, code = rejection.code(), "Swipe lost a quota race");
            rejection
        })?;

    if decision.consumes_super_like {
        state.accounts.invalidate(&user.user_id).await;
    }

    let match_id = if action.is_positive() {
        complete_match(&state, &user.user_id, &pet).await?
    } else {
        None
    };

    tracing::info!(
        user_id = %user.user_id,
        pet_id = %pet.pet_id,
        action = %action,
        match_created = match_id.is_some(),
        "Swipe recorded"
    );

    Ok(HttpResponse::Ok().json(SwipeResponse {
        action,
        pet_id: pet.pet_id,
        match_created: match_id.is_some(),
        match_id,
    }))
}

/// Create the match when the pet's owner already liked one of the swiper's pets
async fn complete_match(state: &AppState, swiper_id: &str, target: &PetProfile) -> Result<Option<Uuid>, ApiError> {
    let Some(liked_pet) = state.db.find_reciprocal_like(&target.owner_id, swiper_id, target.pet_id).await? else {
        return Ok(None);
    };

    let now = Utc::now();
    let new_match = Match {
        id: Uuid::new_v4(),
        user1_id: swiper_id.to_string(),
        user2_id: target.owner_id.clone(),
        pet1_id: liked_pet,
        pet2_id: target.pet_id,
        initiated_by: swiper_id.to_string(),
        status: MatchStatus::Active,
        user1_actions: UserMatchActions::default(),
        user2_actions: UserMatchActions::default(),
        created_at: now,
        last_activity: now,
        last_message_at: None,
    };

    if !state.db.create_match(&new_match).await? {
        tracing::debug!(pet1 = %liked_pet, pet2 = %target.pet_id, "Pets already matched");
        return Ok(None);
    }

    state.hub.emit_to_user(
        swiper_id,
        &ServerEvent::NewMatch {
            match_id: new_match.id,
            pet_id: liked_pet,
            other_pet_id: target.pet_id,
            other_user_id: target.owner_id.clone(),
        },
    );
    state.hub.emit_to_user(
        &target.owner_id,
        &ServerEvent::NewMatch {
            match_id: new_match.id,
            pet_id: target.pet_id,
            other_pet_id: liked_pet,
            other_user_id: swiper_id.to_string(),
        },
    );

    Ok(Some(new_match.id))
}
