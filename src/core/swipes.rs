use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{SwipeAction, UserAccount};

/// Why a swipe was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwipeRejection {
    #[error("Daily swipe limit reached ({limit}/day). Upgrade to premium for unlimited swipes.")]
    LimitExceeded { limit: u32, used_today: u32 },

    #[error("No Super Likes remaining. Purchase more from the Premium screen.")]
    InsufficientSuperLikes { balance: i32 },

    #[error("You cannot swipe on your own pet")]
    OwnPet,
}

impl SwipeRejection {
    pub fn code(&self) -> &'static str {
        match self {
            SwipeRejection::LimitExceeded { .. } => "SWIPE_LIMIT_EXCEEDED",
            SwipeRejection::InsufficientSuperLikes { .. } => "SUPERLIKE_INSUFFICIENT_BALANCE",
            SwipeRejection::OwnPet => "OWN_PET",
        }
    }
}

/// What accepting a swipe costs the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwipeDecision {
    /// One purchased superlike is deducted
    pub consumes_super_like: bool,
    /// Daily cap re-checked when the swipe is stored; `None` is unlimited
    pub daily_limit: Option<u32>,
}

/// What storage reported after re-checking the quota under the user's row lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeCommit {
    Recorded,
    LimitReached { used_today: u32 },
    NoSuperLikes,
}

impl SwipeCommit {
    /// Turn a lost race into the rejection the client would have got up front
    pub fn check(self, decision: &SwipeDecision) -> Result<(), SwipeRejection> {
        match self {
            SwipeCommit::Recorded => Ok(()),
            SwipeCommit::LimitReached { used_today } => Err(SwipeRejection::LimitExceeded {
                limit: decision.daily_limit.unwrap_or(used_today),
                used_today,
            }),
            SwipeCommit::NoSuperLikes => Err(SwipeRejection::InsufficientSuperLikes { balance: 0 }),
        }
    }
}

/// Quota rules for swiping
#[derive(Debug, Clone, Copy)]
pub struct SwipePolicy {
    free_daily_limit: u32,
}

impl SwipePolicy {
    pub fn new(free_daily_limit: u32) -> Self {
        Self { free_daily_limit }
    }

    pub fn free_daily_limit(&self) -> u32 {
        self.free_daily_limit
    }

    /// Decide whether `account` may perform `action` on a pet owned by `pet_owner`
    ///
    /// `swipes_today` counts every swipe since the start of the current UTC day.
    pub fn evaluate(
        &self,
        account: &UserAccount,
        pet_owner: &str,
        action: SwipeAction,
        swipes_today: u32,
        now: DateTime<Utc>,
    ) -> Result<SwipeDecision, SwipeRejection> {
        if account.user_id == pet_owner {
            return Err(SwipeRejection::OwnPet);
        }

        let premium = &account.premium;
        let is_premium = premium.is_current(now);

        let daily_limit = (!is_premium && !premium.unlimited_likes).then_some(self.free_daily_limit);
        if let Some(limit) = daily_limit {
            if swipes_today >= limit {
                return Err(SwipeRejection::LimitExceeded {
                    limit,
                    used_today: swipes_today,
                });
            }
        }

        if action != SwipeAction::Superlike || (is_premium && premium.unlimited_likes) {
            return Ok(SwipeDecision {
                consumes_super_like: false,
                daily_limit,
            });
        }

        if premium.iap_super_likes <= 0 {
            return Err(SwipeRejection::InsufficientSuperLikes {
                balance: premium.iap_super_likes.max(0),
            });
        }

        Ok(SwipeDecision {
            consumes_super_like: true,
            daily_limit,
        })
    }
}

impl Default for SwipePolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Midnight UTC of the day containing `now`
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}
