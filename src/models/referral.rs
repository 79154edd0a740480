use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const REFERRAL_REWARD_DAYS: i64 = 30;

/// One reward per (referrer, referred user) pair, created at most once.
/// Uniqueness on the pair is enforced by the store at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralReward {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referred_user_id: Uuid,
    pub reward_days: i64,
    pub granted: bool,
    pub confirmed_at: DateTime<Utc>,
}

impl ReferralReward {
    pub fn new(referrer_id: Uuid, referred_user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            referrer_id,
            referred_user_id,
            reward_days: REFERRAL_REWARD_DAYS,
            granted: true,
            confirmed_at: Utc::now(),
        }
    }
}
