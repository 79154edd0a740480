use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::plan::Plan;

pub const TRIAL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Trial,
    Pending,
    Active,
    Overdue,
    /// Terminal. No gateway event or endpoint produces this; it is set
    /// administratively, straight in the store. Re-subscribing from it
    /// goes through a fresh checkout into `Pending`.
    Canceled,
}

/// One subscription row per user. Never hard-deleted: cancellation is a
/// status transition. `current_period_end` marks the end of paid access
/// and only moves forward; `last_payment_id` records the most recently
/// applied gateway payment so redelivered webhooks are no-ops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: Uuid,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub gateway_ref: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub last_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// The row created at first sign-in.
    pub fn trial(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            plan: Plan::Trial,
            status: SubscriptionStatus::Trial,
            gateway_ref: None,
            current_period_end: Some(now + Duration::days(TRIAL_DAYS)),
            last_payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A fresh checkout awaiting its first confirmed payment.
    pub fn pending(user_id: Uuid, plan: Plan, gateway_ref: String) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            plan,
            status: SubscriptionStatus::Pending,
            gateway_ref: Some(gateway_ref),
            current_period_end: None,
            last_payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Billing methods supported by the gateway. `Undefined` lets the user
/// pick on the hosted invoice page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMethod {
    Boleto,
    CreditCard,
    Pix,
    #[serde(other)]
    Undefined,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub plan: Plan,
    pub billing_method: Option<BillingMethod>,
    /// When set, skip plan logic entirely and hand back the pending
    /// invoice so the user can swap the card on file.
    #[serde(default)]
    pub change_payment_method_only: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
