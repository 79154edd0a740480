use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// Brazilian tax id, required by the gateway before checkout.
    pub cpf: Option<String>,
    /// Referrer user id, set at sign-up when the user came in through a
    /// referral link.
    pub referred_by: Option<Uuid>,
    /// Customer id at the payment gateway, memoized on first checkout.
    pub gateway_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserDto {
    pub email: String,
    pub name: String,
    pub cpf: Option<String>,
    pub referred_by: Option<Uuid>,
}
