use serde::Deserialize;
use uuid::Uuid;

use crate::models::plan::Plan;

/// Gateway webhook envelope: `{ "event": "...", "payment": { ... } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBody {
    pub event: WebhookEvent,
    pub payment: Option<PaymentPayload>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum WebhookEvent {
    #[serde(rename = "PAYMENT_CONFIRMED")]
    PaymentConfirmed,
    #[serde(rename = "PAYMENT_RECEIVED")]
    PaymentReceived,
    #[serde(rename = "PAYMENT_CREATED")]
    PaymentCreated,
    #[serde(rename = "PAYMENT_OVERDUE")]
    PaymentOverdue,
    /// Events this core intentionally ignores (refund updates, transfer
    /// events, ...). Still acknowledged so the gateway stops retrying.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub id: String,
    /// Gateway id of the recurring-billing object this payment belongs
    /// to; absent for one-off charges.
    pub subscription: Option<String>,
    pub value: Option<f64>,
    pub due_date: Option<String>,
    pub external_reference: Option<String>,
}

/// Business intent behind a gateway payment, recovered from the opaque
/// `externalReference` field attached when the charge was created.
///
/// A prorated upgrade tags its one-off charge with
/// `UPGRADE|<user_id>|<plan>`; everything else (subscription cycles,
/// references carrying just the user id) is a plain renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentIntent {
    Renewal,
    UpgradeCompletion { user_id: Uuid, plan: Plan },
}

const UPGRADE_TAG: &str = "UPGRADE";

impl PaymentIntent {
    pub fn parse(external_reference: Option<&str>) -> PaymentIntent {
        let Some(reference) = external_reference else {
            return PaymentIntent::Renewal;
        };
        let mut parts = reference.split('|');
        if parts.next() != Some(UPGRADE_TAG) {
            return PaymentIntent::Renewal;
        }
        match (
            parts.next().and_then(|s| Uuid::parse_str(s).ok()),
            parts.next().and_then(|s| s.parse::<Plan>().ok()),
        ) {
            (Some(user_id), Some(plan)) => PaymentIntent::UpgradeCompletion { user_id, plan },
            _ => PaymentIntent::Renewal,
        }
    }

    pub fn encode(&self) -> Option<String> {
        match self {
            PaymentIntent::Renewal => None,
            PaymentIntent::UpgradeCompletion { user_id, plan } => {
                Some(format!("{}|{}|{}", UPGRADE_TAG, user_id, plan))
            }
        }
    }
}
