use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::BillingError;
use crate::models::{
    notification::{Notification, NotificationKind},
    referral::{ReferralReward, REFERRAL_REWARD_DAYS},
    subscription::SubscriptionStatus,
};
use crate::services::asaas::{BillingGateway, SubscriptionUpdate};
use crate::services::billing_period::{extend_by_days, renewal_base};
use crate::services::database::SubscriptionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSkipReason {
    NoReferrer,
    AlreadyGranted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantOutcome {
    pub granted: bool,
    pub reason: Option<GrantSkipReason>,
}

impl GrantOutcome {
    fn granted() -> Self {
        Self {
            granted: true,
            reason: None,
        }
    }

    fn skipped(reason: GrantSkipReason) -> Self {
        Self {
            granted: false,
            reason: Some(reason),
        }
    }
}

/// Grants the referrer a 30-day extension when a referral's qualifying
/// payment is confirmed, at most once per (referrer, referred) pair.
#[derive(Clone)]
pub struct ReferralCreditEngine {
    store: Arc<dyn SubscriptionStore>,
    gateway: Arc<dyn BillingGateway>,
}

impl ReferralCreditEngine {
    pub fn new(store: Arc<dyn SubscriptionStore>, gateway: Arc<dyn BillingGateway>) -> Self {
        Self { store, gateway }
    }

    pub async fn grant_if_eligible(
        &self,
        referred_user_id: &Uuid,
    ) -> Result<GrantOutcome, BillingError> {
        let user = self
            .store
            .get_user(referred_user_id)
            .await?
            .ok_or_else(|| {
                BillingError::Persistence(format!("Referred user not found: {}", referred_user_id))
            })?;

        let Some(referrer_id) = user.referred_by else {
            return Ok(GrantOutcome::skipped(GrantSkipReason::NoReferrer));
        };

        let mut referrer_sub = self
            .store
            .get_subscription(&referrer_id)
            .await?
            .ok_or_else(|| {
                BillingError::Persistence(format!(
                    "Referrer {} has no subscription row",
                    referrer_id
                ))
            })?;

        // The insert is the idempotency gate: whoever lands the row grants
        // the extension, everyone else backs off.
        let inserted = self
            .store
            .create_referral_reward(ReferralReward::new(referrer_id, *referred_user_id))
            .await?;
        if !inserted {
            log::info!(
                "Referral reward for ({}, {}) already granted",
                referrer_id,
                referred_user_id
            );
            return Ok(GrantOutcome::skipped(GrantSkipReason::AlreadyGranted));
        }

        let now = Utc::now();
        let new_end = extend_by_days(
            renewal_base(referrer_sub.current_period_end, now),
            REFERRAL_REWARD_DAYS,
        );
        referrer_sub.current_period_end = Some(new_end);
        referrer_sub.status = SubscriptionStatus::Active;
        self.store.update_subscription(&referrer_sub).await?;

        // Best effort: push the next gateway charge out to the new period
        // end. Local state stays the source of truth for access.
        if let Some(gateway_ref) = &referrer_sub.gateway_ref {
            let update = SubscriptionUpdate {
                next_due_date: Some(new_end.date_naive()),
                ..Default::default()
            };
            if let Err(e) = self.gateway.update_subscription(gateway_ref, &update).await {
                log::warn!(
                    "Could not defer billing for referrer {}: {}",
                    referrer_id,
                    e
                );
            }
        }

        let notification = Notification::new(
            referrer_id,
            NotificationKind::Success,
            "🎉 Você ganhou 1 mês grátis!",
            format!(
                "Parabéns! Um amigo que você indicou assinou. Sua próxima cobrança foi adiada para {}.",
                new_end.format("%d/%m/%Y")
            ),
        );
        if let Err(e) = self.store.create_notification(notification).await {
            log::warn!("Could not notify referrer {}: {}", referrer_id, e);
        }

        log::info!(
            "Referral reward granted to {} for referring {}",
            referrer_id,
            referred_user_id
        );
        Ok(GrantOutcome::granted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plan::Plan;
    use crate::models::subscription::Subscription;
    use crate::models::user::CreateUserDto;
    use crate::services::database::MemoryStore;
    use crate::services::test_support::{GatewayCall, MockGateway};
    use chrono::{DateTime, Duration};

    struct Fixture {
        store: Arc<MemoryStore>,
        gateway: Arc<MockGateway>,
        engine: ReferralCreditEngine,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        let engine = ReferralCreditEngine::new(store.clone(), gateway.clone());
        Fixture {
            store,
            gateway,
            engine,
        }
    }

    async fn seed_user(store: &MemoryStore, email: &str, referred_by: Option<Uuid>) -> Uuid {
        let user = store
            .create_user(CreateUserDto {
                email: email.to_string(),
                name: "Test".to_string(),
                cpf: Some("52998224725".to_string()),
                referred_by,
            })
            .await
            .unwrap();
        user.id
    }

    async fn seed_active_sub(
        store: &MemoryStore,
        user_id: Uuid,
        gateway_ref: Option<&str>,
        period_end: Option<DateTime<Utc>>,
    ) {
        let mut sub = Subscription::pending(
            user_id,
            Plan::Light,
            gateway_ref.unwrap_or("unused").to_string(),
        );
        sub.gateway_ref = gateway_ref.map(|s| s.to_string());
        sub.status = SubscriptionStatus::Active;
        sub.current_period_end = period_end;
        store.insert_subscription(sub).await.unwrap();
    }

    #[actix_rt::test]
    async fn user_without_referrer_is_skipped() {
        let f = fixture();
        let user_id = seed_user(&f.store, "solo@test.com", None).await;

        let outcome = f.engine.grant_if_eligible(&user_id).await.unwrap();
        assert!(!outcome.granted);
        assert_eq!(outcome.reason, Some(GrantSkipReason::NoReferrer));
        assert!(f.gateway.calls().is_empty());
    }

    #[actix_rt::test]
    async fn grant_extends_referrer_from_future_period_end() {
        let f = fixture();
        let referrer = seed_user(&f.store, "a@test.com", None).await;
        let referred = seed_user(&f.store, "b@test.com", Some(referrer)).await;

        let end = Utc::now() + Duration::days(10);
        seed_active_sub(&f.store, referrer, Some("sub_ref"), Some(end)).await;
        seed_active_sub(&f.store, referred, None, None).await;

        let outcome = f.engine.grant_if_eligible(&referred).await.unwrap();
        assert!(outcome.granted);

        let sub = f.store.get_subscription(&referrer).await.unwrap().unwrap();
        assert_eq!(sub.current_period_end, Some(end + Duration::days(30)));
        assert_eq!(sub.status, SubscriptionStatus::Active);

        // billing deferred to the new period end
        let calls = f.gateway.calls();
        assert!(calls.iter().any(|c| matches!(
            c,
            GatewayCall::UpdateSubscription { id, next_due_date, .. }
                if id == "sub_ref" && *next_due_date == Some((end + Duration::days(30)).date_naive())
        )));

        let notifications = f.store.notifications_for_user(&referrer).await.unwrap();
        assert_eq!(notifications.len(), 1);
    }

    #[actix_rt::test]
    async fn grant_resets_base_for_expired_referrer() {
        let f = fixture();
        let referrer = seed_user(&f.store, "a@test.com", None).await;
        let referred = seed_user(&f.store, "b@test.com", Some(referrer)).await;

        seed_active_sub(
            &f.store,
            referrer,
            None,
            Some(Utc::now() - Duration::days(5)),
        )
        .await;

        let before = Utc::now();
        f.engine.grant_if_eligible(&referred).await.unwrap();

        let sub = f.store.get_subscription(&referrer).await.unwrap().unwrap();
        let new_end = sub.current_period_end.unwrap();
        assert!(new_end >= before + Duration::days(30));
        assert!(new_end <= Utc::now() + Duration::days(30));
    }

    #[actix_rt::test]
    async fn second_grant_for_same_pair_is_refused() {
        let f = fixture();
        let referrer = seed_user(&f.store, "a@test.com", None).await;
        let referred = seed_user(&f.store, "b@test.com", Some(referrer)).await;

        let end = Utc::now() + Duration::days(10);
        seed_active_sub(&f.store, referrer, None, Some(end)).await;

        let first = f.engine.grant_if_eligible(&referred).await.unwrap();
        let second = f.engine.grant_if_eligible(&referred).await.unwrap();

        assert!(first.granted);
        assert!(!second.granted);
        assert_eq!(second.reason, Some(GrantSkipReason::AlreadyGranted));

        // period end moved exactly once
        let sub = f.store.get_subscription(&referrer).await.unwrap().unwrap();
        assert_eq!(sub.current_period_end, Some(end + Duration::days(30)));
    }

    #[actix_rt::test]
    async fn gateway_deferral_failure_does_not_void_the_grant() {
        let f = fixture();
        f.gateway
            .fail_update
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let referrer = seed_user(&f.store, "a@test.com", None).await;
        let referred = seed_user(&f.store, "b@test.com", Some(referrer)).await;
        seed_active_sub(&f.store, referrer, Some("sub_ref"), None).await;

        let outcome = f.engine.grant_if_eligible(&referred).await.unwrap();
        assert!(outcome.granted);
        assert!(f
            .store
            .get_subscription(&referrer)
            .await
            .unwrap()
            .unwrap()
            .current_period_end
            .is_some());
    }
}
