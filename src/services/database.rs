use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::errors::BillingError;
use crate::models::{
    notification::Notification,
    referral::ReferralReward,
    subscription::Subscription,
    user::{CreateUserDto, User},
};

/// Narrow interface over the persisted record set. The billing core never
/// touches storage plumbing directly; it reads and writes rows through
/// this trait.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn create_user(&self, dto: CreateUserDto) -> Result<User, BillingError>;
    async fn get_user(&self, user_id: &Uuid) -> Result<Option<User>, BillingError>;
    async fn set_gateway_customer(
        &self,
        user_id: &Uuid,
        customer_id: &str,
    ) -> Result<(), BillingError>;

    async fn insert_subscription(&self, subscription: Subscription) -> Result<(), BillingError>;
    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), BillingError>;
    async fn get_subscription(&self, user_id: &Uuid) -> Result<Option<Subscription>, BillingError>;
    async fn get_subscription_by_gateway_ref(
        &self,
        gateway_ref: &str,
    ) -> Result<Option<Subscription>, BillingError>;

    /// Atomic insert-or-report: returns `false` without writing when a
    /// reward for the same (referrer, referred user) pair already exists.
    /// This is the idempotency boundary for referral crediting, so it must
    /// not be split into a separate check and insert.
    async fn create_referral_reward(&self, reward: ReferralReward) -> Result<bool, BillingError>;

    async fn create_notification(&self, notification: Notification) -> Result<(), BillingError>;
    async fn notifications_for_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<Notification>, BillingError>;
}

/// In-memory store. Per-key writes are serialized by the table mutexes,
/// which is what the check-then-write webhook flow relies on.
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub users: Arc<Mutex<Vec<User>>>,
    pub subscriptions: Arc<Mutex<Vec<Subscription>>>,
    pub referral_rewards: Arc<Mutex<Vec<ReferralReward>>>,
    pub notifications: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn create_user(&self, dto: CreateUserDto) -> Result<User, BillingError> {
        let mut users = self.users.lock().unwrap();

        if users.iter().any(|u| u.email == dto.email) {
            return Err(BillingError::Validation(
                "User with this email already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: dto.email,
            name: dto.name,
            cpf: dto.cpf,
            referred_by: dto.referred_by,
            gateway_customer_id: None,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: &Uuid) -> Result<Option<User>, BillingError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == *user_id).cloned())
    }

    async fn set_gateway_customer(
        &self,
        user_id: &Uuid,
        customer_id: &str,
    ) -> Result<(), BillingError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == *user_id)
            .ok_or_else(|| BillingError::Persistence(format!("User not found: {}", user_id)))?;
        user.gateway_customer_id = Some(customer_id.to_string());
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_subscription(&self, subscription: Subscription) -> Result<(), BillingError> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if subscriptions.iter().any(|s| s.user_id == subscription.user_id) {
            return Err(BillingError::Persistence(format!(
                "Subscription already exists for user {}",
                subscription.user_id
            )));
        }
        subscriptions.push(subscription);
        Ok(())
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), BillingError> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let row = subscriptions
            .iter_mut()
            .find(|s| s.user_id == subscription.user_id)
            .ok_or_else(|| {
                BillingError::Persistence(format!(
                    "Subscription not found for user {}",
                    subscription.user_id
                ))
            })?;
        *row = Subscription {
            updated_at: Utc::now(),
            ..subscription.clone()
        };
        Ok(())
    }

    async fn get_subscription(
        &self,
        user_id: &Uuid,
    ) -> Result<Option<Subscription>, BillingError> {
        let subscriptions = self.subscriptions.lock().unwrap();
        Ok(subscriptions.iter().find(|s| s.user_id == *user_id).cloned())
    }

    async fn get_subscription_by_gateway_ref(
        &self,
        gateway_ref: &str,
    ) -> Result<Option<Subscription>, BillingError> {
        let subscriptions = self.subscriptions.lock().unwrap();
        Ok(subscriptions
            .iter()
            .find(|s| s.gateway_ref.as_deref() == Some(gateway_ref))
            .cloned())
    }

    async fn create_referral_reward(&self, reward: ReferralReward) -> Result<bool, BillingError> {
        // Single lock covers the existence check and the insert, the
        // in-memory equivalent of a unique constraint on the pair.
        let mut rewards = self.referral_rewards.lock().unwrap();
        let exists = rewards.iter().any(|r| {
            r.referrer_id == reward.referrer_id && r.referred_user_id == reward.referred_user_id
        });
        if exists {
            return Ok(false);
        }
        rewards.push(reward);
        Ok(true)
    }

    async fn create_notification(&self, notification: Notification) -> Result<(), BillingError> {
        let mut notifications = self.notifications.lock().unwrap();
        notifications.push(notification);
        Ok(())
    }

    async fn notifications_for_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<Notification>, BillingError> {
        let notifications = self.notifications.lock().unwrap();
        Ok(notifications
            .iter()
            .filter(|n| n.user_id == *user_id)
            .cloned()
            .collect())
    }
}
