use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::errors::BillingError;
use crate::models::{
    notification::Notification,
    referral::ReferralReward,
    subscription::Subscription,
    user::{CreateUserDto, User},
};
use crate::services::asaas::{
    BillingGateway, CreateChargeRequest, CreateCustomerRequest, CreateSubscriptionRequest,
    GatewayCharge, GatewaySubscription, SubscriptionUpdate,
};
use crate::services::database::{MemoryStore, SubscriptionStore};

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    FindOrCreateCustomer {
        email: String,
    },
    CreateSubscription {
        value: f64,
        external_reference: String,
    },
    UpdateSubscription {
        id: String,
        value: Option<f64>,
        next_due_date: Option<NaiveDate>,
    },
    CancelSubscription {
        id: String,
    },
    CreateCharge {
        value: f64,
        external_reference: String,
    },
    PendingPaymentUrl {
        id: String,
    },
}

/// Records every gateway call and hands back canned responses.
#[derive(Default)]
pub struct MockGateway {
    pub calls: Mutex<Vec<GatewayCall>>,
    /// What `get_subscription` reports for its own id; `None` means the
    /// gateway does not know the subscription.
    pub remote_subscription: Mutex<Option<GatewaySubscription>>,
    pub pending_url: Mutex<Option<String>>,
    pub fail_cancel: AtomicBool,
    pub fail_update: AtomicBool,
    counter: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote_subscription(remote: GatewaySubscription) -> Self {
        let gateway = Self::default();
        *gateway.remote_subscription.lock().unwrap() = Some(remote);
        gateway
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_id(&self) -> usize {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Store wrapper that can refuse subscription writes on demand, for
/// exercising the persistence-failure paths. Everything else delegates to
/// the wrapped [`MemoryStore`].
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_subscription_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_write(&self) -> Result<(), BillingError> {
        if self.fail_subscription_writes.load(Ordering::SeqCst) {
            return Err(BillingError::Persistence("write refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for FlakyStore {
    async fn create_user(&self, dto: CreateUserDto) -> Result<User, BillingError> {
        self.inner.create_user(dto).await
    }

    async fn get_user(&self, user_id: &Uuid) -> Result<Option<User>, BillingError> {
        self.inner.get_user(user_id).await
    }

    async fn set_gateway_customer(
        &self,
        user_id: &Uuid,
        customer_id: &str,
    ) -> Result<(), BillingError> {
        self.inner.set_gateway_customer(user_id, customer_id).await
    }

    async fn insert_subscription(&self, subscription: Subscription) -> Result<(), BillingError> {
        self.check_write()?;
        self.inner.insert_subscription(subscription).await
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), BillingError> {
        self.check_write()?;
        self.inner.update_subscription(subscription).await
    }

    async fn get_subscription(
        &self,
        user_id: &Uuid,
    ) -> Result<Option<Subscription>, BillingError> {
        self.inner.get_subscription(user_id).await
    }

    async fn get_subscription_by_gateway_ref(
        &self,
        gateway_ref: &str,
    ) -> Result<Option<Subscription>, BillingError> {
        self.inner.get_subscription_by_gateway_ref(gateway_ref).await
    }

    async fn create_referral_reward(&self, reward: ReferralReward) -> Result<bool, BillingError> {
        self.inner.create_referral_reward(reward).await
    }

    async fn create_notification(&self, notification: Notification) -> Result<(), BillingError> {
        self.inner.create_notification(notification).await
    }

    async fn notifications_for_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<Notification>, BillingError> {
        self.inner.notifications_for_user(user_id).await
    }
}

/// An active credit-card subscription as the gateway would report it.
pub fn live_card_subscription(id: &str, value: f64) -> GatewaySubscription {
    GatewaySubscription {
        id: id.to_string(),
        status: "ACTIVE".to_string(),
        billing_type: Some(crate::models::subscription::BillingMethod::CreditCard),
        value: Some(value),
        invoice_url: None,
        bank_slip_url: None,
    }
}

#[async_trait]
impl BillingGateway for MockGateway {
    async fn find_or_create_customer(
        &self,
        req: &CreateCustomerRequest,
    ) -> Result<String, BillingError> {
        self.record(GatewayCall::FindOrCreateCustomer {
            email: req.email.clone(),
        });
        Ok(format!("cus_{}", self.next_id()))
    }

    async fn create_subscription(
        &self,
        req: &CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription, BillingError> {
        self.record(GatewayCall::CreateSubscription {
            value: req.value,
            external_reference: req.external_reference.clone(),
        });
        let n = self.next_id();
        Ok(GatewaySubscription {
            id: format!("sub_{}", n),
            status: "ACTIVE".to_string(),
            billing_type: Some(req.billing_method),
            value: Some(req.value),
            invoice_url: Some(format!("https://pay.test/invoice/{}", n)),
            bank_slip_url: None,
        })
    }

    async fn get_subscription(
        &self,
        id: &str,
    ) -> Result<Option<GatewaySubscription>, BillingError> {
        let remote = self.remote_subscription.lock().unwrap();
        Ok(remote.as_ref().filter(|r| r.id == id).cloned())
    }

    async fn update_subscription(
        &self,
        id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<(), BillingError> {
        self.record(GatewayCall::UpdateSubscription {
            id: id.to_string(),
            value: update.value,
            next_due_date: update.next_due_date,
        });
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(BillingError::Gateway("update refused".to_string()));
        }
        Ok(())
    }

    async fn cancel_subscription(&self, id: &str) -> Result<(), BillingError> {
        self.record(GatewayCall::CancelSubscription { id: id.to_string() });
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(BillingError::Gateway("cancel refused".to_string()));
        }
        Ok(())
    }

    async fn create_charge(
        &self,
        req: &CreateChargeRequest,
    ) -> Result<GatewayCharge, BillingError> {
        self.record(GatewayCall::CreateCharge {
            value: req.value,
            external_reference: req.external_reference.clone(),
        });
        let n = self.next_id();
        Ok(GatewayCharge {
            id: format!("pay_{}", n),
            invoice_url: Some(format!("https://pay.test/charge/{}", n)),
            bank_slip_url: None,
        })
    }

    async fn pending_payment_url(
        &self,
        subscription_id: &str,
    ) -> Result<Option<String>, BillingError> {
        self.record(GatewayCall::PendingPaymentUrl {
            id: subscription_id.to_string(),
        });
        Ok(self.pending_url.lock().unwrap().clone())
    }
}
