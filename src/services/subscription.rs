use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::errors::BillingError;
use crate::models::{
    notification::{Notification, NotificationKind},
    plan::{format_brl, Plan},
    subscription::{BillingMethod, CheckoutRequest, Subscription, SubscriptionStatus},
    user::User,
    webhook::{PaymentIntent, PaymentPayload, WebhookBody, WebhookEvent},
};
use crate::services::asaas::{
    BillingGateway, CreateChargeRequest, CreateCustomerRequest, CreateSubscriptionRequest,
    SubscriptionUpdate,
};
use crate::services::billing_period::{
    extend_by_days, next_period_end, remaining_days, renewal_base,
};
use crate::services::database::SubscriptionStore;
use crate::services::proration::{credit_extension_days, upgrade_charge, UPGRADE_CHARGE_THRESHOLD};
use crate::services::referral::ReferralCreditEngine;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutOutcome {
    /// Hosted payment page the user still has to complete; `None` when the
    /// change was applied seamlessly.
    pub payment_url: Option<String>,
    pub message: Option<String>,
}

/// Orchestrates every subscription state transition. Checkout requests and
/// gateway webhooks enter here; plan/status/period-end mutations leave
/// through the store, side effects through the gateway and notifications.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    gateway: Arc<dyn BillingGateway>,
    referral: ReferralCreditEngine,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn SubscriptionStore>, gateway: Arc<dyn BillingGateway>) -> Self {
        let referral = ReferralCreditEngine::new(store.clone(), gateway.clone());
        Self {
            store,
            gateway,
            referral,
        }
    }

    // ------------------------------------------------------------------
    // Checkout
    // ------------------------------------------------------------------

    pub async fn checkout(&self, req: CheckoutRequest) -> Result<CheckoutOutcome, BillingError> {
        let Some(price) = req.plan.price() else {
            return Err(BillingError::Validation(format!(
                "Plan '{}' cannot be purchased",
                req.plan
            )));
        };

        let user = self
            .store
            .get_user(&req.user_id)
            .await?
            .ok_or_else(|| BillingError::Validation("User not found".to_string()))?;
        if user.cpf.is_none() {
            return Err(BillingError::Validation(
                "CPF é obrigatório para criar assinatura".to_string(),
            ));
        }

        let existing = self.store.get_subscription(&req.user_id).await?;

        if req.change_payment_method_only {
            return self.change_payment_method_only(existing.as_ref()).await;
        }

        let customer_id = self.ensure_gateway_customer(&user).await?;

        // Seamless path: a live credit-card mandate can be repriced in
        // place instead of sending the user back through checkout.
        if let Some(exist) = &existing {
            if let Some(gateway_ref) = exist.gateway_ref.clone() {
                if let Some(remote) = self.gateway.get_subscription(&gateway_ref).await? {
                    if remote.is_live_card() {
                        return self
                            .seamless_plan_change(exist, &gateway_ref, &customer_id, req.plan, price)
                            .await;
                    }
                }
            }
        }

        self.fresh_gateway_subscription(&user, existing, &customer_id, &req, price)
            .await
    }

    async fn change_payment_method_only(
        &self,
        existing: Option<&Subscription>,
    ) -> Result<CheckoutOutcome, BillingError> {
        let Some(gateway_ref) = existing.and_then(|s| s.gateway_ref.as_deref()) else {
            return Err(BillingError::Validation(
                "Nenhuma assinatura para alterar o cartão.".to_string(),
            ));
        };
        match self.gateway.pending_payment_url(gateway_ref).await? {
            Some(url) => Ok(CheckoutOutcome {
                payment_url: Some(url),
                message: None,
            }),
            None => Err(BillingError::Validation(
                "Nenhuma cobrança pendente para alterar o cartão.".to_string(),
            )),
        }
    }

    async fn ensure_gateway_customer(&self, user: &User) -> Result<String, BillingError> {
        if let Some(id) = &user.gateway_customer_id {
            return Ok(id.clone());
        }
        let id = self
            .gateway
            .find_or_create_customer(&CreateCustomerRequest {
                name: user.name.clone(),
                email: user.email.clone(),
                cpf_cnpj: user.cpf.clone(),
                external_reference: user.id.to_string(),
            })
            .await?;
        self.store.set_gateway_customer(&user.id, &id).await?;
        Ok(id)
    }

    async fn seamless_plan_change(
        &self,
        exist: &Subscription,
        gateway_ref: &str,
        customer_id: &str,
        new_plan: Plan,
        new_price: f64,
    ) -> Result<CheckoutOutcome, BillingError> {
        let now = Utc::now();
        let current_price = exist.plan.price().unwrap_or(0.0);

        if new_price > current_price {
            let difference =
                upgrade_charge(current_price, new_price, exist.current_period_end, now);
            if difference >= UPGRADE_CHARGE_THRESHOLD {
                // Collect the prorated difference first; the plan only
                // switches when the charge's webhook confirms. Otherwise a
                // failed payment would hand out a free upgrade.
                let intent = PaymentIntent::UpgradeCompletion {
                    user_id: exist.user_id,
                    plan: new_plan,
                };
                let charge = self
                    .gateway
                    .create_charge(&CreateChargeRequest {
                        customer: customer_id.to_string(),
                        billing_method: BillingMethod::CreditCard,
                        value: difference,
                        due_date: now.date_naive(),
                        description: format!(
                            "Upgrade para {} (Proporcional)",
                            new_plan.display_name()
                        ),
                        external_reference: intent.encode().unwrap_or_default(),
                    })
                    .await?;
                log::info!(
                    "Prorated upgrade charge of {} issued for user {}",
                    format_brl(difference),
                    exist.user_id
                );
                return Ok(CheckoutOutcome {
                    payment_url: charge.payment_url(),
                    message: Some(format!(
                        "Para concluir o upgrade, pague a diferença de {}.",
                        format_brl(difference)
                    )),
                });
            }
        }

        self.gateway
            .update_subscription(
                gateway_ref,
                &SubscriptionUpdate {
                    value: Some(new_price),
                    description: Some(format!("Assinatura {}", new_plan.display_name())),
                    update_pending_payments: true,
                    ..Default::default()
                },
            )
            .await?;

        if new_price < current_price {
            // Downgrade: future cycles bill the lower amount, but paid
            // access keeps the old plan until the next confirmed payment.
            log::info!(
                "Downgrade for user {} applied at the gateway only",
                exist.user_id
            );
            return Ok(CheckoutOutcome {
                payment_url: None,
                message: Some(
                    "Plano alterado! A mudança será aplicada no próximo ciclo de pagamento."
                        .to_string(),
                ),
            });
        }

        let mut updated = exist.clone();
        updated.plan = new_plan;
        updated.status = SubscriptionStatus::Active;
        self.store.update_subscription(&updated).await?;

        Ok(CheckoutOutcome {
            payment_url: None,
            message: Some("Plano atualizado com sucesso!".to_string()),
        })
    }

    async fn fresh_gateway_subscription(
        &self,
        user: &User,
        existing: Option<Subscription>,
        customer_id: &str,
        req: &CheckoutRequest,
        price: f64,
    ) -> Result<CheckoutOutcome, BillingError> {
        let now = Utc::now();
        let remote = self
            .gateway
            .create_subscription(&CreateSubscriptionRequest {
                customer: customer_id.to_string(),
                billing_method: req.billing_method.unwrap_or(BillingMethod::Undefined),
                value: price,
                next_due_date: now.date_naive(),
                description: format!("Assinatura {}", req.plan.display_name()),
                external_reference: user.id.to_string(),
            })
            .await?;

        match existing {
            None => {
                self.store
                    .insert_subscription(Subscription::pending(
                        user.id,
                        req.plan,
                        remote.id.clone(),
                    ))
                    .await?;
            }
            Some(mut exist) => {
                if let Some(old_ref) = exist.gateway_ref.clone() {
                    if old_ref != remote.id {
                        // The new object supersedes the old one whether or
                        // not this succeeds; the old one goes inert.
                        if let Err(e) = self.gateway.cancel_subscription(&old_ref).await {
                            log::warn!(
                                "Could not cancel superseded gateway subscription {}: {}",
                                old_ref,
                                e
                            );
                        }
                    }
                }

                // A user with running paid/trial access keeps plan and
                // status until the webhook confirms the new payment; only
                // lapsed states (pending, overdue, canceled) re-enter
                // `pending` right away.
                let keep_until_webhook = matches!(
                    exist.status,
                    SubscriptionStatus::Active | SubscriptionStatus::Trial
                );
                exist.gateway_ref = Some(remote.id.clone());
                if !keep_until_webhook {
                    exist.plan = req.plan;
                    exist.status = SubscriptionStatus::Pending;
                }
                self.store.update_subscription(&exist).await?;
            }
        }

        Ok(CheckoutOutcome {
            payment_url: remote.payment_url(),
            message: None,
        })
    }

    // ------------------------------------------------------------------
    // Webhooks
    // ------------------------------------------------------------------

    pub async fn handle_event(&self, body: WebhookBody) -> Result<(), BillingError> {
        let Some(payment) = body.payment else {
            return Ok(());
        };
        match body.event {
            WebhookEvent::PaymentConfirmed | WebhookEvent::PaymentReceived => {
                self.apply_confirmed_payment(payment).await
            }
            WebhookEvent::PaymentCreated => {
                self.notify_payment_created(&payment).await;
                Ok(())
            }
            WebhookEvent::PaymentOverdue => {
                self.mark_overdue(&payment).await;
                Ok(())
            }
            WebhookEvent::Other => Ok(()),
        }
    }

    async fn apply_confirmed_payment(&self, payment: PaymentPayload) -> Result<(), BillingError> {
        match PaymentIntent::parse(payment.external_reference.as_deref()) {
            PaymentIntent::UpgradeCompletion { user_id, plan } => {
                self.complete_upgrade(&payment, user_id, plan).await
            }
            PaymentIntent::Renewal => self.apply_renewal(&payment).await,
        }
    }

    /// The payment settles a prorated upgrade charge: switch the plan
    /// directly, no period-end math involved.
    async fn complete_upgrade(
        &self,
        payment: &PaymentPayload,
        user_id: uuid::Uuid,
        plan: Plan,
    ) -> Result<(), BillingError> {
        let Some(mut sub) = self.store.get_subscription(&user_id).await? else {
            log::warn!(
                "Upgrade payment {} references unknown user {}",
                payment.id,
                user_id
            );
            return Ok(());
        };
        if sub.last_payment_id.as_deref() == Some(payment.id.as_str()) {
            log::debug!("Payment {} already applied, skipping", payment.id);
            return Ok(());
        }

        // Reprice the recurring object so the next cycle bills the new
        // plan. Best effort: the difference has already been collected.
        if let (Some(gateway_ref), Some(price)) = (&sub.gateway_ref, plan.price()) {
            let update = SubscriptionUpdate {
                value: Some(price),
                description: Some(format!("Assinatura {}", plan.display_name())),
                update_pending_payments: true,
                ..Default::default()
            };
            if let Err(e) = self.gateway.update_subscription(gateway_ref, &update).await {
                log::warn!(
                    "Could not reprice gateway subscription {} after upgrade: {}",
                    gateway_ref,
                    e
                );
            }
        }

        sub.plan = plan;
        sub.status = SubscriptionStatus::Active;
        sub.last_payment_id = Some(payment.id.clone());
        self.store.update_subscription(&sub).await?;
        log::info!("Prorated upgrade completed for user {} -> {}", user_id, plan);
        Ok(())
    }

    async fn apply_renewal(&self, payment: &PaymentPayload) -> Result<(), BillingError> {
        let Some(gateway_ref) = payment.subscription.as_deref() else {
            // One-off charge unrelated to any subscription; acknowledge.
            return Ok(());
        };
        let Some(mut sub) = self
            .store
            .get_subscription_by_gateway_ref(gateway_ref)
            .await?
        else {
            log::warn!(
                "Payment {} references unknown gateway subscription {}",
                payment.id,
                gateway_ref
            );
            return Ok(());
        };
        if sub.last_payment_id.as_deref() == Some(payment.id.as_str()) {
            log::debug!("Payment {} already applied, skipping", payment.id);
            return Ok(());
        }

        let now = Utc::now();
        let paid_plan = payment.value.and_then(Plan::from_price);

        let mut base = renewal_base(sub.current_period_end, now);
        let mut extra_days = 0;

        if let Some(new_plan) = paid_plan {
            if new_plan != sub.plan {
                // Plan change via a manual payment: convert unused value of
                // the old plan into days of the new one and re-anchor the
                // cycle to the payment date.
                if let (Some(old_price), Some(new_price)) = (sub.plan.price(), new_plan.price()) {
                    if let Some(end) = sub.current_period_end {
                        if end > now {
                            extra_days =
                                credit_extension_days(old_price, new_price, remaining_days(end, now));
                        }
                    }
                }
                log::info!(
                    "Plan change {} -> {} for user {}: {} bonus days from unused credit",
                    sub.plan,
                    new_plan,
                    sub.user_id,
                    extra_days
                );
                base = now;
            }
        }

        let new_end = extend_by_days(next_period_end(base), extra_days);

        if let Some(new_plan) = paid_plan {
            sub.plan = new_plan;
        }
        sub.status = SubscriptionStatus::Active;
        sub.current_period_end = Some(new_end);
        sub.last_payment_id = Some(payment.id.clone());
        self.store.update_subscription(&sub).await?;
        log::info!(
            "Payment {} confirmed for user {}, period end now {}",
            payment.id,
            sub.user_id,
            new_end
        );

        // Fire-and-forget side effects; the transition above is committed
        // and must not be rolled back by either of these failing.
        if let Err(e) = self.referral.grant_if_eligible(&sub.user_id).await {
            log::error!(
                "Referral processing failed for user {}: {}",
                sub.user_id,
                e
            );
        }

        let value_formatted = payment.value.map(format_brl).unwrap_or_default();
        let notification = Notification::new(
            sub.user_id,
            NotificationKind::Success,
            "✅ Pagamento Confirmado",
            format!(
                "Seu pagamento {} foi processado com sucesso. Obrigado!",
                value_formatted
            ),
        );
        if let Err(e) = self.store.create_notification(notification).await {
            log::warn!("Could not create payment notification: {}", e);
        }

        Ok(())
    }

    async fn notify_payment_created(&self, payment: &PaymentPayload) {
        let Some(gateway_ref) = payment.subscription.as_deref() else {
            return;
        };
        let sub = match self.store.get_subscription_by_gateway_ref(gateway_ref).await {
            Ok(Some(sub)) => sub,
            Ok(None) => {
                log::warn!(
                    "PAYMENT_CREATED for unknown gateway subscription {}",
                    gateway_ref
                );
                return;
            }
            Err(e) => {
                log::warn!("Store lookup failed for PAYMENT_CREATED: {}", e);
                return;
            }
        };

        let value_formatted = payment.value.map(format_brl).unwrap_or_default();
        let due = payment
            .due_date
            .as_deref()
            .map(|d| {
                d.parse::<NaiveDate>()
                    .map(|d| d.format("%d/%m/%Y").to_string())
                    .unwrap_or_else(|_| d.to_string())
            })
            .unwrap_or_default();
        let notification = Notification::new(
            sub.user_id,
            NotificationKind::Info,
            "📄 Nova Cobrança Gerada",
            format!(
                "Uma nova cobrança de {} foi gerada com vencimento em {}.",
                value_formatted, due
            ),
        );
        if let Err(e) = self.store.create_notification(notification).await {
            log::warn!("Could not create charge notification: {}", e);
        }
    }

    /// `overdue` signals urgency but never shortens paid access:
    /// `current_period_end` stays put.
    async fn mark_overdue(&self, payment: &PaymentPayload) {
        let Some(gateway_ref) = payment.subscription.as_deref() else {
            return;
        };
        let mut sub = match self.store.get_subscription_by_gateway_ref(gateway_ref).await {
            Ok(Some(sub)) => sub,
            Ok(None) => {
                log::warn!(
                    "PAYMENT_OVERDUE for unknown gateway subscription {}",
                    gateway_ref
                );
                return;
            }
            Err(e) => {
                log::warn!("Store lookup failed for PAYMENT_OVERDUE: {}", e);
                return;
            }
        };

        sub.status = SubscriptionStatus::Overdue;
        if let Err(e) = self.store.update_subscription(&sub).await {
            log::error!(
                "Could not mark subscription of user {} overdue: {}",
                sub.user_id,
                e
            );
            return;
        }

        let notification = Notification::new(
            sub.user_id,
            NotificationKind::Error,
            "⚠️ Falha no Pagamento",
            "Não conseguimos processar o pagamento do seu cartão. Atualize seus dados de pagamento para evitar bloqueio."
                .to_string(),
        );
        if let Err(e) = self.store.create_notification(notification).await {
            log::warn!("Could not create overdue notification: {}", e);
        }
    }
}
