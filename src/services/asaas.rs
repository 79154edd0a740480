use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::BillingError;
use crate::models::subscription::BillingMethod;

impl BillingMethod {
    fn as_gateway_str(&self) -> &'static str {
        match self {
            BillingMethod::Boleto => "BOLETO",
            BillingMethod::CreditCard => "CREDIT_CARD",
            BillingMethod::Pix => "PIX",
            BillingMethod::Undefined => "UNDEFINED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: String,
    pub cpf_cnpj: Option<String>,
    pub external_reference: String,
}

#[derive(Debug, Clone)]
pub struct CreateSubscriptionRequest {
    pub customer: String,
    pub billing_method: BillingMethod,
    pub value: f64,
    pub next_due_date: NaiveDate,
    pub description: String,
    pub external_reference: String,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionUpdate {
    pub value: Option<f64>,
    pub description: Option<String>,
    pub next_due_date: Option<NaiveDate>,
    pub update_pending_payments: bool,
}

#[derive(Debug, Clone)]
pub struct CreateChargeRequest {
    pub customer: String,
    pub billing_method: BillingMethod,
    pub value: f64,
    pub due_date: NaiveDate,
    pub description: String,
    pub external_reference: String,
}

/// Recurring-billing object as the gateway reports it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySubscription {
    pub id: String,
    #[serde(default)]
    pub status: String,
    pub billing_type: Option<BillingMethod>,
    pub value: Option<f64>,
    /// Hosted payment page of the first open charge, resolved separately
    /// when the subscription is created.
    #[serde(default)]
    pub invoice_url: Option<String>,
    #[serde(default)]
    pub bank_slip_url: Option<String>,
}

impl GatewaySubscription {
    /// A subscription whose recurring method can be re-billed without user
    /// interaction: an active credit-card mandate.
    pub fn is_live_card(&self) -> bool {
        self.billing_type == Some(BillingMethod::CreditCard) && self.status == "ACTIVE"
    }

    pub fn payment_url(&self) -> Option<String> {
        self.invoice_url.clone().or_else(|| self.bank_slip_url.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCharge {
    pub id: String,
    #[serde(default)]
    pub invoice_url: Option<String>,
    #[serde(default)]
    pub bank_slip_url: Option<String>,
}

impl GatewayCharge {
    pub fn payment_url(&self) -> Option<String> {
        self.invoice_url.clone().or_else(|| self.bank_slip_url.clone())
    }
}

/// Narrow interface over the payment gateway. The state machine only ever
/// talks to the gateway through this trait, so tests can substitute a
/// recording mock.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// Looks the customer up by email first; creates it when absent.
    async fn find_or_create_customer(
        &self,
        req: &CreateCustomerRequest,
    ) -> Result<String, BillingError>;

    async fn create_subscription(
        &self,
        req: &CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription, BillingError>;

    /// `Ok(None)` when the gateway does not know the id (deleted or
    /// foreign), mirroring the lookup-before-reuse checkout flow.
    async fn get_subscription(&self, id: &str)
        -> Result<Option<GatewaySubscription>, BillingError>;

    async fn update_subscription(
        &self,
        id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<(), BillingError>;

    async fn cancel_subscription(&self, id: &str) -> Result<(), BillingError>;

    async fn create_charge(&self, req: &CreateChargeRequest)
        -> Result<GatewayCharge, BillingError>;

    /// Invoice URL of the oldest pending charge on a subscription, used
    /// when the user only wants to change the payment method.
    async fn pending_payment_url(&self, subscription_id: &str)
        -> Result<Option<String>, BillingError>;
}

/// Asaas REST client. Authentication is a static `access_token` header on
/// every call.
#[derive(Clone)]
pub struct AsaasClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl AsaasClient {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
        }
    }

    async fn request_json(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, BillingError> {
        let url = format!("{}{}", self.api_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .header("access_token", &self.api_key)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BillingError::Gateway(format!("request to {} failed: {}", path, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BillingError::Gateway(format!("reading {} response failed: {}", path, e)))?;

        if !status.is_success() {
            return Err(BillingError::Gateway(format!(
                "{} returned {}: {}",
                path, status, text
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| BillingError::Gateway(format!("invalid JSON from {}: {}", path, e)))
    }

    fn parse<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T, BillingError> {
        serde_json::from_value(value)
            .map_err(|e| BillingError::Gateway(format!("unexpected {} payload: {}", what, e)))
    }

    /// The create-subscription response carries no payment link; the first
    /// charge does. Fetch it so checkout can hand the user a URL.
    async fn first_payment_url(
        &self,
        subscription_id: &str,
        status_filter: Option<&str>,
    ) -> Result<Option<String>, BillingError> {
        let path = match status_filter {
            Some(status) => format!("/subscriptions/{}/payments?status={}", subscription_id, status),
            None => format!("/subscriptions/{}/payments", subscription_id),
        };
        let body = self.request_json(reqwest::Method::GET, &path, None).await?;
        let url = body
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|list| list.first())
            .and_then(|payment| {
                payment
                    .get("invoiceUrl")
                    .or_else(|| payment.get("bankSlipUrl"))
            })
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        Ok(url)
    }
}

#[async_trait]
impl BillingGateway for AsaasClient {
    async fn find_or_create_customer(
        &self,
        req: &CreateCustomerRequest,
    ) -> Result<String, BillingError> {
        let search = self
            .request_json(
                reqwest::Method::GET,
                &format!("/customers?email={}", req.email),
                None,
            )
            .await;
        if let Ok(body) = search {
            if let Some(id) = body
                .get("data")
                .and_then(|d| d.as_array())
                .and_then(|list| list.first())
                .and_then(|c| c.get("id"))
                .and_then(|v| v.as_str())
            {
                return Ok(id.to_string());
            }
        }

        let payload = json!({
            "name": req.name,
            "email": req.email,
            "cpfCnpj": req.cpf_cnpj,
            "externalReference": req.external_reference,
        });
        let body = self
            .request_json(reqwest::Method::POST, "/customers", Some(&payload))
            .await?;
        body.get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| BillingError::Gateway("customer response missing id".to_string()))
    }

    async fn create_subscription(
        &self,
        req: &CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription, BillingError> {
        let payload = json!({
            "customer": req.customer,
            "billingType": req.billing_method.as_gateway_str(),
            "value": req.value,
            "nextDueDate": req.next_due_date.format("%Y-%m-%d").to_string(),
            "cycle": "MONTHLY",
            "description": req.description,
            "externalReference": req.external_reference,
        });
        let body = self
            .request_json(reqwest::Method::POST, "/subscriptions", Some(&payload))
            .await?;
        let mut subscription: GatewaySubscription = Self::parse(body, "subscription")?;

        // Best effort: checkout still succeeds without a link, the gateway
        // also emails the invoice.
        match self.first_payment_url(&subscription.id, None).await {
            Ok(url) => subscription.invoice_url = url,
            Err(e) => log::warn!(
                "Could not resolve payment URL for subscription {}: {}",
                subscription.id,
                e
            ),
        }
        Ok(subscription)
    }

    async fn get_subscription(
        &self,
        id: &str,
    ) -> Result<Option<GatewaySubscription>, BillingError> {
        match self
            .request_json(reqwest::Method::GET, &format!("/subscriptions/{}", id), None)
            .await
        {
            Ok(body) => Ok(Some(Self::parse(body, "subscription")?)),
            Err(BillingError::Gateway(e)) => {
                log::debug!("Gateway lookup for subscription {} failed: {}", id, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn update_subscription(
        &self,
        id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<(), BillingError> {
        let mut payload = serde_json::Map::new();
        if let Some(value) = update.value {
            payload.insert("value".to_string(), json!(value));
        }
        if let Some(description) = &update.description {
            payload.insert("description".to_string(), json!(description));
        }
        if let Some(due) = update.next_due_date {
            payload.insert(
                "nextDueDate".to_string(),
                json!(due.format("%Y-%m-%d").to_string()),
            );
        }
        if update.update_pending_payments {
            payload.insert("updatePendingPayments".to_string(), json!(true));
        }
        self.request_json(
            reqwest::Method::POST,
            &format!("/subscriptions/{}", id),
            Some(&Value::Object(payload)),
        )
        .await?;
        Ok(())
    }

    async fn cancel_subscription(&self, id: &str) -> Result<(), BillingError> {
        self.request_json(
            reqwest::Method::DELETE,
            &format!("/subscriptions/{}", id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn create_charge(
        &self,
        req: &CreateChargeRequest,
    ) -> Result<GatewayCharge, BillingError> {
        let payload = json!({
            "customer": req.customer,
            "billingType": req.billing_method.as_gateway_str(),
            "value": req.value,
            "dueDate": req.due_date.format("%Y-%m-%d").to_string(),
            "description": req.description,
            "externalReference": req.external_reference,
        });
        let body = self
            .request_json(reqwest::Method::POST, "/payments", Some(&payload))
            .await?;
        Self::parse(body, "charge")
    }

    async fn pending_payment_url(
        &self,
        subscription_id: &str,
    ) -> Result<Option<String>, BillingError> {
        self.first_payment_url(subscription_id, Some("PENDING")).await
    }
}
