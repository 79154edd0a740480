use thiserror::Error;

/// Errors produced by the billing core.
///
/// Handlers map these to HTTP responses: `Validation` -> 400 and
/// `Gateway` -> 502 on the checkout path. Webhook processing absorbs
/// everything except `Persistence` of a confirmed-payment transition,
/// which must surface as a 500 so the gateway retries.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}
