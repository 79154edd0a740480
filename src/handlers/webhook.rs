use actix_web::web::{Bytes, Data};
use actix_web::{post, HttpRequest, HttpResponse, Result};
use serde_json::json;

use crate::errors::BillingError;
use crate::models::webhook::WebhookBody;
use crate::services::subscription::SubscriptionService;
use crate::utils::config::AppConfig;

const ACCESS_TOKEN_HEADER: &str = "asaas-access-token";

// POST /webhook
//
// The body arrives as raw bytes and is parsed by hand: the shared-secret
// check must run before anything derived from the payload, and a body the
// gateway mangled still has to be acknowledged with a 200 or it will be
// redelivered forever.
#[post("/webhook")]
pub async fn asaas_webhook(
    req: HttpRequest,
    config: Data<AppConfig>,
    service: Data<SubscriptionService>,
    body: Bytes,
) -> Result<HttpResponse> {
    let authorized = req
        .headers()
        .get(ACCESS_TOKEN_HEADER)
        .map(|value| value.as_bytes() == config.asaas_webhook_token.as_bytes())
        .unwrap_or(false);
    if !authorized {
        log::warn!("Webhook rejected: bad or missing {} header", ACCESS_TOKEN_HEADER);
        return Ok(HttpResponse::Unauthorized().json(json!({ "error": "Unauthorized" })));
    }

    let body: WebhookBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            log::warn!("Webhook body could not be parsed, acknowledging: {}", e);
            return Ok(HttpResponse::Ok().json(json!({ "received": true })));
        }
    };

    match service.handle_event(body).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "received": true }))),
        Err(e @ BillingError::Persistence(_)) => {
            // A 5xx makes the gateway redeliver; the last-payment-id guard
            // keeps the retry from applying twice.
            log::error!("Webhook processing failed, requesting redelivery: {}", e);
            Ok(HttpResponse::InternalServerError().json(json!({ "error": "Processing failed" })))
        }
        Err(e) => {
            // Anything else is acknowledged so the gateway stops retrying
            // an event we will never be able to apply.
            log::error!("Webhook processing error (acknowledged): {}", e);
            Ok(HttpResponse::Ok().json(json!({ "received": true })))
        }
    }
}
