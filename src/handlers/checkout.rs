use actix_web::web::{Data, Json};
use actix_web::{post, HttpResponse, Result};
use serde::Serialize;

use crate::errors::BillingError;
use crate::models::subscription::{CheckoutRequest, CheckoutResponse};
use crate::services::subscription::SubscriptionService;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// POST /checkout
#[post("/checkout")]
pub async fn checkout(
    service: Data<SubscriptionService>,
    payload: Json<CheckoutRequest>,
) -> Result<HttpResponse> {
    match service.checkout(payload.into_inner()).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(CheckoutResponse {
            success: true,
            payment_url: outcome.payment_url,
            message: outcome.message,
        })),
        Err(BillingError::Validation(msg)) => Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: msg,
        })),
        Err(e @ BillingError::Gateway(_)) => {
            log::error!("Checkout failed at the gateway: {}", e);
            Ok(HttpResponse::BadGateway().json(ErrorResponse {
                error: "Payment provider is unavailable, try again shortly".to_string(),
            }))
        }
        Err(e) => {
            log::error!("Checkout failed: {}", e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal error".to_string(),
            }))
        }
    }
}
