use actix_web::web::{Data, Path};
use actix_web::{get, HttpResponse, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::services::database::SubscriptionStore;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// GET /{user_id}
#[get("/{user_id}")]
pub async fn get_subscription(
    store: Data<dyn SubscriptionStore>,
    path: Path<Uuid>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    match store.get_subscription(&user_id).await {
        Ok(Some(subscription)) => Ok(HttpResponse::Ok().json(subscription)),
        Ok(None) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: "Subscription not found".to_string(),
        })),
        Err(e) => {
            log::error!("Subscription lookup failed for {}: {}", user_id, e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal error".to_string(),
            }))
        }
    }
}
