use actix_web::web::{Data, Path};
use actix_web::{get, HttpResponse, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::services::database::SubscriptionStore;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// GET /user/{user_id}
#[get("/user/{user_id}")]
pub async fn get_notifications(
    store: Data<dyn SubscriptionStore>,
    path: Path<Uuid>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    match store.notifications_for_user(&user_id).await {
        Ok(notifications) => Ok(HttpResponse::Ok().json(notifications)),
        Err(e) => {
            log::error!("Notification lookup failed for {}: {}", user_id, e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal error".to_string(),
            }))
        }
    }
}
