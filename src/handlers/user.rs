use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, HttpResponse, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::BillingError;
use crate::models::subscription::Subscription;
use crate::models::user::CreateUserDto;
use crate::services::database::SubscriptionStore;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub email: String,
    pub name: String,
    pub cpf: Option<String>,
    pub referred_by: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// POST /register
#[post("/register")]
pub async fn register_user(
    store: Data<dyn SubscriptionStore>,
    payload: Json<RegisterUserRequest>,
) -> Result<HttpResponse> {
    if payload.email.is_empty() || payload.name.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: "Email and name are required".to_string(),
        }));
    }

    let payload = payload.into_inner();
    let user = match store
        .create_user(CreateUserDto {
            email: payload.email,
            name: payload.name,
            cpf: payload.cpf,
            referred_by: payload.referred_by,
        })
        .await
    {
        Ok(user) => user,
        Err(BillingError::Validation(msg)) => {
            return Ok(HttpResponse::BadRequest().json(ErrorResponse { error: msg }));
        }
        Err(e) => {
            log::error!("User registration failed: {}", e);
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal error".to_string(),
            }));
        }
    };

    // Every account starts on a trial subscription.
    if let Err(e) = store.insert_subscription(Subscription::trial(user.id)).await {
        log::error!("Could not create trial subscription for {}: {}", user.id, e);
        return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Internal error".to_string(),
        }));
    }

    log::info!("User registered: {}", user.email);
    Ok(HttpResponse::Ok().json(UserResponse {
        id: user.id,
        email: user.email,
        name: user.name,
    }))
}

// GET /{user_id}
#[get("/{user_id}")]
pub async fn get_user(
    store: Data<dyn SubscriptionStore>,
    path: Path<Uuid>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    match store.get_user(&user_id).await {
        Ok(Some(user)) => Ok(HttpResponse::Ok().json(UserResponse {
            id: user.id,
            email: user.email,
            name: user.name,
        })),
        Ok(None) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: "User not found".to_string(),
        })),
        Err(e) => {
            log::error!("User lookup failed for {}: {}", user_id, e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal error".to_string(),
            }))
        }
    }
}
