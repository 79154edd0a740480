mod errors;
mod handlers;
mod models;
mod services;
mod utils;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::web::Data;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;

use services::asaas::{AsaasClient, BillingGateway};
use services::database::{MemoryStore, SubscriptionStore};
use services::subscription::SubscriptionService;
use utils::config::AppConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn SubscriptionStore> = Arc::new(MemoryStore::new());
    let gateway: Arc<dyn BillingGateway> = Arc::new(AsaasClient::new(
        config.asaas_api_url.clone(),
        config.asaas_api_key.clone(),
    ));
    let subscription_service = SubscriptionService::new(store.clone(), gateway);

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting billing API at http://{}", bind_address);

    let store_data = Data::from(store);
    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(config.clone()))
            .app_data(store_data.clone())
            .app_data(Data::new(subscription_service.clone()))
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .service(handlers::webhook::asaas_webhook)
            .service(
                web::scope("/api/v1")
                    .service(
                        web::scope("/users")
                            .service(handlers::user::register_user)
                            .service(handlers::user::get_user),
                    )
                    .service(
                        web::scope("/subscriptions")
                            .service(handlers::checkout::checkout)
                            .service(handlers::subscription::get_subscription),
                    )
                    .service(
                        web::scope("/notifications")
                            .service(handlers::notification::get_notifications),
                    ),
            )
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
