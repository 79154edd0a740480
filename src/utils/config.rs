use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_base_url: String,
    pub asaas_api_url: String,
    pub asaas_api_key: String,
    pub asaas_webhook_token: String,
    pub port: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(AppConfig {
            app_base_url: std::env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            asaas_api_url: std::env::var("ASAAS_API_URL")
                .context("ASAAS_API_URL must be set")?,
            asaas_api_key: std::env::var("ASAAS_API_KEY")
                .context("ASAAS_API_KEY must be set")?,
            asaas_webhook_token: std::env::var("ASAAS_WEBHOOK_TOKEN")
                .context("ASAAS_WEBHOOK_TOKEN must be set")?,
            port: std::env::var("PORT").unwrap_or_else(|_| "8080".to_string()),
        })
    }
}
