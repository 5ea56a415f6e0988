use crate::config::{env_or, ConfigError};
use std::env;

pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the SPA, used to build the public quote links sent to clients.
    pub public_app_url: String,
    /// Origin allowed by CORS. `None` allows any origin.
    pub cors_allowed_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_or("APP_PORT", 8080u16)?;
        let public_app_url = env::var("PUBLIC_APP_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .trim_end_matches('/')
            .to_string();
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok().filter(|s| !s.is_empty());
        Ok(AppConfig { host, port, public_app_url, cors_allowed_origin })
    }

    pub fn public_quote_url(&self, token: &uuid::Uuid) -> String {
        public_quote_url(&self.public_app_url, token)
    }
}

pub fn public_quote_url(base: &str, token: &uuid::Uuid) -> String {
    format!("{}/orcamento/{}", base.trim_end_matches('/'), token)
}
