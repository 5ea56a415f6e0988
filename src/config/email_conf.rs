use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error, info};

use crate::config::{env_or, required_env, ConfigError};

/// SMTP settings for the emails sent to clients when a quote goes out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Empty username disables SMTP authentication
    pub smtp_username: String,
    pub smtp_password: String,
    pub use_tls: bool,
    pub use_starttls: bool,
    pub from_email: String,
    /// Display name of the sender
    pub from_name: String,
    pub connection_timeout_secs: u64,
}

impl EmailConfig {
    /// Create EmailConfig from environment variables.
    ///
    /// SMTP_HOST and SMTP_FROM_EMAIL are required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        info!("Loading email configuration from environment variables");

        let smtp_host = required_env("SMTP_HOST")?;
        let smtp_port = env_or("SMTP_PORT", 587u16)?;
        let smtp_username = env::var("SMTP_USERNAME").unwrap_or_default();
        let smtp_password = env::var("SMTP_PASSWORD").unwrap_or_default();
        let use_tls = env_or("SMTP_USE_TLS", true)?;
        let use_starttls = env_or("SMTP_USE_STARTTLS", true)?;
        let from_email = required_env("SMTP_FROM_EMAIL")?;
        let from_name = env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Fechou!".to_string());
        let connection_timeout_secs = env_or("SMTP_CONNECTION_TIMEOUT", 30u64)?;
        debug!("SMTP server: {}:{} (tls: {}, starttls: {})", smtp_host, smtp_port, use_tls, use_starttls);

        let config = EmailConfig {
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            use_tls,
            use_starttls,
            from_email,
            from_name,
            connection_timeout_secs,
        };

        config.validate()?;
        info!("Email configuration loaded successfully");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smtp_host.is_empty() {
            error!("SMTP host is empty");
            return Err(ConfigError::ValidationError("SMTP host cannot be empty".to_string()));
        }
        if self.smtp_port == 0 {
            return Err(ConfigError::ValidationError("SMTP port cannot be 0".to_string()));
        }
        if self.smtp_username.is_empty() != self.smtp_password.is_empty() {
            return Err(ConfigError::ValidationError(
                "SMTP username and password must be set together".to_string(),
            ));
        }
        if !self.from_email.contains('@') {
            error!("Invalid from email format");
            return Err(ConfigError::ValidationError("Invalid from email format".to_string()));
        }
        if self.connection_timeout_secs == 0 {
            return Err(ConfigError::ValidationError("Connection timeout cannot be 0".to_string()));
        }
        Ok(())
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        EmailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            smtp_username: String::new(),
            smtp_password: String::new(),
            use_tls: false,
            use_starttls: false,
            from_email: "nao-responda@fechou.app".to_string(),
            from_name: "Fechou!".to_string(),
            connection_timeout_secs: 30,
        }
    }
}
