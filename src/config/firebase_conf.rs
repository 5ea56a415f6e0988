use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, info};

use crate::config::{env_or, required_env, ConfigError};

pub const DEFAULT_FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Firebase Authentication settings used to verify client ID tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    pub project_id: String,
    /// JWK set holding the token signing keys
    pub jwks_url: String,
    /// How long fetched keys are reused when the response carries no max-age
    pub keys_cache_secs: u64,
}

impl FirebaseConfig {
    /// Expected environment variables:
    /// - FIREBASE_PROJECT_ID (required)
    /// - FIREBASE_JWKS_URL (optional)
    /// - FIREBASE_KEYS_CACHE_SECS (defaults to 3600)
    pub fn from_env() -> Result<Self, ConfigError> {
        info!("Loading Firebase configuration from environment variables");
        let project_id = required_env("FIREBASE_PROJECT_ID")?;
        let jwks_url = env::var("FIREBASE_JWKS_URL").unwrap_or_else(|_| DEFAULT_FIREBASE_JWKS_URL.to_string());
        let keys_cache_secs = env_or("FIREBASE_KEYS_CACHE_SECS", 3600u64)?;
        debug!("Firebase project: {}", project_id);
        let config = FirebaseConfig { project_id, jwks_url, keys_cache_secs };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::ValidationError("FIREBASE_PROJECT_ID cannot be empty".to_string()));
        }
        if !self.jwks_url.starts_with("https://") && !self.jwks_url.starts_with("http://") {
            return Err(ConfigError::ValidationError("FIREBASE_JWKS_URL must be an http(s) URL".to_string()));
        }
        Ok(())
    }

    pub fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }
}
