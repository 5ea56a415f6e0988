use serde::{Deserialize, Serialize};

use crate::config::{required_env, ConfigError};

/// Credentials of the administrator created on first start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserConfig {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl AdminUserConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(AdminUserConfig {
            name: required_env("ADMIN_NAME")?,
            email: required_env("ADMIN_EMAIL")?,
            password: required_env("ADMIN_PASSWORD")?,
        })
    }
}
