use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;

use crate::config::{env_or, ConfigError};

/// Limits of the FREE plan and rewards of the referral program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Quotes a FREE user may create per calendar month
    pub free_monthly_quote_limit: i32,
    /// Bonus quotes granted to a FREE referrer per referred user
    pub referral_bonus_quotes: i32,
    /// Premium days granted to a premium referrer per referred user
    pub referral_bonus_days: i64,
    /// Text stamped on documents of users without premium features
    pub watermark_text: String,
}

impl PlanConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        info!("Loading plan configuration from environment variables");
        let defaults = PlanConfig::default();
        let config = PlanConfig {
            free_monthly_quote_limit: env_or("FREE_MONTHLY_QUOTE_LIMIT", defaults.free_monthly_quote_limit)?,
            referral_bonus_quotes: env_or("REFERRAL_BONUS_QUOTES", defaults.referral_bonus_quotes)?,
            referral_bonus_days: env_or("REFERRAL_BONUS_DAYS", defaults.referral_bonus_days)?,
            watermark_text: env::var("WATERMARK_TEXT").unwrap_or(defaults.watermark_text),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.free_monthly_quote_limit < 0 {
            return Err(ConfigError::ValidationError("FREE_MONTHLY_QUOTE_LIMIT cannot be negative".to_string()));
        }
        if self.referral_bonus_quotes < 0 || self.referral_bonus_days < 0 {
            return Err(ConfigError::ValidationError("Referral rewards cannot be negative".to_string()));
        }
        Ok(())
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        PlanConfig {
            free_monthly_quote_limit: 5,
            referral_bonus_quotes: 3,
            referral_bonus_days: 30,
            watermark_text: "Gerado com Fechou! - plano gratuito".to_string(),
        }
    }
}
