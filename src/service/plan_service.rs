//! Plan limits, quota accounting and referral rewards.
//!
//! Everything here is a pure function over a [`User`] and an explicit `now`,
//! so the rules can be exercised without a database. The user repository
//! applies the same rules as conditional single-row statements.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::config::PlanConfig;
use crate::model::referral::RewardType;
use crate::model::user::{month_start, Plan, User};

#[derive(Debug, Clone)]
pub struct PlanPolicy {
    pub free_monthly_quote_limit: i32,
    pub referral_bonus_quotes: i32,
    pub referral_bonus_days: i64,
    pub watermark_text: String,
}

impl From<&PlanConfig> for PlanPolicy {
    fn from(config: &PlanConfig) -> Self {
        PlanPolicy {
            free_monthly_quote_limit: config.free_monthly_quote_limit,
            referral_bonus_quotes: config.referral_bonus_quotes,
            referral_bonus_days: config.referral_bonus_days,
            watermark_text: config.watermark_text.clone(),
        }
    }
}

impl Default for PlanPolicy {
    fn default() -> Self {
        PlanPolicy::from(&PlanConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("Monthly limit of {limit} quotes reached for the FREE plan and no bonus quotes left")]
    QuotaExceeded { limit: i32 },
}

/// Where a newly created quote was charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSlot {
    Monthly,
    Bonus,
    Unlimited,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanUsage {
    pub plan: Plan,
    pub effective_plan: Plan,
    pub used: i32,
    /// `None` means unlimited.
    pub monthly_limit: Option<i32>,
    pub bonus_quotes: i32,
    pub remaining: Option<i32>,
    pub period_start: NaiveDate,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferralReward {
    pub reward_type: RewardType,
    pub reward_value: i32,
}

pub fn is_premium_expired(user: &User, now: DateTime<Utc>) -> bool {
    user.plan.is_premium() && user.premium_expires_at.is_some_and(|expires| expires <= now)
}

pub fn effective_plan(user: &User, now: DateTime<Utc>) -> Plan {
    if is_premium_expired(user, now) {
        Plan::Free
    } else {
        user.plan
    }
}

pub fn has_premium_features(user: &User, now: DateTime<Utc>) -> bool {
    effective_plan(user, now).is_premium()
}

/// Resets the monthly counter when the stored period is not the month of `now`.
/// Returns whether anything changed.
pub fn roll_quota_period(user: &mut User, now: DateTime<Utc>) -> bool {
    let current = month_start(now);
    if user.quota_period_start == current {
        return false;
    }
    user.quotes_this_month = 0;
    user.quota_period_start = current;
    true
}

pub fn plan_usage(user: &User, policy: &PlanPolicy, now: DateTime<Utc>) -> PlanUsage {
    let mut current = user.clone();
    roll_quota_period(&mut current, now);
    let effective = effective_plan(&current, now);

    let (monthly_limit, remaining) = if effective.is_premium() {
        (None, None)
    } else {
        let limit = policy.free_monthly_quote_limit;
        let left = (limit - current.quotes_this_month).max(0) + current.bonus_quotes.max(0);
        (Some(limit), Some(left))
    };

    PlanUsage {
        plan: current.plan,
        effective_plan: effective,
        used: current.quotes_this_month,
        monthly_limit,
        bonus_quotes: current.bonus_quotes,
        remaining,
        period_start: current.quota_period_start,
        premium_expires_at: current.premium_expires_at,
        expired: is_premium_expired(&current, now),
    }
}

/// Charges one quote to the user. Premium users are only counted; FREE users
/// spend the monthly allowance first and bonus quotes after it.
pub fn consume_quote_slot(user: &mut User, policy: &PlanPolicy, now: DateTime<Utc>) -> Result<QuoteSlot, PlanError> {
    roll_quota_period(user, now);

    if has_premium_features(user, now) {
        user.quotes_this_month += 1;
        return Ok(QuoteSlot::Unlimited);
    }

    if user.quotes_this_month < policy.free_monthly_quote_limit {
        user.quotes_this_month += 1;
        Ok(QuoteSlot::Monthly)
    } else if user.bonus_quotes > 0 {
        user.bonus_quotes -= 1;
        user.quotes_this_month += 1;
        Ok(QuoteSlot::Bonus)
    } else {
        Err(PlanError::QuotaExceeded { limit: policy.free_monthly_quote_limit })
    }
}

/// Reads back where a quote was charged from the row returned by a
/// successful consume: premium rows are unlimited, a counter past the
/// monthly limit means a bonus quote was spent.
pub fn charged_slot(user: &User, policy: &PlanPolicy, now: DateTime<Utc>) -> QuoteSlot {
    if has_premium_features(user, now) {
        QuoteSlot::Unlimited
    } else if user.quotes_this_month > policy.free_monthly_quote_limit {
        QuoteSlot::Bonus
    } else {
        QuoteSlot::Monthly
    }
}

pub fn apply_referral_reward(referrer: &mut User, policy: &PlanPolicy, now: DateTime<Utc>) -> ReferralReward {
    referrer.referral_count += 1;

    if has_premium_features(referrer, now) {
        // Open-ended premium plans have nothing to extend.
        if let Some(expires) = referrer.premium_expires_at {
            let base = expires.max(now);
            referrer.premium_expires_at = Some(base + Duration::days(policy.referral_bonus_days));
        }
        ReferralReward {
            reward_type: RewardType::PremiumDays,
            reward_value: policy.referral_bonus_days as i32,
        }
    } else {
        referrer.bonus_quotes += policy.referral_bonus_quotes;
        ReferralReward {
            reward_type: RewardType::BonusQuotes,
            reward_value: policy.referral_bonus_quotes,
        }
    }
}

pub fn grant_plan(user: &mut User, plan: Plan, expires_at: Option<DateTime<Utc>>) {
    user.plan = plan;
    user.premium_expires_at = if plan.is_premium() { expires_at } else { None };
}

/// Turns an expired premium row back into FREE. Returns whether it changed.
pub fn downgrade_if_expired(user: &mut User, now: DateTime<Utc>) -> bool {
    if !is_premium_expired(user, now) {
        return false;
    }
    user.plan = Plan::Free;
    user.premium_expires_at = None;
    true
}

pub fn watermark(user: &User, policy: &PlanPolicy, now: DateTime<Utc>) -> Option<String> {
    if has_premium_features(user, now) {
        None
    } else {
        Some(policy.watermark_text.clone())
    }
}
