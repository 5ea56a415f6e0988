use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Subscription tier. `PremiumCortesia` is a complimentary premium plan
/// granted by an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, Default)]
#[sqlx(type_name = "user_plan", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    #[default]
    Free,
    Premium,
    PremiumCortesia,
}

impl Plan {
    pub fn is_premium(&self) -> bool {
        matches!(self, Plan::Premium | Plan::PremiumCortesia)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "FREE",
            Plan::Premium => "PREMIUM",
            Plan::PremiumCortesia => "PREMIUM_CORTESIA",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(skip_serializing)]
    pub firebase_uid: Option<String>,
    pub name: String,
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub document: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub plan: Plan,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub quotes_this_month: i32,
    /// First day of the month `quotes_this_month` counts against.
    pub quota_period_start: NaiveDate,
    pub bonus_quotes: i32,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    pub referral_count: i32,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Fresh FREE account whose quota period starts in the month of `now`.
    pub fn new(email: String, name: String, referral_code: String, now: DateTime<Utc>) -> Self {
        User {
            id: Uuid::new_v4(),
            email,
            password_hash: None,
            firebase_uid: None,
            name,
            business_name: None,
            phone: None,
            document: None,
            address: None,
            city: None,
            state: None,
            zip_code: None,
            plan: Plan::Free,
            premium_expires_at: None,
            quotes_this_month: 0,
            quota_period_start: month_start(now),
            bonus_quotes: 0,
            referral_code,
            referred_by: None,
            referral_count: 0,
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn role(&self) -> &'static str {
        if self.is_admin {
            "admin"
        } else {
            "user"
        }
    }

    /// Name shown to clients on quotes and emails.
    pub fn display_name(&self) -> &str {
        self.business_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

/// First day of the month `now` falls in.
pub fn month_start(now: DateTime<Utc>) -> NaiveDate {
    let date = now.date_naive();
    date.with_day(1).unwrap_or(date)
}

/// User as returned by the API: no credentials, no firebase link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub document: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub plan: Plan,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub quotes_this_month: i32,
    pub bonus_quotes: i32,
    pub referral_code: String,
    pub referral_count: i32,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser {
            id: user.id,
            email: user.email,
            name: user.name,
            business_name: user.business_name,
            phone: user.phone,
            document: user.document,
            address: user.address,
            city: user.city,
            state: user.state,
            zip_code: user.zip_code,
            plan: user.plan,
            premium_expires_at: user.premium_expires_at,
            quotes_this_month: user.quotes_this_month,
            bonus_quotes: user.bonus_quotes,
            referral_code: user.referral_code,
            referral_count: user.referral_count,
            is_admin: user.is_admin,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
