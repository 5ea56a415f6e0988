#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

use fechou_backend::app::app::build_router;
use fechou_backend::app::services::{Integrations, Repositories, ServiceSettings, Services};
use fechou_backend::config::JwtConfig;
use fechou_backend::model::client::Client;
use fechou_backend::model::notification::Notification;
use fechou_backend::model::payment::Payment;
use fechou_backend::model::quote::{Quote, QuoteItem, QuoteStatus, QuoteStatusTotal, QuoteWithItems};
use fechou_backend::model::referral::{Referral, RewardType};
use fechou_backend::model::review::{RatingSummary, Review};
use fechou_backend::model::saved_item::SavedItem;
use fechou_backend::model::user::{Plan, User};
use fechou_backend::repository::client_repo::ClientRepository;
use fechou_backend::repository::notification_repo::NotificationRepository;
use fechou_backend::repository::payment_repo::PaymentRepository;
use fechou_backend::repository::quote_repo::{QuoteFilter, QuoteRepository};
use fechou_backend::repository::referral_repo::ReferralRepository;
use fechou_backend::repository::repository_error::{RepositoryError, RepositoryResult};
use fechou_backend::repository::review_repo::ReviewRepository;
use fechou_backend::repository::saved_item_repo::SavedItemRepository;
use fechou_backend::repository::user_repo::UserRepository;
use fechou_backend::service::plan_service::{self, PlanPolicy};
use fechou_backend::util::email::{EmailError, QuoteEmail, QuoteMailer};
use fechou_backend::util::firebase::{FirebaseError, FirebaseIdentity, IdTokenVerifier};
use fechou_backend::util::jwt::{JwtTokenUtils, JwtTokenUtilsImpl};
use fechou_backend::util::referral_code::generate_referral_code;

pub const PASSWORD: &str = "s3nha-segura";

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    clients: Vec<Client>,
    quotes: Vec<Quote>,
    items: Vec<QuoteItem>,
    payments: Vec<Payment>,
    reviews: Vec<Review>,
    referrals: Vec<Referral>,
    saved_items: Vec<SavedItem>,
    notifications: Vec<Notification>,
}

/// In-memory stand-in for the Postgres schema. One lock guards every table so
/// conditional updates behave like single statements.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn paginate<T>(rows: Vec<T>, page: u32, limit: u32) -> Vec<T> {
    let skip = (page.max(1) as usize - 1) * limit as usize;
    rows.into_iter().skip(skip).take(limit as usize).collect()
}

fn quote_matches(quote: &Quote, user_id: Uuid, filter: &QuoteFilter) -> bool {
    quote.user_id == user_id
        && filter.status.map_or(true, |s| quote.status == s)
        && filter.client_id.map_or(true, |c| quote.client_id == c)
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryStore::default())
    }

    pub fn repositories(self: &Arc<Self>) -> Repositories {
        Repositories {
            users: self.clone(),
            clients: self.clone(),
            quotes: self.clone(),
            reviews: self.clone(),
            referrals: self.clone(),
            saved_items: self.clone(),
            notifications: self.clone(),
            payments: self.clone(),
        }
    }

    pub fn user(&self, id: Uuid) -> User {
        let tables = self.tables.lock().unwrap();
        tables.users.iter().find(|u| u.id == id).cloned().expect("user exists")
    }

    pub fn put_user(&self, user: User) {
        let mut tables = self.tables.lock().unwrap();
        tables.users.retain(|u| u.id != user.id);
        tables.users.push(user);
    }

    fn modify_user(&self, id: Uuid, change: impl FnOnce(&mut User)) -> RepositoryResult<User> {
        let mut tables = self.tables.lock().unwrap();
        let stored = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| RepositoryError::not_found("User not found"))?;
        change(stored);
        Ok(stored.clone())
    }

    /// Applies `change` to the stored row, standing in for a concurrent writer.
    pub fn update_user(&self, id: Uuid, change: impl FnOnce(&mut User)) {
        self.modify_user(id, change).expect("user exists");
    }

    pub fn users(&self) -> Vec<User> {
        self.tables.lock().unwrap().users.clone()
    }

    pub fn quote(&self, id: Uuid) -> Quote {
        let tables = self.tables.lock().unwrap();
        tables.quotes.iter().find(|q| q.id == id).cloned().expect("quote exists")
    }

    pub fn put_quote(&self, quote: Quote) {
        let mut tables = self.tables.lock().unwrap();
        tables.quotes.retain(|q| q.id != quote.id);
        tables.quotes.push(quote);
    }

    pub fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        let tables = self.tables.lock().unwrap();
        tables.notifications.iter().filter(|n| n.user_id == user_id).cloned().collect()
    }

    pub fn referrals(&self) -> Vec<Referral> {
        self.tables.lock().unwrap().referrals.clone()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.tables.lock().unwrap().payments.clone()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: User) -> RepositoryResult<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| {
            u.email.eq_ignore_ascii_case(&user.email)
                || u.referral_code == user.referral_code
                || (u.firebase_uid.is_some() && u.firebase_uid == user.firebase_uid)
        }) {
            return Err(RepositoryError::already_exists("User already exists"));
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_profile(&self, user: &User) -> RepositoryResult<User> {
        self.modify_user(user.id, |stored| {
            stored.name = user.name.clone();
            stored.business_name = user.business_name.clone();
            stored.phone = user.phone.clone();
            stored.document = user.document.clone();
            stored.address = user.address.clone();
            stored.city = user.city.clone();
            stored.state = user.state.clone();
            stored.zip_code = user.zip_code.clone();
        })
    }

    async fn link_firebase_uid(&self, id: Uuid, uid: &str) -> RepositoryResult<Option<User>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(stored) = tables
            .users
            .iter_mut()
            .find(|u| u.id == id && u.firebase_uid.as_deref().map_or(true, |linked| linked == uid))
        else {
            return Ok(None);
        };
        stored.firebase_uid = Some(uid.to_string());
        Ok(Some(stored.clone()))
    }

    async fn set_plan(&self, id: Uuid, plan: Plan, expires_at: Option<DateTime<Utc>>) -> RepositoryResult<User> {
        self.modify_user(id, |stored| {
            stored.plan = plan;
            stored.premium_expires_at = expires_at;
        })
    }

    async fn downgrade_expired(&self, id: Uuid, now: DateTime<Utc>) -> RepositoryResult<Option<User>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(stored) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        Ok(plan_service::downgrade_if_expired(stored, now).then(|| stored.clone()))
    }

    async fn roll_quota_period(&self, id: Uuid, period_start: NaiveDate) -> RepositoryResult<Option<User>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(stored) = tables.users.iter_mut().find(|u| u.id == id && u.quota_period_start != period_start)
        else {
            return Ok(None);
        };
        stored.quotes_this_month = 0;
        stored.quota_period_start = period_start;
        Ok(Some(stored.clone()))
    }

    async fn consume_quote_slot(
        &self,
        id: Uuid,
        monthly_limit: i32,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<User>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(stored) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        let policy = PlanPolicy { free_monthly_quote_limit: monthly_limit, ..PlanPolicy::default() };
        let mut charged = stored.clone();
        match plan_service::consume_quote_slot(&mut charged, &policy, now) {
            Ok(_) => {
                *stored = charged.clone();
                Ok(Some(charged))
            }
            Err(_) => Ok(None),
        }
    }

    async fn release_quote_slot(&self, id: Uuid, bonus: bool) -> RepositoryResult<()> {
        self.modify_user(id, |stored| {
            stored.quotes_this_month = (stored.quotes_this_month - 1).max(0);
            if bonus {
                stored.bonus_quotes += 1;
            }
        })
        .map(|_| ())
    }

    async fn add_bonus_quotes(&self, id: Uuid, amount: i32) -> RepositoryResult<User> {
        self.modify_user(id, |stored| stored.bonus_quotes += amount)
    }

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> RepositoryResult<User> {
        self.modify_user(id, |stored| stored.is_admin = is_admin)
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        Ok(self.tables.lock().unwrap().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_by_firebase_uid(&self, uid: &str) -> RepositoryResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.firebase_uid.as_deref() == Some(uid)).cloned())
    }

    async fn find_by_referral_code(&self, code: &str) -> RepositoryResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.referral_code == code).cloned())
    }

    async fn list(&self, search: Option<&str>, page: u32, limit: u32) -> RepositoryResult<Vec<User>> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<User> = tables
            .users
            .iter()
            .filter(|u| search.map_or(true, |s| contains_ci(&u.email, s) || contains_ci(&u.name, s)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page, limit))
    }

    async fn count(&self, search: Option<&str>) -> RepositoryResult<i64> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .filter(|u| search.map_or(true, |s| contains_ci(&u.email, s) || contains_ci(&u.name, s)))
            .count() as i64)
    }

    async fn count_by_plan(&self) -> RepositoryResult<Vec<(Plan, i64)>> {
        let tables = self.tables.lock().unwrap();
        Ok([Plan::Free, Plan::Premium, Plan::PremiumCortesia]
            .into_iter()
            .map(|plan| (plan, tables.users.iter().filter(|u| u.plan == plan).count() as i64))
            .filter(|(_, count)| *count > 0)
            .collect())
    }
}

#[async_trait]
impl ClientRepository for MemoryStore {
    async fn insert(&self, client: Client) -> RepositoryResult<Client> {
        self.tables.lock().unwrap().clients.push(client.clone());
        Ok(client)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<Option<Client>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.clients.iter().find(|c| c.id == id && c.user_id == user_id).cloned())
    }

    async fn update(&self, client: &Client) -> RepositoryResult<Client> {
        let mut tables = self.tables.lock().unwrap();
        let stored = tables
            .clients
            .iter_mut()
            .find(|c| c.id == client.id && c.user_id == client.user_id)
            .ok_or_else(|| RepositoryError::not_found("Client not found"))?;
        *stored = client.clone();
        Ok(client.clone())
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.clients.len();
        tables.clients.retain(|c| !(c.id == id && c.user_id == user_id));
        if tables.clients.len() == before {
            return Err(RepositoryError::not_found("Client not found"));
        }
        Ok(())
    }

    async fn list(&self, user_id: Uuid, search: Option<&str>, page: u32, limit: u32) -> RepositoryResult<Vec<Client>> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Client> = tables
            .clients
            .iter()
            .filter(|c| c.user_id == user_id)
            .filter(|c| {
                search.map_or(true, |s| {
                    contains_ci(&c.name, s) || c.email.as_deref().map_or(false, |e| contains_ci(e, s))
                })
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(rows, page, limit))
    }

    async fn count(&self, user_id: Uuid, search: Option<&str>) -> RepositoryResult<i64> {
        let rows = ClientRepository::list(self, user_id, search, 1, u32::MAX).await?;
        Ok(rows.len() as i64)
    }

    async fn count_quotes(&self, client_id: Uuid) -> RepositoryResult<i64> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.quotes.iter().filter(|q| q.client_id == client_id).count() as i64)
    }
}

#[async_trait]
impl QuoteRepository for MemoryStore {
    async fn insert(&self, quote: Quote, items: Vec<QuoteItem>) -> RepositoryResult<QuoteWithItems> {
        let mut tables = self.tables.lock().unwrap();
        if tables.quotes.iter().any(|q| q.user_id == quote.user_id && q.number == quote.number) {
            return Err(RepositoryError::already_exists("Quote number already used"));
        }
        tables.quotes.push(quote.clone());
        tables.items.extend(items.iter().cloned());
        Ok(QuoteWithItems { quote, items })
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<Option<Quote>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.quotes.iter().find(|q| q.id == id && q.user_id == user_id).cloned())
    }

    async fn find_by_public_token(&self, token: Uuid) -> RepositoryResult<Option<Quote>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.quotes.iter().find(|q| q.public_token == token).cloned())
    }

    async fn items(&self, quote_id: Uuid) -> RepositoryResult<Vec<QuoteItem>> {
        let tables = self.tables.lock().unwrap();
        let mut items: Vec<QuoteItem> = tables.items.iter().filter(|i| i.quote_id == quote_id).cloned().collect();
        items.sort_by_key(|i| i.position);
        Ok(items)
    }

    async fn replace(&self, quote: &Quote, items: Vec<QuoteItem>) -> RepositoryResult<QuoteWithItems> {
        let mut tables = self.tables.lock().unwrap();
        let stored = tables
            .quotes
            .iter_mut()
            .find(|q| q.id == quote.id && q.user_id == quote.user_id)
            .ok_or_else(|| RepositoryError::not_found("Quote not found"))?;
        stored.client_id = quote.client_id;
        stored.title = quote.title.clone();
        stored.description = quote.description.clone();
        stored.subtotal_cents = quote.subtotal_cents;
        stored.discount_cents = quote.discount_cents;
        stored.total_cents = quote.total_cents;
        stored.valid_until = quote.valid_until;
        stored.notes = quote.notes.clone();
        stored.payment_terms = quote.payment_terms.clone();
        stored.updated_at = Utc::now();
        let updated = stored.clone();
        tables.items.retain(|i| i.quote_id != quote.id);
        tables.items.extend(items.iter().cloned());
        Ok(QuoteWithItems { quote: updated, items })
    }

    async fn transition(&self, quote: &Quote, from: QuoteStatus) -> RepositoryResult<Option<Quote>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(stored) = tables.quotes.iter_mut().find(|q| q.id == quote.id && q.status == from) else {
            return Ok(None);
        };
        stored.status = quote.status;
        stored.sent_at = quote.sent_at;
        stored.approved_at = quote.approved_at;
        stored.rejected_at = quote.rejected_at;
        stored.rejection_reason = quote.rejection_reason.clone();
        stored.paid_at = quote.paid_at;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn mark_viewed(&self, id: Uuid, at: DateTime<Utc>) -> RepositoryResult<Option<Quote>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(stored) = tables.quotes.iter_mut().find(|q| q.id == id && q.viewed_at.is_none()) else {
            return Ok(None);
        };
        stored.viewed_at = Some(at);
        Ok(Some(stored.clone()))
    }

    async fn record_payment(&self, quote: &Quote, payment: &Payment) -> RepositoryResult<Option<Quote>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(stored) = tables
            .quotes
            .iter_mut()
            .find(|q| q.id == quote.id && q.status == QuoteStatus::Approved)
        else {
            return Ok(None);
        };
        stored.status = QuoteStatus::Paid;
        stored.paid_at = Some(payment.paid_at);
        stored.updated_at = Utc::now();
        let paid = stored.clone();
        tables.payments.push(payment.clone());
        Ok(Some(paid))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.quotes.len();
        tables.quotes.retain(|q| !(q.id == id && q.user_id == user_id));
        if tables.quotes.len() == before {
            return Err(RepositoryError::not_found("Quote not found"));
        }
        tables.items.retain(|i| i.quote_id != id);
        Ok(())
    }

    async fn list(&self, user_id: Uuid, filter: &QuoteFilter, page: u32, limit: u32) -> RepositoryResult<Vec<Quote>> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Quote> =
            tables.quotes.iter().filter(|q| quote_matches(q, user_id, filter)).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.number.cmp(&a.number)));
        Ok(paginate(rows, page, limit))
    }

    async fn count(&self, user_id: Uuid, filter: &QuoteFilter) -> RepositoryResult<i64> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.quotes.iter().filter(|q| quote_matches(q, user_id, filter)).count() as i64)
    }

    async fn next_number(&self, user_id: Uuid) -> RepositoryResult<i32> {
        let tables = self.tables.lock().unwrap();
        let max = tables.quotes.iter().filter(|q| q.user_id == user_id).map(|q| q.number).max();
        Ok(max.unwrap_or(0) + 1)
    }

    async fn status_totals(&self, user_id: Uuid) -> RepositoryResult<Vec<QuoteStatusTotal>> {
        let tables = self.tables.lock().unwrap();
        Ok(QuoteStatus::ALL
            .into_iter()
            .filter_map(|status| {
                let rows: Vec<&Quote> =
                    tables.quotes.iter().filter(|q| q.user_id == user_id && q.status == status).collect();
                (!rows.is_empty()).then(|| QuoteStatusTotal {
                    status,
                    count: rows.len() as i64,
                    total_cents: rows.iter().map(|q| q.total_cents).sum(),
                })
            })
            .collect())
    }

    async fn count_all(&self) -> RepositoryResult<i64> {
        Ok(self.tables.lock().unwrap().quotes.len() as i64)
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn insert(&self, review: Review) -> RepositoryResult<Review> {
        let mut tables = self.tables.lock().unwrap();
        if tables.reviews.iter().any(|r| r.quote_id == review.quote_id) {
            return Err(RepositoryError::already_exists("Quote already reviewed"));
        }
        tables.reviews.push(review.clone());
        Ok(review)
    }

    async fn find_by_quote(&self, quote_id: Uuid) -> RepositoryResult<Option<Review>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.reviews.iter().find(|r| r.quote_id == quote_id).cloned())
    }

    async fn list_by_user(&self, user_id: Uuid, page: u32, limit: u32) -> RepositoryResult<Vec<Review>> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Review> = tables.reviews.iter().filter(|r| r.user_id == user_id).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page, limit))
    }

    async fn count_by_user(&self, user_id: Uuid) -> RepositoryResult<i64> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.reviews.iter().filter(|r| r.user_id == user_id).count() as i64)
    }

    async fn respond(
        &self,
        user_id: Uuid,
        id: Uuid,
        response: &str,
        at: DateTime<Utc>,
    ) -> RepositoryResult<Option<Review>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(review) = tables.reviews.iter_mut().find(|r| r.id == id && r.user_id == user_id) else {
            return Ok(None);
        };
        review.response = Some(response.to_string());
        review.responded_at = Some(at);
        Ok(Some(review.clone()))
    }

    async fn summary(&self, user_id: Uuid) -> RepositoryResult<RatingSummary> {
        let tables = self.tables.lock().unwrap();
        let ratings: Vec<i32> = tables.reviews.iter().filter(|r| r.user_id == user_id).map(|r| r.rating).collect();
        let count = ratings.len() as i64;
        let average = (count > 0).then(|| ratings.iter().sum::<i32>() as f64 / count as f64);
        Ok(RatingSummary { count, average })
    }
}

#[async_trait]
impl ReferralRepository for MemoryStore {
    async fn record_with_reward(&self, referral: Referral) -> RepositoryResult<Referral> {
        let mut tables = self.tables.lock().unwrap();
        if tables.referrals.iter().any(|r| r.referred_id == referral.referred_id) {
            return Err(RepositoryError::already_exists("User was already referred"));
        }
        let referrer = tables
            .users
            .iter_mut()
            .find(|u| u.id == referral.referrer_id)
            .ok_or_else(|| RepositoryError::not_found("Referrer not found"))?;
        referrer.referral_count += 1;
        match referral.reward_type {
            RewardType::BonusQuotes => referrer.bonus_quotes += referral.reward_value,
            RewardType::PremiumDays => {
                if let Some(expires) = referrer.premium_expires_at {
                    let days = Duration::days(referral.reward_value as i64);
                    referrer.premium_expires_at = Some(expires.max(referral.created_at) + days);
                }
            }
        }
        tables.referrals.push(referral.clone());
        Ok(referral)
    }

    async fn find_by_referred(&self, referred_id: Uuid) -> RepositoryResult<Option<Referral>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.referrals.iter().find(|r| r.referred_id == referred_id).cloned())
    }

    async fn list_by_referrer(&self, referrer_id: Uuid) -> RepositoryResult<Vec<Referral>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.referrals.iter().filter(|r| r.referrer_id == referrer_id).cloned().collect())
    }
}

#[async_trait]
impl SavedItemRepository for MemoryStore {
    async fn insert(&self, item: SavedItem) -> RepositoryResult<SavedItem> {
        self.tables.lock().unwrap().saved_items.push(item.clone());
        Ok(item)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<Option<SavedItem>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.saved_items.iter().find(|i| i.id == id && i.user_id == user_id).cloned())
    }

    async fn update(&self, item: &SavedItem) -> RepositoryResult<SavedItem> {
        let mut tables = self.tables.lock().unwrap();
        let stored = tables
            .saved_items
            .iter_mut()
            .find(|i| i.id == item.id && i.user_id == item.user_id)
            .ok_or_else(|| RepositoryError::not_found("Saved item not found"))?;
        *stored = item.clone();
        Ok(item.clone())
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.saved_items.len();
        tables.saved_items.retain(|i| !(i.id == id && i.user_id == user_id));
        if tables.saved_items.len() == before {
            return Err(RepositoryError::not_found("Saved item not found"));
        }
        Ok(())
    }

    async fn list(&self, user_id: Uuid, search: Option<&str>) -> RepositoryResult<Vec<SavedItem>> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<SavedItem> = tables
            .saved_items
            .iter()
            .filter(|i| i.user_id == user_id && search.map_or(true, |s| contains_ci(&i.description, s)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.description.cmp(&b.description));
        Ok(rows)
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert(&self, notification: Notification) -> RepositoryResult<Notification> {
        self.tables.lock().unwrap().notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list(&self, user_id: Uuid, unread_only: bool, limit: u32) -> RepositoryResult<Vec<Notification>> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Notification> = tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && (!unread_only || n.read_at.is_none()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn count_unread(&self, user_id: Uuid) -> RepositoryResult<i64> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.notifications.iter().filter(|n| n.user_id == user_id && n.read_at.is_none()).count() as i64)
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid, at: DateTime<Utc>) -> RepositoryResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables.notifications.iter_mut().find(|n| n.id == id && n.user_id == user_id) {
            Some(notification) => {
                notification.read_at.get_or_insert(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid, at: DateTime<Utc>) -> RepositoryResult<u64> {
        let mut tables = self.tables.lock().unwrap();
        let mut updated = 0;
        for notification in tables
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && n.read_at.is_none())
        {
            notification.read_at = Some(at);
            updated += 1;
        }
        Ok(updated)
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn find_by_quote(&self, quote_id: Uuid) -> RepositoryResult<Option<Payment>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.payments.iter().find(|p| p.quote_id == quote_id).cloned())
    }
}

type Interleaved = Box<dyn FnOnce(&MemoryStore) + Send>;

/// User repository over a [`MemoryStore`] that lets another writer commit a
/// change right after a service reads a given user, between its read and
/// its write.
pub struct InterleavedUsers {
    store: Arc<MemoryStore>,
    after_read: Mutex<Option<(Uuid, Interleaved)>>,
}

impl InterleavedUsers {
    pub fn new(store: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(InterleavedUsers { store, after_read: Mutex::new(None) })
    }

    /// Runs `change` once, just after the next `find_by_id(user_id)`.
    pub fn after_next_read(&self, user_id: Uuid, change: impl FnOnce(&MemoryStore) + Send + 'static) {
        *self.after_read.lock().unwrap() = Some((user_id, Box::new(change)));
    }
}

#[async_trait]
impl UserRepository for InterleavedUsers {
    async fn insert(&self, user: User) -> RepositoryResult<User> {
        <MemoryStore as UserRepository>::insert(&self.store, user).await
    }

    async fn update_profile(&self, user: &User) -> RepositoryResult<User> {
        self.store.update_profile(user).await
    }

    async fn link_firebase_uid(&self, id: Uuid, uid: &str) -> RepositoryResult<Option<User>> {
        self.store.link_firebase_uid(id, uid).await
    }

    async fn set_plan(&self, id: Uuid, plan: Plan, expires_at: Option<DateTime<Utc>>) -> RepositoryResult<User> {
        self.store.set_plan(id, plan, expires_at).await
    }

    async fn downgrade_expired(&self, id: Uuid, now: DateTime<Utc>) -> RepositoryResult<Option<User>> {
        self.store.downgrade_expired(id, now).await
    }

    async fn roll_quota_period(&self, id: Uuid, period_start: NaiveDate) -> RepositoryResult<Option<User>> {
        UserRepository::roll_quota_period(self.store.as_ref(), id, period_start).await
    }

    async fn consume_quote_slot(
        &self,
        id: Uuid,
        monthly_limit: i32,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<User>> {
        UserRepository::consume_quote_slot(self.store.as_ref(), id, monthly_limit, now).await
    }

    async fn release_quote_slot(&self, id: Uuid, bonus: bool) -> RepositoryResult<()> {
        self.store.release_quote_slot(id, bonus).await
    }

    async fn add_bonus_quotes(&self, id: Uuid, amount: i32) -> RepositoryResult<User> {
        self.store.add_bonus_quotes(id, amount).await
    }

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> RepositoryResult<User> {
        self.store.set_admin(id, is_admin).await
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let found = self.store.find_by_id(id).await;
        let pending = {
            let mut slot = self.after_read.lock().unwrap();
            match slot.take() {
                Some((target, change)) if target == id => Some(change),
                other => {
                    *slot = other;
                    None
                }
            }
        };
        if let Some(change) = pending {
            change(&self.store);
        }
        found
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.store.find_by_email(email).await
    }

    async fn find_by_firebase_uid(&self, uid: &str) -> RepositoryResult<Option<User>> {
        self.store.find_by_firebase_uid(uid).await
    }

    async fn find_by_referral_code(&self, code: &str) -> RepositoryResult<Option<User>> {
        self.store.find_by_referral_code(code).await
    }

    async fn list(&self, search: Option<&str>, page: u32, limit: u32) -> RepositoryResult<Vec<User>> {
        <MemoryStore as UserRepository>::list(&self.store, search, page, limit).await
    }

    async fn count(&self, search: Option<&str>) -> RepositoryResult<i64> {
        <MemoryStore as UserRepository>::count(&self.store, search).await
    }

    async fn count_by_plan(&self) -> RepositoryResult<Vec<(Plan, i64)>> {
        self.store.count_by_plan().await
    }
}

/// Records outgoing quote emails instead of talking SMTP.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<QuoteEmail>>,
    pub fail: bool,
}

#[async_trait]
impl QuoteMailer for RecordingMailer {
    async fn send_quote(&self, email: QuoteEmail) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError::SmtpError("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub services: Services,
    pub jwt: Arc<JwtTokenUtilsImpl>,
    pub mailer: Arc<RecordingMailer>,
}

/// Accepts tokens of the form `valid:<uid>:<email>`, or `unverified:<uid>:<email>` for an
/// address Firebase has not confirmed; `keys-down-token` simulates an unreachable key endpoint.
pub struct FakeVerifier;

#[async_trait]
impl IdTokenVerifier for FakeVerifier {
    async fn verify(&self, id_token: &str) -> Result<FirebaseIdentity, FirebaseError> {
        if id_token == "keys-down-token" {
            return Err(FirebaseError::KeyFetch("timeout".to_string()));
        }
        let mut parts = id_token.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(kind @ ("valid" | "unverified")), Some(uid), email) => Ok(FirebaseIdentity {
                uid: uid.to_string(),
                email: email.filter(|e| !e.is_empty()).map(str::to_string),
                email_verified: kind == "valid",
                name: Some("Carlos Lima".to_string()),
            }),
            _ => Err(FirebaseError::InvalidToken("bad signature".to_string())),
        }
    }
}

pub fn test_app() -> TestApp {
    test_app_with(RecordingMailer::default(), Some(Arc::new(FakeVerifier)))
}

pub fn test_app_with(mailer: RecordingMailer, firebase: Option<Arc<dyn IdTokenVerifier>>) -> TestApp {
    let store = MemoryStore::new();
    let repos = store.repositories();
    build_test_app(store, repos, mailer, firebase)
}

/// Builds the app over `repos`, which may wrap parts of `store`.
pub fn test_app_with_repositories(store: Arc<MemoryStore>, repos: Repositories) -> TestApp {
    build_test_app(store, repos, RecordingMailer::default(), Some(Arc::new(FakeVerifier)))
}

/// Test app whose user repository is an [`InterleavedUsers`] over a fresh store.
pub fn test_app_with_interleaved_users() -> (TestApp, Arc<InterleavedUsers>) {
    let store = MemoryStore::new();
    let users = InterleavedUsers::new(store.clone());
    let mut repos = store.repositories();
    repos.users = users.clone();
    (test_app_with_repositories(store, repos), users)
}

fn build_test_app(
    store: Arc<MemoryStore>,
    repos: Repositories,
    mailer: RecordingMailer,
    firebase: Option<Arc<dyn IdTokenVerifier>>,
) -> TestApp {
    let jwt = Arc::new(JwtTokenUtilsImpl::new(JwtConfig::default()));
    let mailer = Arc::new(mailer);
    let integrations = Integrations {
        mailer: Some(mailer.clone()),
        firebase,
    };
    let settings = ServiceSettings {
        policy: PlanPolicy::default(),
        public_app_url: "https://app.fechou.test".to_string(),
    };
    let services = Services::new(repos, jwt.clone(), integrations, settings);
    let router = build_router(&services, None);
    TestApp {
        router,
        store,
        services,
        jwt,
        mailer,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub async fn request(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, body }
    }

    /// Sends `body` verbatim, with `content_type` when given.
    pub async fn request_raw(&self, method: &str, uri: &str, content_type: Option<&str>, body: &str) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        let resp = self
            .router
            .clone()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, body }
    }

    /// Registers a user through the API and returns `(user_id, access_token)`.
    pub async fn register(&self, email: &str) -> (Uuid, String) {
        self.register_with(serde_json::json!({
            "name": "Maria Souza",
            "email": email,
            "password": PASSWORD,
            "business_name": "Souza Reformas",
            "phone": "11999990000"
        }))
        .await
    }

    pub async fn register_with(&self, body: Value) -> (Uuid, String) {
        let resp = self.request("POST", "/users/register", None, Some(body)).await;
        assert_eq!(resp.status, StatusCode::CREATED, "register failed: {}", resp.body);
        let id = resp.body["user"]["id"].as_str().unwrap().parse().unwrap();
        let token = resp.body["tokens"]["access_token"].as_str().unwrap().to_string();
        (id, token)
    }

    /// Inserts a FREE user straight into storage, skipping password hashing.
    pub fn seed_user(&self, email: &str) -> (Uuid, String) {
        let mut user = User::new(email.to_string(), "Maria Souza".to_string(), generate_referral_code(), Utc::now());
        user.business_name = Some("Souza Reformas".to_string());
        user.document = Some("12.345.678/0001-90".to_string());
        self.store.put_user(user.clone());
        let token = self
            .jwt
            .generate_access_token(&user.id.to_string(), &user.email, user.role())
            .unwrap();
        (user.id, token)
    }

    /// Promotes the user in storage and mints a token carrying the admin role.
    pub fn make_admin(&self, user_id: Uuid) -> String {
        let mut user = self.store.user(user_id);
        user.is_admin = true;
        self.store.put_user(user.clone());
        self.jwt
            .generate_access_token(&user.id.to_string(), &user.email, user.role())
            .unwrap()
    }

    pub async fn create_client(&self, token: &str, name: &str) -> Uuid {
        let resp = self
            .request(
                "POST",
                "/clients",
                Some(token),
                Some(serde_json::json!({
                    "name": name,
                    "email": "cliente@example.com",
                    "phone": "11988887777",
                    "document": "123.456.789-00",
                    "city": "São Paulo",
                    "state": "SP"
                })),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create client failed: {}", resp.body);
        resp.body["id"].as_str().unwrap().parse().unwrap()
    }

    /// Creates a two-line quote worth R$ 1.150,00 after a R$ 50,00 discount.
    pub async fn create_quote(&self, token: &str, client_id: Uuid) -> TestResponse {
        self.request(
            "POST",
            "/quotes",
            Some(token),
            Some(serde_json::json!({
                "client_id": client_id,
                "title": "Pintura do apartamento",
                "items": [
                    { "description": "Mão de obra", "quantity": 1.0, "unit_price_cents": 100000 },
                    { "description": "Tinta acrílica", "quantity": 2.0, "unit_price_cents": 10000 }
                ],
                "discount_cents": 5000,
                "payment_terms": "50% na aprovação"
            })),
        )
        .await
    }

    pub async fn create_quote_id(&self, token: &str, client_id: Uuid) -> Uuid {
        let resp = self.create_quote(token, client_id).await;
        assert_eq!(resp.status, StatusCode::CREATED, "create quote failed: {}", resp.body);
        resp.body["id"].as_str().unwrap().parse().unwrap()
    }

    /// Creates and sends a quote, returning `(quote_id, public_token)`.
    pub async fn sent_quote(&self, token: &str, client_id: Uuid) -> (Uuid, Uuid) {
        let quote_id = self.create_quote_id(token, client_id).await;
        let resp = self.request("POST", &format!("/quotes/{}/send", quote_id), Some(token), None).await;
        assert_eq!(resp.status, StatusCode::OK, "send failed: {}", resp.body);
        let public_token = resp.body["public_token"].as_str().unwrap().parse().unwrap();
        (quote_id, public_token)
    }
}
