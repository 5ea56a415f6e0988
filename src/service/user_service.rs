use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::AdminUserConfig;
use crate::dto::common::non_blank;
use crate::dto::user_dto::{
    AuthResponse, AuthTokens, FirebaseLoginRequest, LoginRequest, ReferralSummary, RegisterRequest,
    UpdateProfileRequest,
};
use crate::model::notification::NotificationKind;
use crate::model::referral::{Referral, RewardType};
use crate::model::user::{month_start, PublicUser, User};
use crate::repository::referral_repo::ReferralRepository;
use crate::repository::repository_error::RepositoryError;
use crate::repository::user_repo::UserRepository;
use crate::service::notification_service::NotificationService;
use crate::service::plan_service::{self, PlanPolicy, PlanUsage};
use crate::util::error::ServiceError;
use crate::util::firebase::{FirebaseError, IdTokenVerifier};
use crate::util::jwt::{JwtTokenUtils, JwtTokenUtilsImpl, TokenPair};
use crate::util::password::{PasswordUtils, PasswordUtilsImpl};
use crate::util::referral_code::{generate_referral_code, normalize_referral_code};

const REFERRAL_CODE_ATTEMPTS: usize = 5;

#[async_trait]
pub trait UserService: Send + Sync {
    async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, ServiceError>;
    async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ServiceError>;
    async fn refresh_token(&self, refresh_token: String) -> Result<AuthTokens, ServiceError>;
    async fn firebase_login(&self, request: FirebaseLoginRequest) -> Result<AuthResponse, ServiceError>;
    async fn get_profile(&self, user_id: Uuid) -> Result<PublicUser, ServiceError>;
    async fn update_profile(&self, user_id: Uuid, request: UpdateProfileRequest) -> Result<PublicUser, ServiceError>;
    async fn get_plan_usage(&self, user_id: Uuid) -> Result<PlanUsage, ServiceError>;
    async fn referral_summary(&self, user_id: Uuid) -> Result<ReferralSummary, ServiceError>;
    /// Creates the configured admin account, or promotes it when it already exists.
    async fn ensure_admin(&self, config: &AdminUserConfig) -> Result<PublicUser, ServiceError>;
}

pub struct UserServiceImpl {
    pub user_repo: Arc<dyn UserRepository>,
    pub referral_repo: Arc<dyn ReferralRepository>,
    pub notifications: Arc<dyn NotificationService>,
    pub jwt_utils: Arc<JwtTokenUtilsImpl>,
    pub firebase: Option<Arc<dyn IdTokenVerifier>>,
    pub policy: PlanPolicy,
}

impl UserServiceImpl {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        referral_repo: Arc<dyn ReferralRepository>,
        notifications: Arc<dyn NotificationService>,
        jwt_utils: Arc<JwtTokenUtilsImpl>,
        firebase: Option<Arc<dyn IdTokenVerifier>>,
        policy: PlanPolicy,
    ) -> Self {
        Self { user_repo, referral_repo, notifications, jwt_utils, firebase, policy }
    }

    fn issue_tokens(&self, user: &User) -> Result<AuthTokens, ServiceError> {
        let pair: TokenPair = self
            .jwt_utils
            .generate_token_pair(&user.id.to_string(), &user.email, user.role())
            .map_err(|e| ServiceError::InternalError(format!("JWT error: {}", e)))?;
        Ok(AuthTokens {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            token_type: pair.token_type,
        })
    }

    fn auth_response(&self, user: User) -> Result<AuthResponse, ServiceError> {
        let tokens = self.issue_tokens(&user)?;
        Ok(AuthResponse { user: PublicUser::from(user), tokens })
    }

    async fn unique_referral_code(&self) -> Result<String, ServiceError> {
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let code = generate_referral_code();
            if self.user_repo.find_by_referral_code(&code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(ServiceError::InternalError("Could not generate a unique referral code".to_string()))
    }

    /// Resolves a referral code sent at sign-up; unknown codes are rejected.
    async fn resolve_referrer(&self, code: Option<&str>) -> Result<Option<User>, ServiceError> {
        let Some(code) = code.map(normalize_referral_code).filter(|c| !c.is_empty()) else {
            return Ok(None);
        };
        match self.user_repo.find_by_referral_code(&code).await? {
            Some(referrer) => Ok(Some(referrer)),
            None => {
                warn!(code = %code, "Unknown referral code");
                Err(ServiceError::InvalidInput("Invalid referral code".to_string()))
            }
        }
    }

    async fn create_account(&self, mut user: User, referrer: Option<User>) -> Result<User, ServiceError> {
        if self.user_repo.find_by_email(&user.email).await?.is_some() {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }
        user.referral_code = self.unique_referral_code().await?;
        user.referred_by = referrer.as_ref().map(|r| r.id);

        let inserted = self.user_repo.insert(user).await;
        match &inserted {
            Ok(_) => info!("User inserted successfully"),
            Err(e) => error!("Failed to insert user: {e}"),
        }
        let inserted = inserted.map_err(|e| match e {
            RepositoryError::AlreadyExists(_) => ServiceError::Conflict("Email already registered".to_string()),
            other => ServiceError::from(other),
        })?;

        // The account exists at this point; a failed reward must not fail the sign-up.
        if let Some(referrer) = referrer {
            if let Err(e) = self.reward_referrer(referrer, &inserted).await {
                error!(user_id = %inserted.id, "Referral reward not applied: {e}");
            }
        }
        Ok(inserted)
    }

    #[instrument(skip(self, referrer, referred), fields(referrer_id = %referrer.id, referred_id = %referred.id))]
    async fn reward_referrer(&self, referrer: User, referred: &User) -> Result<(), ServiceError> {
        let now = Utc::now();
        // The reward kind follows the referrer's current plan; the counters are
        // incremented in storage, not written back from this copy.
        let mut referrer = load_fresh(self.user_repo.as_ref(), referrer, now).await?;
        let reward = plan_service::apply_referral_reward(&mut referrer, &self.policy, now);

        // The unique referred_id makes this the single point where a reward can be granted.
        self.referral_repo
            .record_with_reward(Referral {
                id: Uuid::new_v4(),
                referrer_id: referrer.id,
                referred_id: referred.id,
                reward_type: reward.reward_type,
                reward_value: reward.reward_value,
                created_at: now,
            })
            .await?;
        info!(reward = ?reward, "Referral reward applied");

        let message = match reward.reward_type {
            RewardType::BonusQuotes => format!(
                "{} se cadastrou com o seu código. Você ganhou {} orçamentos extras.",
                referred.name, reward.reward_value
            ),
            RewardType::PremiumDays => format!(
                "{} se cadastrou com o seu código. Você ganhou {} dias de Premium.",
                referred.name, reward.reward_value
            ),
        };
        self.notifications
            .notify(referrer.id, NotificationKind::ReferralReward, "Nova indicação".to_string(), message, None)
            .await;
        Ok(())
    }
}

/// Loads a user and persists lazy state changes: expired premium plans fall
/// back to FREE and a stale quota period is reset.
pub async fn load_user(repo: &dyn UserRepository, user_id: Uuid, now: DateTime<Utc>) -> Result<User, ServiceError> {
    let user = repo
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
    load_fresh(repo, user, now).await
}

async fn load_fresh(repo: &dyn UserRepository, mut user: User, now: DateTime<Utc>) -> Result<User, ServiceError> {
    if plan_service::is_premium_expired(&user, now) {
        match repo.downgrade_expired(user.id, now).await? {
            Some(updated) => {
                info!(user_id = %user.id, "Premium plan expired, downgraded to FREE");
                user = updated;
            }
            None => {
                plan_service::downgrade_if_expired(&mut user, now);
            }
        }
    }
    let period = month_start(now);
    if user.quota_period_start != period {
        match repo.roll_quota_period(user.id, period).await? {
            Some(updated) => user = updated,
            None => {
                plan_service::roll_quota_period(&mut user, now);
            }
        }
    }
    Ok(user)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl UserService for UserServiceImpl {
    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        info!("Registering new user");
        let referrer = self.resolve_referrer(request.referral_code.as_deref()).await?;

        let hash = PasswordUtilsImpl::hash_password(&request.password)
            .map_err(|e| ServiceError::InternalError(format!("Password hash error: {}", e)))?;

        let mut user = User::new(normalize_email(&request.email), request.name.trim().to_string(), String::new(), Utc::now());
        user.password_hash = Some(hash);
        user.business_name = non_blank(request.business_name);
        user.phone = non_blank(request.phone);

        let user = self.create_account(user, referrer).await?;
        info!(user_id = %user.id, "User registered successfully");
        self.auth_response(user)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ServiceError> {
        info!("User login attempt");
        let invalid = || ServiceError::Unauthorized("Invalid email or password".to_string());

        let user = self.user_repo.find_by_email(&normalize_email(&request.email)).await?;
        let Some(user) = user else {
            warn!("Login for unknown email");
            return Err(invalid());
        };
        let Some(hash) = user.password_hash.as_deref() else {
            warn!("Login with password for an account without one");
            return Err(invalid());
        };
        let valid = PasswordUtilsImpl::verify_password(&request.password, hash)
            .map_err(|e| ServiceError::InternalError(format!("Password verify error: {}", e)))?;
        if !valid {
            warn!("Invalid credentials");
            return Err(invalid());
        }

        let user = load_fresh(self.user_repo.as_ref(), user, Utc::now()).await?;
        info!(user_id = %user.id, "User logged in successfully");
        self.auth_response(user)
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh_token(&self, refresh_token: String) -> Result<AuthTokens, ServiceError> {
        info!("Refreshing token");
        let claims = self
            .jwt_utils
            .validate_refresh_token(&refresh_token)
            .map_err(|e| ServiceError::Unauthorized(format!("Invalid refresh token: {}", e)))?;
        let user_id = claims
            .user_id()
            .map_err(|e| ServiceError::Unauthorized(format!("Invalid refresh token: {}", e)))?;
        // Role changes since the last login take effect on refresh.
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("User no longer exists".to_string()))?;
        let tokens = self.issue_tokens(&user)?;
        info!("Token refreshed successfully");
        Ok(tokens)
    }

    #[instrument(skip(self, request))]
    async fn firebase_login(&self, request: FirebaseLoginRequest) -> Result<AuthResponse, ServiceError> {
        let verifier = self
            .firebase
            .as_ref()
            .ok_or_else(|| ServiceError::InternalError("Firebase authentication is not configured".to_string()))?;

        let identity = verifier.verify(&request.id_token).await.map_err(|e| match e {
            FirebaseError::KeyFetch(msg) => ServiceError::InternalError(format!("Firebase keys unavailable: {}", msg)),
            other => ServiceError::Unauthorized(format!("Invalid Firebase token: {}", other)),
        })?;
        let now = Utc::now();

        if let Some(user) = self.user_repo.find_by_firebase_uid(&identity.uid).await? {
            info!(user_id = %user.id, "Firebase login for linked user");
            let user = load_fresh(self.user_repo.as_ref(), user, now).await?;
            return self.auth_response(user);
        }

        let email = identity
            .email
            .as_deref()
            .map(normalize_email)
            .ok_or_else(|| ServiceError::Unauthorized("Firebase account has no email".to_string()))?;
        // Only verified addresses may link to or create an account.
        if !identity.email_verified {
            warn!(uid = %identity.uid, "Firebase login with unverified email");
            return Err(ServiceError::Unauthorized("Firebase email address is not verified".to_string()));
        }

        if let Some(user) = self.user_repo.find_by_email(&email).await? {
            info!(user_id = %user.id, "Linking Firebase account to existing user");
            let Some(user) = self.user_repo.link_firebase_uid(user.id, &identity.uid).await? else {
                warn!(user_id = %user.id, "Account already linked to another Firebase user");
                return Err(ServiceError::Conflict("Account is linked to a different Firebase sign-in".to_string()));
            };
            let user = load_fresh(self.user_repo.as_ref(), user, now).await?;
            return self.auth_response(user);
        }

        let referrer = self.resolve_referrer(request.referral_code.as_deref()).await?;
        let name = identity
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        let mut user = User::new(email, name, String::new(), now);
        user.firebase_uid = Some(identity.uid);

        let user = self.create_account(user, referrer).await?;
        info!(user_id = %user.id, "User created from Firebase login");
        self.auth_response(user)
    }

    #[instrument(skip(self))]
    async fn get_profile(&self, user_id: Uuid) -> Result<PublicUser, ServiceError> {
        let user = load_user(self.user_repo.as_ref(), user_id, Utc::now()).await?;
        Ok(PublicUser::from(user))
    }

    #[instrument(skip(self, request))]
    async fn update_profile(&self, user_id: Uuid, request: UpdateProfileRequest) -> Result<PublicUser, ServiceError> {
        let mut user = load_user(self.user_repo.as_ref(), user_id, Utc::now()).await?;

        if let Some(name) = non_blank(request.name) {
            user.name = name;
        }
        if request.business_name.is_some() {
            user.business_name = non_blank(request.business_name);
        }
        if request.phone.is_some() {
            user.phone = non_blank(request.phone);
        }
        if request.document.is_some() {
            user.document = non_blank(request.document);
        }
        if request.address.is_some() {
            user.address = non_blank(request.address);
        }
        if request.city.is_some() {
            user.city = non_blank(request.city);
        }
        if request.state.is_some() {
            user.state = non_blank(request.state).map(|s| s.to_uppercase());
        }
        if request.zip_code.is_some() {
            user.zip_code = non_blank(request.zip_code);
        }

        let updated = self.user_repo.update_profile(&user).await;
        match &updated {
            Ok(_) => info!("Profile updated"),
            Err(e) => error!("Failed to update profile: {e}"),
        }
        Ok(PublicUser::from(updated?))
    }

    #[instrument(skip(self))]
    async fn get_plan_usage(&self, user_id: Uuid) -> Result<PlanUsage, ServiceError> {
        let now = Utc::now();
        let user = load_user(self.user_repo.as_ref(), user_id, now).await?;
        Ok(plan_service::plan_usage(&user, &self.policy, now))
    }

    #[instrument(skip(self))]
    async fn referral_summary(&self, user_id: Uuid) -> Result<ReferralSummary, ServiceError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        let referrals = self.referral_repo.list_by_referrer(user_id).await?;
        Ok(ReferralSummary {
            referral_code: user.referral_code,
            referral_count: user.referral_count,
            referrals,
        })
    }

    #[instrument(skip(self, config), fields(email = %config.email))]
    async fn ensure_admin(&self, config: &AdminUserConfig) -> Result<PublicUser, ServiceError> {
        let email = normalize_email(&config.email);
        if let Some(mut existing) = self.user_repo.find_by_email(&email).await? {
            if !existing.is_admin {
                existing = self.user_repo.set_admin(existing.id, true).await?;
                info!("Existing user promoted to admin");
            } else {
                info!("Admin user already present");
            }
            return Ok(PublicUser::from(existing));
        }

        let hash = PasswordUtilsImpl::hash_password(&config.password)
            .map_err(|e| ServiceError::InternalError(format!("Password hash error: {}", e)))?;
        let mut user = User::new(email, config.name.clone(), String::new(), Utc::now());
        user.password_hash = Some(hash);
        user.is_admin = true;
        let user = self.create_account(user, None).await?;
        info!(user_id = %user.id, "Admin user created");
        Ok(PublicUser::from(user))
    }
}
