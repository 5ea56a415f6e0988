use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::config::FirebaseConfig;

#[derive(Debug, thiserror::Error)]
pub enum FirebaseError {
    #[error("Invalid ID token: {0}")]
    InvalidToken(String),
    #[error("Signing key not found: {0}")]
    UnknownKey(String),
    #[error("Failed to fetch signing keys: {0}")]
    KeyFetch(String),
}

/// Identity asserted by a verified Firebase ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<FirebaseIdentity, FirebaseError>;
}

struct CachedKeys {
    keys: JwkSet,
    expires_at: Instant,
}

/// Verifies Firebase Authentication ID tokens against Google's published keys.
pub struct FirebaseTokenVerifier {
    config: FirebaseConfig,
    http: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
}

impl FirebaseTokenVerifier {
    pub fn new(config: FirebaseConfig) -> Self {
        FirebaseTokenVerifier { config, http: reqwest::Client::new(), cache: RwLock::new(None) }
    }

    async fn keys(&self, force_refresh: bool) -> Result<JwkSet, FirebaseError> {
        if !force_refresh {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.expires_at > Instant::now()) {
                return Ok(cached.keys.clone());
            }
        }

        debug!("Fetching Firebase signing keys from {}", self.config.jwks_url);
        let response = self
            .http
            .get(&self.config.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!("Failed to fetch Firebase keys: {}", e);
                FirebaseError::KeyFetch(e.to_string())
            })?;

        let max_age = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(self.config.keys_cache_secs);

        let keys: JwkSet = response.json().await.map_err(|e| FirebaseError::KeyFetch(e.to_string()))?;
        info!("Fetched {} Firebase signing keys (cached for {}s)", keys.keys.len(), max_age);

        *self.cache.write().await = Some(CachedKeys {
            keys: keys.clone(),
            expires_at: Instant::now() + Duration::from_secs(max_age),
        });
        Ok(keys)
    }
}

#[async_trait]
impl IdTokenVerifier for FirebaseTokenVerifier {
    #[instrument(skip(self, id_token))]
    async fn verify(&self, id_token: &str) -> Result<FirebaseIdentity, FirebaseError> {
        let header = decode_header(id_token).map_err(|e| FirebaseError::InvalidToken(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(FirebaseError::InvalidToken(format!("unexpected algorithm {:?}", header.alg)));
        }
        let kid = header.kid.ok_or_else(|| FirebaseError::InvalidToken("missing kid".to_string()))?;

        // Google rotates keys; an unknown kid warrants one refetch.
        let mut keys = self.keys(false).await?;
        if keys.find(&kid).is_none() {
            warn!("Unknown Firebase key id {}, refreshing keys", kid);
            keys = self.keys(true).await?;
        }
        let jwk = keys.find(&kid).ok_or_else(|| FirebaseError::UnknownKey(kid.clone()))?;
        let decoding_key = DecodingKey::from_jwk(jwk).map_err(|e| FirebaseError::UnknownKey(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.config.project_id.as_str()]);
        validation.set_issuer(&[self.config.issuer()]);

        let claims = decode::<FirebaseClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| FirebaseError::InvalidToken(e.to_string()))?
            .claims;

        if claims.sub.is_empty() || claims.sub.len() > 128 {
            return Err(FirebaseError::InvalidToken("invalid subject".to_string()));
        }

        Ok(FirebaseIdentity {
            uid: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified,
            name: claims.name,
        })
    }
}

/// Extracts `max-age` seconds from a Cache-Control header value.
pub fn parse_max_age(header: &str) -> Option<u64> {
    header
        .split(',')
        .map(str::trim)
        .find_map(|directive| directive.strip_prefix("max-age="))
        .and_then(|v| v.parse().ok())
}
