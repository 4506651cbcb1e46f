/// Firebase ID token verification
///
/// Tokens are RS256 JWTs signed by one of the keys published at the
/// provider's JWKS endpoint. Keys are cached in process for a TTL and
/// refetched early when a token names a `kid` the cache does not hold
/// (the provider rotates keys). Fetches are serialized and at most one runs
/// per `MIN_REFETCH_INTERVAL`.
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::{IdTokenClaims, Identity, IdentityVerifier};
use crate::error::{AppError, Result};

/// JWKS key entry (RSA subset of RFC 7517)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwksKey {
    pub kty: String,
    pub kid: String,
    pub alg: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<JwksKey>,
}

const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(60);

struct CachedKeys {
    keys: HashMap<String, JwksKey>,
    fetched_at: Instant,
}

pub struct JwksVerifier {
    http: reqwest::Client,
    jwks_url: String,
    project_id: String,
    ttl: Duration,
    min_refetch_interval: Duration,
    cache: RwLock<Option<CachedKeys>>,
    /// Start of the last fetch attempt, successful or not
    last_fetch: Mutex<Option<Instant>>,
}

impl JwksVerifier {
    pub fn new(project_id: impl Into<String>, jwks_url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            jwks_url: jwks_url.into(),
            project_id: project_id.into(),
            ttl,
            min_refetch_interval: MIN_REFETCH_INTERVAL,
            cache: RwLock::new(None),
            last_fetch: Mutex::new(None),
        }
    }

    fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    async fn cached_key(&self, kid: &str) -> Option<JwksKey> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .and_then(|entry| entry.keys.get(kid).cloned())
    }

    async fn refresh(&self) -> Result<()> {
        debug!(url = %self.jwks_url, "Fetching JWKS");

        let jwks: Jwks = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| AppError::Internal(format!("JWKS fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("JWKS response malformed: {e}")))?;

        self.store(jwks).await;
        Ok(())
    }

    async fn store(&self, jwks: Jwks) {
        let keys = jwks
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();

        *self.cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
    }

    async fn key_for(&self, kid: &str) -> Result<JwksKey> {
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        // Concurrent misses queue here and reuse the fetch that ran first.
        let mut last_fetch = self.last_fetch.lock().await;
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        let throttled = last_fetch.is_some_and(|at| at.elapsed() < self.min_refetch_interval);
        if throttled {
            debug!(kid = %kid, "JWKS refetch throttled");
        } else {
            *last_fetch = Some(Instant::now());
            self.refresh().await?;
        }
        drop(last_fetch);

        self.cached_key(kid).await.ok_or_else(|| {
            warn!(kid = %kid, "Token signed with unknown key");
            AppError::Unauthorized("Invalid token".to_string())
        })
    }
}

#[async_trait]
impl IdentityVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<Identity> {
        let header = decode_header(token)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(AppError::Unauthorized("Invalid token algorithm".to_string()));
        }
        let kid = header
            .kid
            .ok_or_else(|| AppError::Unauthorized("Token has no key id".to_string()))?;

        let key = self.key_for(&kid).await?;
        let (n, e) = key
            .n
            .as_deref()
            .zip(key.e.as_deref())
            .ok_or_else(|| AppError::Internal(format!("JWKS key {kid} is not an RSA key")))?;
        let decoding_key = DecodingKey::from_rsa_components(n, e)
            .map_err(|e| AppError::Internal(format!("JWKS key {kid} unusable: {e}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer()]);
        validation.set_audience(&[self.project_id.as_str()]);

        let data = decode::<IdTokenClaims>(token, &decoding_key, &validation).map_err(|e| {
            debug!(error = %e, "ID token rejected");
            AppError::Unauthorized(format!("Invalid token: {e}"))
        })?;

        Identity::try_from(data.claims)
    }
}
