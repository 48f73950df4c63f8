// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Behaviour
//!
//! - Keys are cached for five minutes
//! - A `kid` missing from the cached set forces a re-fetch, so provider key
//!   rotation is picked up without waiting for the TTL. Forced re-fetches
//!   happen at most once per [`MIN_REFRESH_INTERVAL`]: the `kid` comes from an
//!   unverified header, so callers control it
//! - Only one fetch is in flight at a time; concurrent callers wait for it
//!   and reuse its result
//! - No stale fallback: a failed fetch fails the verification

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::{Mutex, RwLock};

/// JWKS cache TTL (5 minutes).
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Minimum age of the cached set before an unknown `kid` may re-fetch it.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Timeout for a single JWKS fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("failed to fetch JWKS: {0}")]
    Fetch(String),

    #[error("no matching key found in JWKS for kid {0}")]
    NoMatchingKey(String),

    #[error("unsupported key in JWKS: {0}")]
    UnsupportedKey(String),
}

/// JWKS cache entry.
struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Caching JWKS client.
#[derive(Clone)]
pub struct KeyCache {
    /// JWKS URL
    jwks_url: String,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    /// Cached JWKS
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// Held for the duration of a fetch
    refresh_lock: Arc<Mutex<()>>,
    /// HTTP client
    client: reqwest::Client,
}

impl KeyCache {
    /// Create a new key cache for `jwks_url`.
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, JwksError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| JwksError::Client(e.to_string()))?;

        Ok(Self {
            jwks_url: jwks_url.into(),
            cache_ttl: CACHE_TTL,
            min_refresh_interval: MIN_REFRESH_INTERVAL,
            cache: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
            client,
        })
    }

    /// The cached set, if it was fetched less than `max_age` ago.
    async fn cached(&self, max_age: Duration) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < max_age)
            .map(|entry| entry.jwks.clone())
    }

    /// Fetch JWKS (with caching).
    async fn get_jwks(&self) -> Result<JwkSet, JwksError> {
        if let Some(jwks) = self.cached(self.cache_ttl).await {
            return Ok(jwks);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have fetched while this one waited.
        if let Some(jwks) = self.cached(self.cache_ttl).await {
            return Ok(jwks);
        }
        self.fetch_and_store().await
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self) -> Result<JwkSet, JwksError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JwksError::Fetch(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))
    }

    /// Callers must hold `refresh_lock`.
    async fn fetch_and_store(&self) -> Result<JwkSet, JwksError> {
        let jwks = self.fetch_jwks().await?;
        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });
        Ok(jwks)
    }

    /// Get a decoding key for the given key ID.
    ///
    /// An unknown `kid` re-fetches the set unless it is younger than the
    /// minimum refresh interval.
    pub async fn get_decoding_key(&self, kid: &str) -> Result<(DecodingKey, Algorithm), JwksError> {
        let jwks = self.get_jwks().await?;
        if let Some(jwk) = find_key(&jwks, kid) {
            return jwk_to_decoding_key(jwk);
        }

        let jwks = {
            let _guard = self.refresh_lock.lock().await;
            match self.cached(self.min_refresh_interval).await {
                Some(recent) => {
                    tracing::debug!(kid, "Unknown signing key, JWKS refreshed recently");
                    recent
                }
                None => {
                    tracing::info!(kid, "Unknown signing key, refreshing JWKS");
                    self.fetch_and_store().await?
                }
            }
        };

        let jwk = find_key(&jwks, kid).ok_or_else(|| JwksError::NoMatchingKey(kid.to_string()))?;
        jwk_to_decoding_key(jwk)
    }
}

fn find_key<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .find(|k| k.common.key_id.as_deref() == Some(kid))
}

/// Convert an RSA JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), JwksError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| JwksError::UnsupportedKey(format!("invalid RSA key: {e}")))?;

            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                _ => Algorithm::RS256,
            };

            Ok((key, alg))
        }
        _ => Err(JwksError::UnsupportedKey("only RSA keys are accepted".to_string())),
    }
}
