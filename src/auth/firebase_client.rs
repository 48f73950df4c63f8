// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Firebase ID token verification client.
//!
//! ## Checks
//!
//! - `RS256` signature against Google's published `securetoken` keys
//! - `aud` equals the project id
//! - `iss` equals `https://securetoken.google.com/<project id>`
//! - `sub` is non-empty and at most 128 characters
//! - `exp` has not passed and `iat` is not in the future (60 s leeway)

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;
use tokio::sync::OnceCell;

use super::error::BoxError;
use super::firebase::{FirebaseToken, IdTokenVerifier};
use super::jwks::{JwksError, KeyCache};

/// Google's JWK set for Firebase ID token signing keys.
pub const DEFAULT_KEYS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Firebase caps `sub` at 128 characters.
const MAX_SUBJECT_LEN: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum FirebaseError {
    #[error("firebase project id is required")]
    MissingProjectId,

    #[error("failed to read firebase credentials: {0}")]
    Credentials(String),

    #[error(transparent)]
    Keys(#[from] JwksError),

    #[error("firebase id token is invalid: {0}")]
    InvalidIdToken(String),
}

/// Application credential: which Firebase project tokens must belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseApp {
    project_id: String,
    keys_url: String,
}

#[derive(Deserialize)]
struct ServiceAccountFile {
    #[serde(default)]
    project_id: Option<String>,
}

impl FirebaseApp {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            keys_url: DEFAULT_KEYS_URL.to_string(),
        }
    }

    /// Load the project id from a service account JSON file.
    pub fn from_credentials_file(path: impl AsRef<Path>) -> Result<Self, FirebaseError> {
        let raw = std::fs::read(path.as_ref())
            .map_err(|e| FirebaseError::Credentials(e.to_string()))?;
        let file: ServiceAccountFile =
            serde_json::from_slice(&raw).map_err(|e| FirebaseError::Credentials(e.to_string()))?;

        match file.project_id {
            Some(project_id) if !project_id.is_empty() => Ok(Self::new(project_id)),
            _ => Err(FirebaseError::MissingProjectId),
        }
    }

    /// Override where signing keys are fetched from.
    pub fn with_keys_url(mut self, keys_url: impl Into<String>) -> Self {
        self.keys_url = keys_url.into();
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Create an auth client for this app.
    pub fn auth(&self) -> Result<FirebaseAuthClient, FirebaseError> {
        if self.project_id.is_empty() {
            return Err(FirebaseError::MissingProjectId);
        }
        tracing::info!(project = %self.project_id, "Creating Firebase auth client");

        Ok(FirebaseAuthClient {
            project_id: self.project_id.clone(),
            issuer: format!("{ISSUER_PREFIX}{}", self.project_id),
            keys: KeyCache::new(self.keys_url.clone())?,
        })
    }
}

/// Verifies ID tokens for one Firebase project.
///
/// Signing keys are cached and re-fetched when Google rotates them, so a
/// single client is meant to live for the whole process.
pub struct FirebaseAuthClient {
    project_id: String,
    issuer: String,
    keys: KeyCache,
}

impl FirebaseAuthClient {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub async fn verify(&self, id_token: &str) -> Result<FirebaseToken, FirebaseError> {
        let header = decode_header(id_token)
            .map_err(|_| FirebaseError::InvalidIdToken("malformed header".into()))?;
        if header.alg != Algorithm::RS256 {
            return Err(FirebaseError::InvalidIdToken(
                "unexpected signing algorithm".into(),
            ));
        }
        let kid = header
            .kid
            .ok_or_else(|| FirebaseError::InvalidIdToken("missing kid".into()))?;

        let (key, _) = self.keys.get_decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[&self.issuer]);
        validation.required_spec_claims =
            HashSet::from(["exp", "aud", "iss", "sub"].map(String::from));

        let mut token = decode::<FirebaseToken>(id_token, &key, &validation)
            .map_err(|e| FirebaseError::InvalidIdToken(e.to_string()))?
            .claims;

        if token.subject.is_empty() || token.subject.len() > MAX_SUBJECT_LEN {
            return Err(FirebaseError::InvalidIdToken("invalid subject".into()));
        }
        let now = chrono::Utc::now().timestamp();
        if token.issued_at > now + CLOCK_SKEW_LEEWAY as i64 {
            return Err(FirebaseError::InvalidIdToken("issued in the future".into()));
        }

        token.uid = token.subject.clone();
        Ok(token)
    }
}

#[async_trait]
impl IdTokenVerifier for FirebaseAuthClient {
    async fn verify_id_token(&self, id_token: &str) -> Result<FirebaseToken, BoxError> {
        Ok(self.verify(id_token).await?)
    }
}

/// Create an eager verifier: the client is built now and reused.
pub fn new_firebase(app: &FirebaseApp) -> Result<FirebaseAuthClient, FirebaseError> {
    app.auth()
}

/// Verifier that creates its client on first use.
///
/// Concurrent first callers share one initialization; every later call sees
/// the same client. A failed initialization is retried on the next call.
pub struct RefreshingFirebaseAuth {
    app: FirebaseApp,
    client: OnceCell<FirebaseAuthClient>,
}

impl RefreshingFirebaseAuth {
    pub fn new(app: FirebaseApp) -> Self {
        Self {
            app,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&FirebaseAuthClient, FirebaseError> {
        self.client
            .get_or_try_init(|| async { self.app.auth() })
            .await
    }
}

#[async_trait]
impl IdTokenVerifier for RefreshingFirebaseAuth {
    async fn verify_id_token(&self, id_token: &str) -> Result<FirebaseToken, BoxError> {
        let client = self.client().await?;
        Ok(client.verify(id_token).await?)
    }
}
