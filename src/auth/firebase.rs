// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Delegated verification through Firebase Authentication.
//!
//! [`FirebaseAuthentication`] runs the structural check locally and hands the
//! raw ID token to an [`IdTokenVerifier`]. The verifier is usually a
//! [`FirebaseAuthClient`](super::firebase_client::FirebaseAuthClient) or a
//! [`RefreshingFirebaseAuth`](super::firebase_client::RefreshingFirebaseAuth);
//! tests inject their own.
//!
//! ```rust,ignore
//! let app = FirebaseApp::new("my-project");
//! let auth = FirebaseAuthentication::new(RefreshingFirebaseAuth::new(app));
//! let claims = auth.verify_jwt(token).await?;
//! let email = claims.as_email_claimer().map(|c| c.email());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::claims::{custom_claim, email_claim, numeric_date, unix_time};
use super::error::BoxError;
use super::token::validate_jwt;
use super::{AuthError, Authentication, Claims, CustomClaimer, EmailClaimer};

/// Verifies a Firebase ID token and returns the decoded token.
///
/// The `id_token` is the bearer token from `Authorization: Bearer <id_token>`.
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify_id_token(&self, id_token: &str) -> Result<FirebaseToken, BoxError>;
}

#[async_trait]
impl<T: IdTokenVerifier + ?Sized> IdTokenVerifier for Arc<T> {
    async fn verify_id_token(&self, id_token: &str) -> Result<FirebaseToken, BoxError> {
        (**self).verify_id_token(id_token).await
    }
}

/// Sign-in details Firebase attaches under the `firebase` claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirebaseInfo {
    #[serde(default)]
    pub sign_in_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default)]
    pub identities: HashMap<String, Value>,
}

/// A verified Firebase ID token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirebaseToken {
    #[serde(default, deserialize_with = "numeric_date::deserialize")]
    pub auth_time: i64,
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "aud")]
    pub audience: String,
    #[serde(rename = "exp", deserialize_with = "numeric_date::deserialize")]
    pub expires: i64,
    #[serde(rename = "iat", deserialize_with = "numeric_date::deserialize")]
    pub issued_at: i64,
    #[serde(rename = "sub")]
    pub subject: String,
    /// Same as `subject`; filled in after verification.
    #[serde(skip)]
    pub uid: String,
    #[serde(default)]
    pub firebase: FirebaseInfo,
    /// Every other claim, including `email`.
    #[serde(flatten)]
    pub claims: HashMap<String, Value>,
}

/// [`Claims`] view over a [`FirebaseToken`].
#[derive(Debug, Clone)]
pub struct FirebaseClaims(FirebaseToken);

impl FirebaseClaims {
    pub fn new(token: FirebaseToken) -> Self {
        Self(token)
    }

    pub fn token(&self) -> &FirebaseToken {
        &self.0
    }
}

impl From<FirebaseToken> for FirebaseClaims {
    fn from(token: FirebaseToken) -> Self {
        Self::new(token)
    }
}

impl Claims for FirebaseClaims {
    fn subject(&self) -> Result<String, AuthError> {
        Ok(self.0.subject.clone())
    }

    fn issuer(&self) -> Result<String, AuthError> {
        Ok(self.0.issuer.clone())
    }

    fn audience(&self) -> Result<Vec<String>, AuthError> {
        Ok(vec![self.0.audience.clone()])
    }

    fn issued_at(&self) -> Result<DateTime<Utc>, AuthError> {
        unix_time("iat", self.0.issued_at)
    }

    fn expiration_time(&self) -> Result<DateTime<Utc>, AuthError> {
        unix_time("exp", self.0.expires)
    }

    /// Firebase ID tokens carry no `nbf`.
    fn not_before(&self) -> Result<DateTime<Utc>, AuthError> {
        Err(AuthError::NotImplemented("not before"))
    }

    fn as_email_claimer(&self) -> Option<&dyn EmailClaimer> {
        Some(self)
    }

    fn as_custom_claimer(&self) -> Option<&dyn CustomClaimer> {
        Some(self)
    }
}

impl EmailClaimer for FirebaseClaims {
    fn email(&self) -> Result<String, AuthError> {
        email_claim(&self.0.claims)
    }
}

impl CustomClaimer for FirebaseClaims {
    fn custom(&self, key: &str) -> Result<&Value, AuthError> {
        custom_claim(&self.0.claims, key)
    }
}

/// [`Authentication`] that delegates to Firebase.
#[derive(Clone)]
pub struct FirebaseAuthentication {
    verifier: Arc<dyn IdTokenVerifier>,
}

impl FirebaseAuthentication {
    pub fn new(verifier: impl IdTokenVerifier + 'static) -> Self {
        Self {
            verifier: Arc::new(verifier),
        }
    }
}

#[async_trait]
impl Authentication for FirebaseAuthentication {
    async fn verify_jwt(&self, token: &str) -> Result<Box<dyn Claims>, AuthError> {
        validate_jwt(token)?;

        let verified = self.verifier.verify_id_token(token).await.map_err(|e| {
            tracing::debug!(error = %e, "Firebase rejected ID token");
            AuthError::remote(e)
        })?;

        Ok(Box::new(FirebaseClaims::new(verified)))
    }
}
