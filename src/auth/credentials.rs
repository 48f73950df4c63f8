// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scheme-aware credentials.
//!
//! [`BearerAuthentication`] checks the credential scheme and then hands the
//! token to any [`Authentication`] provider.

use async_trait::async_trait;

use super::{AuthError, Authentication, Claims};

/// The only scheme accepted by [`BearerAuthentication`].
pub const SCHEME_BEARER: &str = "Bearer";

/// A scheme and token pair extracted from a request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub scheme: String,
    pub token: String,
}

impl Credentials {
    pub fn new(scheme: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            token: token.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new(SCHEME_BEARER, token)
    }
}

// Tokens are sensitive; only the scheme is ever printed.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("scheme", &self.scheme)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Verifies full credentials rather than a bare token.
#[async_trait]
pub trait CredentialsVerifier: Send + Sync {
    async fn verify_credentials(&self, credentials: &Credentials) -> Result<(), AuthError>;
}

/// Bearer-scheme front for an [`Authentication`] provider.
///
/// The bearer middleware wraps every JWT verifier in one of these.
#[derive(Clone)]
pub struct BearerAuthentication<A> {
    inner: A,
}

impl<A: Authentication> BearerAuthentication<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }

    /// Verify the credentials and return the provider's claims.
    pub async fn verify_bearer(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn Claims>, AuthError> {
        validate_scheme(credentials)?;
        self.inner.verify_jwt(&credentials.token).await
    }
}

#[async_trait]
impl<A: Authentication> CredentialsVerifier for BearerAuthentication<A> {
    async fn verify_credentials(&self, credentials: &Credentials) -> Result<(), AuthError> {
        self.verify_bearer(credentials).await.map(|_| ())
    }
}

fn validate_scheme(credentials: &Credentials) -> Result<(), AuthError> {
    if credentials.scheme.is_empty() {
        return Err(AuthError::SchemeMissing);
    }
    if credentials.scheme != SCHEME_BEARER {
        return Err(AuthError::SchemeInvalid);
    }
    Ok(())
}
