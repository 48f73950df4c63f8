// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verifier contracts shared by every provider.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{AuthError, Claims};

/// Verifies signed JWTs and returns their claims.
///
/// Implementations hold no per-request state and are shared behind an `Arc`
/// across concurrent requests.
#[async_trait]
pub trait Authentication: Send + Sync {
    /// Verify that `token` is a valid JWT signed by this provider.
    async fn verify_jwt(&self, token: &str) -> Result<Box<dyn Claims>, AuthError>;
}

/// Verifies opaque OAuth access tokens. No claims are produced.
#[async_trait]
pub trait AccessTokenAuthentication: Send + Sync {
    async fn verify_access_token(&self, token: &str) -> Result<(), AuthError>;
}

#[async_trait]
impl<T: Authentication + ?Sized> Authentication for Arc<T> {
    async fn verify_jwt(&self, token: &str) -> Result<Box<dyn Claims>, AuthError> {
        (**self).verify_jwt(token).await
    }
}

#[async_trait]
impl<T: AccessTokenAuthentication + ?Sized> AccessTokenAuthentication for Arc<T> {
    async fn verify_access_token(&self, token: &str) -> Result<(), AuthError> {
        (**self).verify_access_token(token).await
    }
}

/// Cancellation and deadline for a single verification.
///
/// Verifiers never retry; the context only bounds how long the caller waits.
/// Dropping the in-flight verification future aborts any remote call.
#[derive(Debug, Clone, Default)]
pub struct VerifyContext {
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl VerifyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the verification by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort the verification when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `fut` under this context.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        let bounded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .unwrap_or(Err(AuthError::Timeout)),
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AuthError::Cancelled),
            result = bounded => result,
        }
    }
}

/// Verify a JWT under `ctx`.
pub async fn verify_jwt_in<A>(
    ctx: &VerifyContext,
    auth: &A,
    token: &str,
) -> Result<Box<dyn Claims>, AuthError>
where
    A: Authentication + ?Sized,
{
    ctx.run(auth.verify_jwt(token)).await
}

/// Verify an access token under `ctx`.
pub async fn verify_access_token_in<A>(
    ctx: &VerifyContext,
    auth: &A,
    token: &str,
) -> Result<(), AuthError>
where
    A: AccessTokenAuthentication + ?Sized,
{
    ctx.run(auth.verify_access_token(token)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtClaims;

    struct Slow;

    #[async_trait]
    impl Authentication for Slow {
        async fn verify_jwt(&self, _token: &str) -> Result<Box<dyn Claims>, AuthError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(AuthError::TokenInvalid("unreachable".into()))
        }
    }

    struct Instant;

    #[async_trait]
    impl Authentication for Instant {
        async fn verify_jwt(&self, _token: &str) -> Result<Box<dyn Claims>, AuthError> {
            let claims: JwtClaims = serde_json::from_value(serde_json::json!({"sub": "me"}))
                .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;
            Ok(Box::new(claims))
        }
    }

    #[tokio::test]
    async fn deadline_surfaces_timeout() {
        let ctx = VerifyContext::new().with_timeout(Duration::from_millis(20));
        let result = verify_jwt_in(&ctx, &Slow, "a.b.c").await;
        assert!(matches!(result, Err(AuthError::Timeout)));
    }

    #[tokio::test]
    async fn cancellation_surfaces_cancelled() {
        let cancel = CancellationToken::new();
        let ctx = VerifyContext::new().with_cancellation(cancel.clone());
        cancel.cancel();
        let result = verify_jwt_in(&ctx, &Slow, "a.b.c").await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[tokio::test]
    async fn completed_verification_passes_through() {
        let ctx = VerifyContext::new().with_timeout(Duration::from_secs(5));
        let auth: Arc<dyn Authentication> = Arc::new(Instant);
        let claims = verify_jwt_in(&ctx, &auth, "a.b.c").await.unwrap();
        assert_eq!(claims.subject().unwrap(), "me");
    }
}
