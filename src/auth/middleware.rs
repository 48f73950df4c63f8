// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token middleware for Axum.
//!
//! ## Outcomes
//!
//! - Missing, empty or garbled `Authorization` header: `400`
//! - Well-formed header whose token fails verification: `401`
//! - Verified token: the wrapped handler runs unchanged
//!
//! JWT verifiers additionally store [`VerifiedClaims`] in the request
//! extensions; read them with the [`Authenticated`](super::Authenticated)
//! extractor. Access-token verifiers produce no claims.
//!
//! ```rust,ignore
//! let config = BearerAuthConfig::jwt(LocalKeyAuthentication::from_rsa_pem(&pem)?);
//! let app = Router::new()
//!     .route("/protected", get(protected_handler))
//!     .route_layer(axum::middleware::from_fn_with_state(config, bearer_token));
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
    Router,
};

use super::verifier::{verify_access_token_in, VerifyContext};
use super::{
    AccessTokenAuthentication, AuthError, Authentication, BearerAuthentication, Credentials,
    VerifiedClaims,
};

/// Default bound on a single verification.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// The verifier bound to a middleware instance.
#[derive(Clone)]
pub enum Verifier {
    Jwt(BearerAuthentication<Arc<dyn Authentication>>),
    AccessToken(Arc<dyn AccessTokenAuthentication>),
}

/// Middleware state.
#[derive(Clone)]
pub struct BearerAuthConfig {
    pub verifier: Verifier,
    pub timeout: Duration,
}

impl BearerAuthConfig {
    /// Gate requests with a JWT verifier.
    pub fn jwt(auth: impl Authentication + 'static) -> Self {
        Self {
            verifier: Verifier::Jwt(BearerAuthentication::new(
                Arc::new(auth) as Arc<dyn Authentication>
            )),
            timeout: DEFAULT_VERIFY_TIMEOUT,
        }
    }

    /// Gate requests with an access-token verifier.
    pub fn access_token(auth: impl AccessTokenAuthentication + 'static) -> Self {
        Self {
            verifier: Verifier::AccessToken(Arc::new(auth)),
            timeout: DEFAULT_VERIFY_TIMEOUT,
        }
    }

    /// Set the per-request verification timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = match headers.get(AUTHORIZATION) {
        Some(value) => value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?,
        None => return Err(AuthError::MissingAuthHeader),
    };
    if value.is_empty() {
        return Err(AuthError::MissingAuthHeader);
    }

    let parts: Vec<&str> = value.split("Bearer ").collect();
    let [_, token] = parts.as_slice() else {
        return Err(AuthError::InvalidAuthHeader);
    };
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }

    Ok(*token)
}

/// Authentication middleware function.
pub async fn bearer_token(
    State(config): State<BearerAuthConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let credentials = match extract_bearer_token(request.headers()) {
        Ok(token) => Credentials::bearer(token),
        Err(e) => {
            tracing::debug!(error_code = e.error_code(), "Rejected malformed authorization header");
            return e.into_response();
        }
    };

    let ctx = VerifyContext::new().with_timeout(config.timeout);
    let outcome = match &config.verifier {
        Verifier::Jwt(auth) => ctx
            .run(auth.verify_bearer(&credentials))
            .await
            .map(|claims| {
                request.extensions_mut().insert(VerifiedClaims::new(claims));
            }),
        Verifier::AccessToken(auth) => {
            verify_access_token_in(&ctx, auth.as_ref(), &credentials.token).await
        }
    };

    if let Err(e) = outcome {
        tracing::info!(error_code = e.error_code(), "Bearer token verification failed");
        return e.into_response();
    }

    next.run(request).await
}

/// Gate every route of `router` behind [`bearer_token`].
pub fn protect<S>(router: Router<S>, config: BearerAuthConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(axum::middleware::from_fn_with_state(config, bearer_token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Authenticated, Claims, LocalKeyAuthentication};
    use async_trait::async_trait;
    use axum::{body::Body, body::to_bytes, http::StatusCode, routing::get};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const PUBLIC_KEY: &[u8] = include_bytes!("../../testdata/key.pem");
    const PRIVATE_KEY: &[u8] = include_bytes!("../../testdata/key.private.pem");

    fn signed_token() -> String {
        let claims = json!({"sub": "gazebo-web", "exp": chrono::Utc::now().timestamp() + 3600});
        encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &EncodingKey::from_rsa_pem(PRIVATE_KEY).unwrap(),
        )
        .unwrap()
    }

    fn app(config: BearerAuthConfig, calls: Arc<AtomicUsize>) -> Router {
        let router = Router::new().route(
            "/protected",
            get(move |claims: Option<Authenticated>| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let subject = claims
                        .and_then(|Authenticated(c)| c.subject().ok())
                        .unwrap_or_default();
                    (StatusCode::ACCEPTED, subject)
                }
            }),
        );
        protect(router, config)
    }

    fn rsa_app(calls: Arc<AtomicUsize>) -> Router {
        let auth = LocalKeyAuthentication::from_rsa_pem(PUBLIC_KEY).unwrap();
        app(BearerAuthConfig::jwt(auth), calls)
    }

    async fn send(app: Router, authorization: Option<&str>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri("/protected");
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn extracts_token_after_bearer_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn header_shape_errors() {
        let mut headers = HeaderMap::new();
        assert!(matches!(extract_bearer_token(&headers), Err(AuthError::MissingAuthHeader)));

        headers.insert(AUTHORIZATION, "".parse().unwrap());
        assert!(matches!(extract_bearer_token(&headers), Err(AuthError::MissingAuthHeader)));

        for value in ["Basic xyz", "Bearer ", "Bearer a Bearer b", "Bearerabc"] {
            headers.insert(AUTHORIZATION, value.parse().unwrap());
            assert!(
                matches!(extract_bearer_token(&headers), Err(AuthError::InvalidAuthHeader)),
                "{value:?} should be invalid"
            );
        }
    }

    #[tokio::test]
    async fn jwt_verifier_is_fronted_by_the_bearer_scheme_check() {
        use crate::auth::CredentialsVerifier;

        let auth = LocalKeyAuthentication::from_rsa_pem(PUBLIC_KEY).unwrap();
        let Verifier::Jwt(bearer) = BearerAuthConfig::jwt(auth).verifier else {
            panic!("expected a JWT verifier");
        };

        let basic = Credentials::new("Basic", signed_token());
        let result = bearer.verify_credentials(&basic).await;
        assert!(matches!(result, Err(AuthError::SchemeInvalid)));

        let bearer_claims = bearer.verify_bearer(&Credentials::bearer(signed_token())).await;
        assert_eq!(bearer_claims.unwrap().subject().unwrap(), "gazebo-web");
    }

    #[tokio::test]
    async fn missing_header_is_bad_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (status, body) = send(rsa_app(calls.clone()), None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "no bearer token provided");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn basic_scheme_is_bad_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (status, _) = send(rsa_app(calls.clone()), Some("Basic xyz")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unverifiable_token_is_unauthorized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (status, body) = send(rsa_app(calls.clone()), Some("Bearer 1234")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Failed to verify token: token is not valid: malformed");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_token_reaches_handler_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let header = format!("Bearer {}", signed_token());
        let (status, body) = send(rsa_app(calls.clone()), Some(&header)).await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, "gazebo-web");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct Denied;

    #[async_trait]
    impl AccessTokenAuthentication for Denied {
        async fn verify_access_token(&self, _token: &str) -> Result<(), AuthError> {
            Err(AuthError::MissingPermissions)
        }
    }

    struct Granted;

    #[async_trait]
    impl AccessTokenAuthentication for Granted {
        async fn verify_access_token(&self, _token: &str) -> Result<(), AuthError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn access_token_verifier_gates_without_claims() {
        let calls = Arc::new(AtomicUsize::new(0));
        let granted = app(BearerAuthConfig::access_token(Granted), calls.clone());
        let (status, body) = send(granted, Some("Bearer ya29.opaque")).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, "");

        let denied = app(BearerAuthConfig::access_token(Denied), calls.clone());
        let (status, body) = send(denied, Some("Bearer ya29.opaque")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Failed to verify token: missing permissions");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct Hanging;

    #[async_trait]
    impl Authentication for Hanging {
        async fn verify_jwt(&self, _token: &str) -> Result<Box<dyn Claims>, AuthError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn slow_verifier_times_out_as_unauthorized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = BearerAuthConfig::jwt(Hanging).with_timeout(Duration::from_millis(20));
        let (status, body) = send(app(config, calls.clone()), Some("Bearer a.b.c")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Failed to verify token: verification timed out");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
