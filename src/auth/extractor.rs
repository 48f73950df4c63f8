// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for verified claims.
//!
//! Only works behind the [`bearer_token`](super::middleware::bearer_token)
//! middleware with a JWT verifier, which stores the claims:
//!
//! ```rust,ignore
//! async fn my_handler(Authenticated(claims): Authenticated) -> impl IntoResponse {
//!     claims.subject()
//! }
//! ```

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};

use super::{AuthError, VerifiedClaims};

/// Claims verified by the bearer middleware for this request.
pub struct Authenticated(pub VerifiedClaims);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedClaims>()
            .cloned()
            .map(Authenticated)
            .ok_or(AuthError::TokenNotProvided)
    }
}

/// `Option<Authenticated>` is `None` when the middleware stored nothing,
/// e.g. behind an access-token verifier.
impl<S: Send + Sync> OptionalFromRequestParts<S> for Authenticated {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<VerifiedClaims>().cloned().map(Authenticated))
    }
}
