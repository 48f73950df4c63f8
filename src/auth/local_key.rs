// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local RSA public key verification.
//!
//! Tokens are checked against a single PEM-encoded RSA public key bound at
//! construction. Rotating the key means building a new verifier.

use std::collections::HashSet;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};

use super::token::validate_jwt;
use super::{AuthError, Authentication, Claims, JwtClaims};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Signature algorithms that can be checked with an RSA public key.
const RSA_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// [`Authentication`] backed by a static RSA public key.
#[derive(Clone)]
pub struct LocalKeyAuthentication {
    key: DecodingKey,
}

impl LocalKeyAuthentication {
    /// Build a verifier from a PEM-encoded RSA public key (`PUBLIC KEY` or
    /// `RSA PUBLIC KEY`).
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        Ok(Self { key })
    }

    fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        validate_jwt(token)?;

        let header = decode_header(token).map_err(|e| reject(e.kind()))?;
        if !RSA_ALGORITHMS.contains(&header.alg) {
            tracing::debug!(alg = ?header.alg, "Rejected token with non-RSA algorithm");
            return Err(AuthError::TokenInvalid("unexpected signing algorithm".into()));
        }

        let mut validation = Validation::new(header.alg);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;

        let token_data = decode::<JwtClaims>(token, &self.key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "RSA token verification failed");
            reject(e.kind())
        })?;

        Ok(token_data.claims)
    }
}

#[async_trait]
impl Authentication for LocalKeyAuthentication {
    async fn verify_jwt(&self, token: &str) -> Result<Box<dyn Claims>, AuthError> {
        let claims = self.verify(token)?;
        Ok(Box::new(claims))
    }
}

fn reject(kind: &ErrorKind) -> AuthError {
    let reason = match kind {
        ErrorKind::ExpiredSignature => "token has expired",
        ErrorKind::ImmatureSignature => "token is not yet valid",
        ErrorKind::InvalidSignature => "signature is invalid",
        ErrorKind::InvalidAlgorithm => "unexpected signing algorithm",
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            "token is malformed"
        }
        _ => "token could not be verified",
    };
    AuthError::TokenInvalid(reason.into())
}
