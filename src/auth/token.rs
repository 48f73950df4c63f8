// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Structural JWT validation.
//!
//! Every JWT-based verifier runs [`validate_jwt`] before touching keys or the
//! network. The check never decodes base64 or inspects claims.

use super::AuthError;

/// Validate that `token` has the `header.payload.signature` shape with
/// non-empty segments.
pub fn validate_jwt(token: &str) -> Result<(), AuthError> {
    if token.is_empty() {
        return Err(AuthError::TokenNotProvided);
    }

    let parts: Vec<&str> = token.split('.').collect();
    let [header, payload, signature] = parts.as_slice() else {
        return Err(AuthError::TokenMalformed);
    };

    if header.is_empty() {
        return Err(AuthError::JwtMissingHeader);
    }
    if payload.is_empty() {
        return Err(AuthError::JwtMissingPayload);
    }
    if signature.is_empty() {
        return Err(AuthError::JwtMissingSignature);
    }

    Ok(())
}
