// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Boxed error type used for causes coming from remote verification clients.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Authentication error type.
///
/// Kinds are matched on the variant, never on the message. Remote failures
/// keep their cause as the error source so callers can inspect it with
/// [`std::error::Error::source`].
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No authorization header present
    #[error("no bearer token provided")]
    MissingAuthHeader,
    /// Authorization header is not `Bearer <token>`
    #[error("invalid token")]
    InvalidAuthHeader,
    /// Credential scheme is empty
    #[error("no scheme provided")]
    SchemeMissing,
    /// Credential scheme is not Bearer
    #[error("invalid scheme, should be a bearer token")]
    SchemeInvalid,
    /// Token string is empty
    #[error("no token provided")]
    TokenNotProvided,
    /// Token does not have three dot-delimited segments
    #[error("token is not valid: malformed")]
    TokenMalformed,
    #[error("token is not valid: no jwt header")]
    JwtMissingHeader,
    #[error("token is not valid: no jwt payload")]
    JwtMissingPayload,
    #[error("token is not valid: no jwt signature")]
    JwtMissingSignature,
    /// Signature or registered claims rejected locally
    #[error("token is not valid: {0}")]
    TokenInvalid(String),
    /// Verification key could not be loaded
    #[error("invalid verification key: {0}")]
    InvalidKey(String),
    /// A remote identity platform or IAM call failed
    #[error("remote verification failed: {0}")]
    RemoteVerificationFailed(#[source] BoxError),
    /// The permission probe succeeded but granted nothing
    #[error("missing permissions")]
    MissingPermissions,
    /// Claim absent from the token
    #[error("failed to get {0} value: not found")]
    ClaimNotFound(String),
    /// Claim present with an unexpected type
    #[error("invalid {claim} value: should be {expected}")]
    ClaimTypeMismatch {
        claim: String,
        expected: &'static str,
    },
    /// Accessor not supported by the active provider
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
    /// Verification was cancelled by the caller
    #[error("verification cancelled")]
    Cancelled,
    /// Verification exceeded its deadline
    #[error("verification timed out")]
    Timeout,
}

impl AuthError {
    /// Wrap a remote client error, keeping it as the source.
    pub fn remote(err: impl Into<BoxError>) -> Self {
        AuthError::RemoteVerificationFailed(err.into())
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::SchemeMissing => "scheme_missing",
            AuthError::SchemeInvalid => "scheme_invalid",
            AuthError::TokenNotProvided => "token_not_provided",
            AuthError::TokenMalformed => "token_malformed",
            AuthError::JwtMissingHeader => "jwt_missing_header",
            AuthError::JwtMissingPayload => "jwt_missing_payload",
            AuthError::JwtMissingSignature => "jwt_missing_signature",
            AuthError::TokenInvalid(_) => "token_invalid",
            AuthError::InvalidKey(_) => "invalid_key",
            AuthError::RemoteVerificationFailed(_) => "remote_verification_failed",
            AuthError::MissingPermissions => "missing_permissions",
            AuthError::ClaimNotFound(_) => "claim_not_found",
            AuthError::ClaimTypeMismatch { .. } => "claim_type_mismatch",
            AuthError::NotImplemented(_) => "not_implemented",
            AuthError::Cancelled => "cancelled",
            AuthError::Timeout => "timeout",
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// Only a malformed request header is a 400; everything that reached a
    /// verifier is a 401.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader | AuthError::InvalidAuthHeader => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Whether the error came from the structural or scheme checks that run
    /// before any cryptographic or remote work.
    pub fn is_syntax_error(&self) -> bool {
        matches!(
            self,
            AuthError::SchemeMissing
                | AuthError::SchemeInvalid
                | AuthError::TokenNotProvided
                | AuthError::TokenMalformed
                | AuthError::JwtMissingHeader
                | AuthError::JwtMissingPayload
                | AuthError::JwtMissingSignature
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match status {
            StatusCode::BAD_REQUEST => self.to_string(),
            _ => format!("Failed to verify token: {self}"),
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::error::Error as _;

    #[derive(Debug, thiserror::Error)]
    #[error("upstream unavailable")]
    struct Upstream;

    #[tokio::test]
    async fn missing_auth_returns_400() {
        let response = AuthError::MissingAuthHeader.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body_bytes[..], b"no bearer token provided");
    }

    #[tokio::test]
    async fn verification_failure_returns_401_with_message() {
        let response = AuthError::TokenMalformed.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, "Failed to verify token: token is not valid: malformed");
    }

    #[test]
    fn remote_error_keeps_its_source() {
        let err = AuthError::remote(Upstream);
        assert_eq!(err.error_code(), "remote_verification_failed");
        let source = err.source().expect("source");
        assert!(source.downcast_ref::<Upstream>().is_some());
    }

    #[test]
    fn syntax_errors_are_classified() {
        assert!(AuthError::JwtMissingPayload.is_syntax_error());
        assert!(AuthError::SchemeInvalid.is_syntax_error());
        assert!(!AuthError::TokenInvalid("expired".into()).is_syntax_error());
        assert!(!AuthError::MissingPermissions.is_syntax_error());
    }
}
