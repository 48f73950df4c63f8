// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provider-independent view over verified token claims.
//!
//! Every verifier returns a `Box<dyn Claims>`. Optional capabilities (email,
//! arbitrary custom claims) are probed with [`Claims::as_email_claimer`] and
//! [`Claims::as_custom_claimer`] instead of downcasting to a provider type.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::AuthError;

/// Name of the custom claim holding the user's email address.
pub const EMAIL_CLAIM: &str = "email";

/// Read-only view over a verified token.
pub trait Claims: std::fmt::Debug + Send + Sync {
    /// Subject (`sub`).
    fn subject(&self) -> Result<String, AuthError>;

    /// Issuer (`iss`).
    fn issuer(&self) -> Result<String, AuthError>;

    /// Audience (`aud`), always as a list.
    fn audience(&self) -> Result<Vec<String>, AuthError>;

    /// Issued at (`iat`).
    fn issued_at(&self) -> Result<DateTime<Utc>, AuthError>;

    /// Expiration time (`exp`).
    fn expiration_time(&self) -> Result<DateTime<Utc>, AuthError>;

    /// Not before (`nbf`). Providers that never carry it return
    /// [`AuthError::NotImplemented`].
    fn not_before(&self) -> Result<DateTime<Utc>, AuthError>;

    /// Email capability, if the provider supports it.
    fn as_email_claimer(&self) -> Option<&dyn EmailClaimer> {
        None
    }

    /// Custom claim capability, if the provider supports it.
    fn as_custom_claimer(&self) -> Option<&dyn CustomClaimer> {
        None
    }
}

/// Claims that can carry an email address.
pub trait EmailClaimer {
    fn email(&self) -> Result<String, AuthError>;
}

/// Claims that expose arbitrary named values.
pub trait CustomClaimer {
    fn custom(&self, key: &str) -> Result<&Value, AuthError>;
}

/// Verified claims stored in request extensions by the bearer middleware.
///
/// Extensions are keyed by type, so this wrapper is the only lookup key
/// handlers need: `request.extensions().get::<VerifiedClaims>()`.
#[derive(Debug, Clone)]
pub struct VerifiedClaims(pub Arc<dyn Claims>);

impl VerifiedClaims {
    pub fn new(claims: Box<dyn Claims>) -> Self {
        Self(Arc::from(claims))
    }

    /// Email, when the provider supports it and the token carries one.
    pub fn email(&self) -> Option<String> {
        self.0.as_email_claimer().and_then(|c| c.email().ok())
    }
}

impl std::ops::Deref for VerifiedClaims {
    type Target = dyn Claims;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

/// Audience is either a single string or a list on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Audience::One(aud) => vec![aud.clone()],
            Audience::Many(aud) => aud.clone(),
        }
    }
}

/// Claims decoded from a locally verified JWT.
///
/// Registered claims are typed; everything else lands in `extra`.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default, deserialize_with = "numeric_date::option")]
    pub iat: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date::option")]
    pub exp: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date::option")]
    pub nbf: Option<i64>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Claims for JwtClaims {
    fn subject(&self) -> Result<String, AuthError> {
        self.sub
            .clone()
            .ok_or_else(|| AuthError::ClaimNotFound("sub".into()))
    }

    fn issuer(&self) -> Result<String, AuthError> {
        self.iss
            .clone()
            .ok_or_else(|| AuthError::ClaimNotFound("iss".into()))
    }

    fn audience(&self) -> Result<Vec<String>, AuthError> {
        self.aud
            .as_ref()
            .map(Audience::to_vec)
            .ok_or_else(|| AuthError::ClaimNotFound("aud".into()))
    }

    fn issued_at(&self) -> Result<DateTime<Utc>, AuthError> {
        registered_time("iat", self.iat)
    }

    fn expiration_time(&self) -> Result<DateTime<Utc>, AuthError> {
        registered_time("exp", self.exp)
    }

    fn not_before(&self) -> Result<DateTime<Utc>, AuthError> {
        registered_time("nbf", self.nbf)
    }

    fn as_email_claimer(&self) -> Option<&dyn EmailClaimer> {
        Some(self)
    }

    fn as_custom_claimer(&self) -> Option<&dyn CustomClaimer> {
        Some(self)
    }
}

impl EmailClaimer for JwtClaims {
    fn email(&self) -> Result<String, AuthError> {
        email_claim(&self.extra)
    }
}

impl CustomClaimer for JwtClaims {
    fn custom(&self, key: &str) -> Result<&Value, AuthError> {
        custom_claim(&self.extra, key)
    }
}

fn registered_time(name: &str, value: Option<i64>) -> Result<DateTime<Utc>, AuthError> {
    let secs = value.ok_or_else(|| AuthError::ClaimNotFound(name.into()))?;
    unix_time(name, secs)
}

/// Convert unix seconds into a UTC timestamp.
/// Serde helpers for RFC 7519 NumericDate values.
///
/// A NumericDate may carry fractional seconds; they are truncated.
pub(crate) mod numeric_date {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Whole(i64),
        Fractional(f64),
    }

    fn seconds<E: serde::de::Error>(raw: Raw) -> Result<i64, E> {
        match raw {
            Raw::Whole(secs) => Ok(secs),
            Raw::Fractional(secs) if secs.is_finite() && secs.abs() < i64::MAX as f64 => {
                Ok(secs.trunc() as i64)
            }
            Raw::Fractional(secs) => Err(E::custom(format!("NumericDate out of range: {secs}"))),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        seconds(Raw::deserialize(deserializer)?)
    }

    pub fn option<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Option::<Raw>::deserialize(deserializer)?
            .map(seconds)
            .transpose()
    }
}

pub(crate) fn unix_time(name: &str, secs: i64) -> Result<DateTime<Utc>, AuthError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| AuthError::ClaimTypeMismatch {
        claim: name.into(),
        expected: "a unix timestamp",
    })
}

pub(crate) fn custom_claim<'a>(
    claims: &'a HashMap<String, Value>,
    key: &str,
) -> Result<&'a Value, AuthError> {
    claims
        .get(key)
        .ok_or_else(|| AuthError::ClaimNotFound(key.into()))
}

pub(crate) fn email_claim(claims: &HashMap<String, Value>) -> Result<String, AuthError> {
    match custom_claim(claims, EMAIL_CLAIM)? {
        Value::String(email) => Ok(email.clone()),
        _ => Err(AuthError::ClaimTypeMismatch {
            claim: EMAIL_CLAIM.into(),
            expected: "a string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_claims(extra: Value) -> JwtClaims {
        let mut payload = json!({
            "sub": "gazebo-web",
            "iss": "https://issuer.example.com",
            "aud": ["api", "console"],
            "iat": 1_700_000_000,
            "exp": 1_700_003_600,
        });
        if let (Some(base), Value::Object(more)) = (payload.as_object_mut(), extra) {
            base.extend(more);
        }
        serde_json::from_value(payload).unwrap()
    }

    #[test]
    fn registered_claims_are_exposed() {
        let claims = sample_claims(json!({}));
        assert_eq!(claims.subject().unwrap(), "gazebo-web");
        assert_eq!(claims.issuer().unwrap(), "https://issuer.example.com");
        assert_eq!(claims.audience().unwrap(), vec!["api", "console"]);
        assert_eq!(claims.issued_at().unwrap().timestamp(), 1_700_000_000);
        assert_eq!(claims.expiration_time().unwrap().timestamp(), 1_700_003_600);
    }

    #[test]
    fn fractional_numeric_dates_are_truncated() {
        let claims: JwtClaims = serde_json::from_value(json!({
            "iat": 1_700_000_000.75,
            "exp": 1_700_003_600.5,
        }))
        .unwrap();
        assert_eq!(claims.issued_at().unwrap().timestamp(), 1_700_000_000);
        assert_eq!(claims.expiration_time().unwrap().timestamp(), 1_700_003_600);
    }

    #[test]
    fn non_numeric_date_is_rejected() {
        let result = serde_json::from_value::<JwtClaims>(json!({"exp": "tomorrow"}));
        assert!(result.is_err());
    }

    #[test]
    fn single_audience_becomes_a_list() {
        let claims: JwtClaims = serde_json::from_value(json!({"aud": "api"})).unwrap();
        assert_eq!(claims.audience().unwrap(), vec!["api"]);
    }

    #[test]
    fn absent_registered_claim_is_not_found() {
        let claims = sample_claims(json!({}));
        assert!(matches!(claims.not_before(), Err(AuthError::ClaimNotFound(name)) if name == "nbf"));
    }

    #[test]
    fn email_missing_is_not_found() {
        let claims = sample_claims(json!({}));
        let email = claims.as_email_claimer().unwrap().email();
        assert!(matches!(email, Err(AuthError::ClaimNotFound(_))));
    }

    #[test]
    fn email_with_wrong_type_is_a_type_error() {
        let claims = sample_claims(json!({"email": 1234}));
        let email = claims.as_email_claimer().unwrap().email();
        assert!(matches!(email, Err(AuthError::ClaimTypeMismatch { .. })));
    }

    #[test]
    fn email_string_is_returned() {
        let claims = sample_claims(json!({"email": "a@b.com"}));
        assert_eq!(claims.as_email_claimer().unwrap().email().unwrap(), "a@b.com");
    }

    #[test]
    fn custom_claims_include_unregistered_keys() {
        let claims = sample_claims(json!({"org": "osrf"}));
        let custom = claims.as_custom_claimer().unwrap();
        assert_eq!(custom.custom("org").unwrap(), &json!("osrf"));
        assert!(matches!(custom.custom("team"), Err(AuthError::ClaimNotFound(_))));
    }

    #[test]
    fn verified_claims_deref_to_claims() {
        let verified = VerifiedClaims::new(Box::new(sample_claims(json!({"email": "a@b.com"}))));
        assert_eq!(verified.subject().unwrap(), "gazebo-web");
        assert_eq!(verified.email().as_deref(), Some("a@b.com"));
    }
}
