// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Multi-provider bearer token verification.
//!
//! ## Verification Flow
//!
//! 1. Client sends `Authorization: Bearer <token>`
//! 2. Middleware extracts the token (400 on a missing or garbled header)
//! 3. The bound verifier checks it (401 on failure):
//!    - [`LocalKeyAuthentication`]: RSA signature against a static PEM key
//!    - [`FirebaseAuthentication`]: delegated to Firebase, keys cached
//!    - [`GcpAccessTokenAuthentication`]: IAM `actAs` permission probe
//! 4. JWT verifiers expose [`Claims`] to handlers through [`Authenticated`]
//!
//! ## Security
//!
//! - Every JWT verifier runs the structural check before any key or
//!   network work
//! - Tokens are never logged; only error codes are
//! - Verifiers never retry

pub mod claims;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod firebase;
pub mod firebase_client;
pub mod gcp;
pub mod jwks;
pub mod local_key;
pub mod middleware;
pub mod token;
pub mod verifier;

pub use claims::{Claims, CustomClaimer, EmailClaimer, JwtClaims, VerifiedClaims};
pub use credentials::{BearerAuthentication, Credentials, CredentialsVerifier, SCHEME_BEARER};
pub use error::AuthError;
pub use extractor::Authenticated;
pub use firebase::{FirebaseAuthentication, FirebaseClaims, FirebaseToken, IdTokenVerifier};
pub use firebase_client::{new_firebase, FirebaseApp, FirebaseAuthClient, RefreshingFirebaseAuth};
pub use gcp::GcpAccessTokenAuthentication;
pub use local_key::LocalKeyAuthentication;
pub use middleware::{bearer_token, protect, BearerAuthConfig, Verifier};
pub use token::validate_jwt;
pub use verifier::{AccessTokenAuthentication, Authentication, VerifyContext};
