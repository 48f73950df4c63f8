// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::{Authenticated, Claims};

/// What the caller's verified token says about them.
///
/// Access-token backends verify without producing claims, so every field
/// other than `authenticated` is optional.
#[derive(Debug, Default, Serialize)]
pub struct MeResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audience: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// `GET /v1/me`
pub async fn whoami(claims: Option<Authenticated>) -> Json<MeResponse> {
    let Some(Authenticated(claims)) = claims else {
        return Json(MeResponse {
            authenticated: true,
            ..Default::default()
        });
    };

    Json(MeResponse {
        authenticated: true,
        subject: claims.subject().ok(),
        issuer: claims.issuer().ok(),
        audience: claims.audience().unwrap_or_default(),
        email: claims.email(),
        expires_at: claims.expiration_time().ok(),
    })
}
