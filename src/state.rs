// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::auth::BearerAuthConfig;

#[derive(Clone)]
pub struct AppState {
    /// Name of the configured backend, reported by the health check.
    pub backend: &'static str,
    pub auth: BearerAuthConfig,
}

impl AppState {
    pub fn new(backend: &'static str, auth: BearerAuthConfig) -> Self {
        Self { backend, auth }
    }
}
