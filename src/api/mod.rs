// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{auth::protect, state::AppState};

pub mod health;
pub mod me;

pub fn router(state: AppState) -> Router {
    let v1_routes = protect(
        Router::new().route("/me", get(me::whoami)),
        state.auth.clone(),
    );

    Router::new()
        .route("/health", get(health::health))
        .with_state(state)
        .nest("/v1", v1_routes)
        .layer(TraceLayer::new_for_http())
}
