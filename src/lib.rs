// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tokengate - Bearer Token Verification for Axum Services
//!
//! Verifies `Authorization: Bearer` credentials against one of three
//! backends and exposes the verified claims to request handlers.
//!
//! ## Modules
//!
//! - `auth` - Verifiers, claims, and the bearer middleware
//! - `api` - Demo HTTP surface (`/health`, `/v1/me`)
//! - `config` - Environment-driven settings
//! - `logging` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod logging;
pub mod state;
