// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the typed [`Settings`] built
//! from them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH_BACKEND` | `rsa`, `firebase` or `gcp` | Required |
//! | `AUTH_PUBLIC_KEY_FILE` | PEM RSA public key (`rsa`) | Required for `rsa` |
//! | `FIREBASE_PROJECT_ID` | Firebase project (`firebase`) | One of these two |
//! | `FIREBASE_CREDENTIALS_FILE` | Service account JSON (`firebase`) | is required |
//! | `GCP_PROJECT` | Project owning the service account (`gcp`) | Required for `gcp` |
//! | `GCP_SERVICE_ACCOUNT` | Service account name (`gcp`) | Required for `gcp` |
//! | `AUTH_VERIFY_TIMEOUT_SECS` | Per-request verification bound | `30` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3030` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::firebase_client::FirebaseError;
use crate::auth::{
    AuthError, BearerAuthConfig, FirebaseApp, FirebaseAuthentication, GcpAccessTokenAuthentication,
    LocalKeyAuthentication, RefreshingFirebaseAuth,
};

pub const AUTH_BACKEND_ENV: &str = "AUTH_BACKEND";
pub const AUTH_PUBLIC_KEY_FILE_ENV: &str = "AUTH_PUBLIC_KEY_FILE";
pub const FIREBASE_PROJECT_ID_ENV: &str = "FIREBASE_PROJECT_ID";
pub const FIREBASE_CREDENTIALS_FILE_ENV: &str = "FIREBASE_CREDENTIALS_FILE";
pub const GCP_PROJECT_ENV: &str = "GCP_PROJECT";
pub const GCP_SERVICE_ACCOUNT_ENV: &str = "GCP_SERVICE_ACCOUNT";
pub const AUTH_VERIFY_TIMEOUT_SECS_ENV: &str = "AUTH_VERIFY_TIMEOUT_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3030;
const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },

    #[error("unknown authentication backend {0:?} (expected rsa, firebase or gcp)")]
    UnknownBackend(String),

    #[error("failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Firebase(#[from] FirebaseError),
}

/// Where the Firebase project comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirebaseSource {
    ProjectId(String),
    CredentialsFile(PathBuf),
}

/// The verifier selected for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Rsa { public_key_file: PathBuf },
    Firebase(FirebaseSource),
    Gcp { project: String, service_account: String },
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Rsa { .. } => "rsa",
            Backend::Firebase(_) => "firebase",
            Backend::Gcp { .. } => "gcp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub backend: Backend,
    pub verify_timeout: Duration,
    pub log_format: LogFormat,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load settings from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.is_empty());
        let require = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));

        let backend_name = require(AUTH_BACKEND_ENV)?;
        let backend = match backend_name.to_ascii_lowercase().as_str() {
            "rsa" => Backend::Rsa {
                public_key_file: PathBuf::from(require(AUTH_PUBLIC_KEY_FILE_ENV)?),
            },
            "firebase" => match (
                get(FIREBASE_PROJECT_ID_ENV),
                get(FIREBASE_CREDENTIALS_FILE_ENV),
            ) {
                (Some(project), _) => Backend::Firebase(FirebaseSource::ProjectId(project)),
                (None, Some(path)) => {
                    Backend::Firebase(FirebaseSource::CredentialsFile(PathBuf::from(path)))
                }
                (None, None) => return Err(ConfigError::Missing(FIREBASE_PROJECT_ID_ENV)),
            },
            "gcp" => Backend::Gcp {
                project: require(GCP_PROJECT_ENV)?,
                service_account: require(GCP_SERVICE_ACCOUNT_ENV)?,
            },
            _ => return Err(ConfigError::UnknownBackend(backend_name)),
        };

        let port = match get(PORT_ENV) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                var: PORT_ENV,
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let verify_timeout = match get(AUTH_VERIFY_TIMEOUT_SECS_ENV) {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::Invalid {
                    var: AUTH_VERIFY_TIMEOUT_SECS_ENV,
                    value,
                })?,
            None => Duration::from_secs(DEFAULT_VERIFY_TIMEOUT_SECS),
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            backend,
            verify_timeout,
            log_format,
        })
    }

    /// Parse the bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::Invalid {
            var: HOST_ENV,
            value: addr,
        })
    }

    /// Build the middleware configuration for the selected backend.
    pub fn bearer_config(&self) -> Result<BearerAuthConfig, ConfigError> {
        let config = match &self.backend {
            Backend::Rsa { public_key_file } => {
                let pem = std::fs::read(public_key_file).map_err(|e| ConfigError::Io {
                    path: public_key_file.clone(),
                    reason: e.to_string(),
                })?;
                BearerAuthConfig::jwt(LocalKeyAuthentication::from_rsa_pem(&pem)?)
            }
            Backend::Firebase(source) => {
                let app = match source {
                    FirebaseSource::ProjectId(project) => FirebaseApp::new(project.clone()),
                    FirebaseSource::CredentialsFile(path) => FirebaseApp::from_credentials_file(path)?,
                };
                BearerAuthConfig::jwt(FirebaseAuthentication::new(RefreshingFirebaseAuth::new(app)))
            }
            Backend::Gcp {
                project,
                service_account,
            } => BearerAuthConfig::access_token(GcpAccessTokenAuthentication::new(
                project,
                service_account,
            )?),
        };

        Ok(config.with_timeout(self.verify_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Verifier;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn backend_is_required() {
        let err = Settings::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(AUTH_BACKEND_ENV)));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = Settings::from_lookup(lookup(&[("AUTH_BACKEND", "ldap")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(name) if name == "ldap"));
    }

    #[test]
    fn rsa_backend_with_defaults() {
        let settings = Settings::from_lookup(lookup(&[
            ("AUTH_BACKEND", "rsa"),
            ("AUTH_PUBLIC_KEY_FILE", "testdata/key.pem"),
        ]))
        .unwrap();

        assert_eq!(
            settings.backend,
            Backend::Rsa {
                public_key_file: PathBuf::from("testdata/key.pem")
            }
        );
        assert_eq!(settings.port, 3030);
        assert_eq!(settings.verify_timeout, Duration::from_secs(30));
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert_eq!(settings.bind_addr().unwrap().port(), 3030);
    }

    #[test]
    fn firebase_prefers_project_id_over_credentials_file() {
        let settings = Settings::from_lookup(lookup(&[
            ("AUTH_BACKEND", "firebase"),
            ("FIREBASE_PROJECT_ID", "demo"),
            ("FIREBASE_CREDENTIALS_FILE", "/secrets/sa.json"),
        ]))
        .unwrap();
        assert_eq!(
            settings.backend,
            Backend::Firebase(FirebaseSource::ProjectId("demo".into()))
        );
    }

    #[test]
    fn gcp_needs_both_names() {
        let err = Settings::from_lookup(lookup(&[
            ("AUTH_BACKEND", "gcp"),
            ("GCP_PROJECT", "project-test"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(GCP_SERVICE_ACCOUNT_ENV)));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = Settings::from_lookup(lookup(&[
            ("AUTH_BACKEND", "gcp"),
            ("GCP_PROJECT", "p"),
            ("GCP_SERVICE_ACCOUNT", "sa"),
            ("PORT", "http"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: PORT_ENV, .. }));

        let err = Settings::from_lookup(lookup(&[
            ("AUTH_BACKEND", "gcp"),
            ("GCP_PROJECT", "p"),
            ("GCP_SERVICE_ACCOUNT", "sa"),
            ("AUTH_VERIFY_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: AUTH_VERIFY_TIMEOUT_SECS_ENV, .. }));
    }

    #[test]
    fn rsa_settings_build_a_jwt_verifier() {
        let settings = Settings::from_lookup(lookup(&[
            ("AUTH_BACKEND", "rsa"),
            ("AUTH_PUBLIC_KEY_FILE", concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/key.pem")),
            ("AUTH_VERIFY_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        let config = settings.bearer_config().unwrap();
        assert!(matches!(config.verifier, Verifier::Jwt(_)));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn gcp_settings_build_an_access_token_verifier() {
        let settings = Settings::from_lookup(lookup(&[
            ("AUTH_BACKEND", "gcp"),
            ("GCP_PROJECT", "project-test"),
            ("GCP_SERVICE_ACCOUNT", "my-test-name"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(settings.log_format, LogFormat::Json);
        let config = settings.bearer_config().unwrap();
        assert!(matches!(config.verifier, Verifier::AccessToken(_)));
    }

    #[test]
    fn missing_key_file_is_an_io_error() {
        let settings = Settings::from_lookup(lookup(&[
            ("AUTH_BACKEND", "rsa"),
            ("AUTH_PUBLIC_KEY_FILE", "/nonexistent/key.pem"),
        ]))
        .unwrap();
        assert!(matches!(settings.bearer_config(), Err(ConfigError::Io { .. })));
    }
}
