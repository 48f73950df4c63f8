// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! GCP IAM access token verification.
//!
//! The bearer token is an opaque OAuth access token. It is never parsed
//! locally: the verifier uses it to ask IAM whether its holder may act as a
//! given service account, and treats an empty answer as a rejection.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Request};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{AccessTokenAuthentication, AuthError};

const DEFAULT_IAM_ENDPOINT: &str = "https://iam.googleapis.com";

/// The single permission probed for.
pub const ACT_AS_PERMISSION: &str = "iam.serviceAccounts.actAs";

/// Timeout for the probe call.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of `serviceAccounts.testIamPermissions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestIamPermissionsRequest {
    pub permissions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TestIamPermissionsResponse {
    #[serde(default)]
    permissions: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IamError {
    #[error("IAM request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid IAM URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IAM returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// Resource name of a service account for IAM calls.
pub fn generate_resource_name(project: &str, name: &str) -> String {
    format!("projects/{project}/serviceAccounts/{name}@{project}.iam.gserviceaccount.com")
}

/// The probe request body: exactly one permission.
pub fn test_permissions_request() -> TestIamPermissionsRequest {
    TestIamPermissionsRequest {
        permissions: vec![ACT_AS_PERMISSION.to_string()],
    }
}

/// [`AccessTokenAuthentication`] that asks IAM whether the token's holder can
/// act as a service account.
#[derive(Debug, Clone)]
pub struct GcpAccessTokenAuthentication {
    resource: String,
    endpoint: Url,
    client: Client,
}

impl GcpAccessTokenAuthentication {
    /// Create a verifier for `service_account` in `project`.
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(project: &str, service_account: &str) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(AuthError::remote)?;
        let endpoint = Url::parse(DEFAULT_IAM_ENDPOINT).map_err(AuthError::remote)?;

        Ok(Self {
            resource: generate_resource_name(project, service_account),
            endpoint,
            client,
        })
    }

    /// Point the verifier at a different IAM endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, AuthError> {
        self.endpoint = Url::parse(endpoint).map_err(AuthError::remote)?;
        Ok(self)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    fn build_probe(&self, token: &str) -> Result<Request, IamError> {
        let url = self
            .endpoint
            .join(&format!("v1/{}:testIamPermissions", self.resource))?;
        Ok(self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&test_permissions_request())
            .build()?)
    }

    /// Build the probe call, authenticated with `token`.
    pub fn probe_request(&self, token: &str) -> Result<Request, AuthError> {
        self.build_probe(token).map_err(AuthError::remote)
    }

    async fn probe(&self, token: &str) -> Result<Vec<String>, IamError> {
        let request = self.build_probe(token)?;
        let response = self.client.execute(request).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IamError::Status(status));
        }

        let body: TestIamPermissionsResponse = response.json().await?;
        Ok(body.permissions)
    }
}

#[async_trait]
impl AccessTokenAuthentication for GcpAccessTokenAuthentication {
    async fn verify_access_token(&self, token: &str) -> Result<(), AuthError> {
        if token.is_empty() {
            return Err(AuthError::TokenNotProvided);
        }

        let permissions = self.probe(token).await.map_err(|e| {
            tracing::debug!(error = %e, resource = %self.resource, "IAM permission probe failed");
            AuthError::remote(e)
        })?;

        if permissions.is_empty() {
            return Err(AuthError::MissingPermissions);
        }
        Ok(())
    }
}
