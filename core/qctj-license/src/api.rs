//! Client for the vendor's license server.
//!
//! Every call is a form-encoded POST to a single endpoint, discriminated by
//! `edd_action`, answered with a JSON license payload.

use crate::error::{LicenseError, LicenseResult};
use crate::status::LicenseResponse;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Vendor endpoint used when no other URL is configured.
pub const DEFAULT_API_URL: &str = "https://qctechjunkie.com/";

/// License calls block the admin request, so they get a short timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseAction {
    ActivateLicense,
    DeactivateLicense,
    CheckLicense,
}

impl LicenseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseAction::ActivateLicense => "activate_license",
            LicenseAction::DeactivateLicense => "deactivate_license",
            LicenseAction::CheckLicense => "check_license",
        }
    }
}

impl fmt::Display for LicenseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call to the license server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRequest {
    pub action: LicenseAction,
    pub license: String,
    pub item_name: String,
    pub url: String,
    pub item_id: Option<u64>,
}

impl LicenseRequest {
    /// Form body in the order the server documents it.
    pub fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("edd_action", self.action.as_str().to_string()),
            ("license", self.license.clone()),
            ("item_name", self.item_name.clone()),
            ("url", self.url.clone()),
        ];
        if let Some(item_id) = self.item_id {
            form.push(("item_id", item_id.to_string()));
        }
        form
    }
}

/// Transport to the license server.
#[async_trait]
pub trait LicenseApi: Send + Sync {
    /// Performs one call.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Network`] when the server is unreachable, times
    /// out or answers with a non-success status, and
    /// [`LicenseError::InvalidResponse`] when the body is not a license payload.
    async fn call(&self, request: &LicenseRequest) -> LicenseResult<LicenseResponse>;
}

/// [`LicenseApi`] over HTTPS.
pub struct HttpLicenseApi {
    client: Client,
    api_url: String,
}

impl HttpLicenseApi {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> LicenseResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LicenseError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl LicenseApi for HttpLicenseApi {
    async fn call(&self, request: &LicenseRequest) -> LicenseResult<LicenseResponse> {
        debug!(action = %request.action, item = %request.item_name, "Calling license server");

        let response = self
            .client
            .post(&self.api_url)
            .form(&request.form())
            .send()
            .await
            .map_err(|e| LicenseError::Network(format!("{} request failed: {e}", request.action)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LicenseError::Network(format!(
                "{} returned HTTP {status}",
                request.action
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LicenseError::Network(format!("failed to read response: {e}")))?;

        serde_json::from_str(&body).map_err(|e| LicenseError::InvalidResponse(e.to_string()))
    }
}
