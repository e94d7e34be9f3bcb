//! Error types for the licensing module.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The license server could not be reached or answered with an error status.
    #[error("network error: {0}")]
    Network(String),

    /// The license server answered with something other than a license payload.
    #[error("invalid license response: {0}")]
    InvalidResponse(String),

    /// The request failed a nonce or capability check.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Reading or writing the license record failed.
    #[error("storage error: {0}")]
    Storage(#[from] qctj_settings::SettingsError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Returns true for failures talking to the license server. These are
    /// logged and leave the stored record untouched.
    pub fn is_transport(&self) -> bool {
        matches!(self, LicenseError::Network(_) | LicenseError::InvalidResponse(_))
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
