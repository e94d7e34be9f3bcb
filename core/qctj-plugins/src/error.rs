//! Error types for the plugin host.

use qctj_license::LicenseError;
use qctj_settings::SettingsError;
use qctj_telemetry::TelemetryError;
use thiserror::Error;

pub type PluginsResult<T> = Result<T, PluginsError>;

#[derive(Debug, Error)]
pub enum PluginsError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("license error: {0}")]
    License(#[from] LicenseError),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("permission denied: {0}")]
    Authorization(String),

    #[error("action '{action}' failed: {message}")]
    ActionFailed { action: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PluginsError {
    /// True for errors that abort the request without writing anything.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            PluginsError::Authorization(_) | PluginsError::License(LicenseError::Authorization(_))
        )
    }
}
