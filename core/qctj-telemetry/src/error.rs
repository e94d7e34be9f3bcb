//! Telemetry error types.

use qctj_settings::SettingsError;
use thiserror::Error;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors that can occur while reporting usage.
///
/// Transport failures of a fire-and-forget check-in never reach the caller;
/// they are logged from the spawned task. [`TelemetryError::Network`] only
/// comes back from an awaited [`HttpCheckinTransport::post`](crate::HttpCheckinTransport::post).
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("network error: {0}")]
    Network(String),

    #[error("storage error: {0}")]
    Storage(#[from] SettingsError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
