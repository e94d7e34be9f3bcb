//! Error types for the settings layer.

use thiserror::Error;

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Errors that can occur while registering, sanitizing or persisting settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Two fields were registered with the same id.
    #[error("duplicate settings field id: {0}")]
    DuplicateFieldId(String),

    /// A field id was looked up that was never registered.
    #[error("unknown settings field: {0}")]
    UnknownField(String),

    /// A field declared a type this registry does not know.
    #[error("unknown settings field type '{field_type}' for field '{field_id}'")]
    UnknownFieldType { field_id: String, field_type: String },

    /// A submitted value was rejected by its type sanitizer.
    #[error("invalid value for '{field_id}': {message}")]
    Validation { field_id: String, message: String },

    /// Options table error from SQLite.
    #[error("options table error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl SettingsError {
    /// Returns true for programming errors that must fail registration loudly.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SettingsError::DuplicateFieldId(_) | SettingsError::UnknownFieldType { .. }
        )
    }
}
