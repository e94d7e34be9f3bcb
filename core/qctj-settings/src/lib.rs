//! Settings layer for the QCTJ plugin family.
//!
//! - [`SettingsRegistry`] declares every configurable field as
//!   tab → section → field
//! - [`Sanitizer`] is the only write path: it merges a form post over the
//!   stored blob, runs per-type [`FieldHandler`]s and applies the removal
//!   policy of the save's [`SanitizeScope`]
//! - [`OptionStore`] persists named JSON records; [`Settings`] is the
//!   request-scoped view of the `qctj_settings` blob
//!
//! Extensions hook into a save by implementing [`SanitizeHook`].

mod blob;
mod error;
mod field;
mod handler;
pub mod kses;
mod options;
mod registry;
mod sanitize;
mod store;

pub use blob::{is_empty_value, SettingsBlob, UNCHECKED_SENTINEL};
pub use error::{SettingsError, SettingsResult};
pub use field::{sanitize_key, FieldDescriptor, FieldOption, FieldType, SETTINGS_FORM_NAME};
pub use handler::{FieldHandler, SanitizeHook};
pub use options::{Settings, LEGACY_SETTINGS_OPTIONS, SETTINGS_OPTION};
pub use registry::{
    SectionInfo, SettingsRegistry, TabInfo, EXTENSIONS_TAB, GENERAL_TAB, LICENSES_TAB,
    MAIN_SECTION, MISC_TAB,
};
pub use sanitize::{
    NoticeKind, SanitizeOutcome, SanitizeScope, Sanitizer, SettingsNotice, SettingsSubmission,
    SETTINGS_UPDATED,
};
pub use store::{MemoryOptionStore, OptionStore, SqliteOptionStore};
