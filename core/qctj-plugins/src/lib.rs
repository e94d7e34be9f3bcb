//! QCTJ plugin host.
//!
//! Wires the settings registry and sanitizer, one license client per paid
//! extension, the usage telemetry reporter and `qctj_action` dispatch into a
//! single [`AppContext`] built from [`AppConfig`].

pub mod actions;
pub mod config;
pub mod context;
pub mod error;

pub use actions::{
    sanitize_action, ActionHandler, ActionPayload, ActionRegistry, ActionRequest, ActionSource,
    DispatchOutcome,
};
pub use config::{default_config_path, AppConfig, CONFIG_FILE_NAME, DEFAULT_DELAYED_ACTIONS};
pub use context::{
    open_store, AdminNotices, AppContext, Collaborators, LicenseSave, RequestOutcome,
    RequestState, SaveReport, WeeklyReport, TRACKING_HEADER,
};
pub use error::{PluginsError, PluginsResult};
