//! Host configuration, read from `qctj.toml`.
//!
//! A missing or broken file never stops the host: it falls back to the
//! defaults and says so in the log.

use qctj_license::{LicensedExtension, DEFAULT_API_URL};
use qctj_telemetry::{TelemetryConfig, DEFAULT_VENDOR_URL};
use qctj_types::SiteInfo;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "qctj.toml";

/// Actions that must wait for the late request phase unless configured
/// otherwise.
pub const DEFAULT_DELAYED_ACTIONS: &[&str] = &["add_to_cart"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub site: SiteInfo,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_vendor_url")]
    pub vendor_url: String,
    #[serde(default = "default_license_timeout")]
    pub license_timeout_secs: u64,
    #[serde(default = "default_checkin_timeout")]
    pub checkin_timeout_secs: u64,
    #[serde(default)]
    pub disable_checkin: bool,
    #[serde(default = "default_delayed_actions")]
    pub delayed_actions: Vec<String>,
    /// SQLite options database. Options live in memory when unset.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub extensions: Vec<LicensedExtension>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_vendor_url() -> String {
    DEFAULT_VENDOR_URL.to_string()
}

fn default_license_timeout() -> u64 {
    15
}

fn default_checkin_timeout() -> u64 {
    8
}

fn default_delayed_actions() -> Vec<String> {
    DEFAULT_DELAYED_ACTIONS.iter().map(|s| s.to_string()).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site: SiteInfo::default(),
            api_url: default_api_url(),
            vendor_url: default_vendor_url(),
            license_timeout_secs: default_license_timeout(),
            checkin_timeout_secs: default_checkin_timeout(),
            disable_checkin: false,
            delayed_actions: default_delayed_actions(),
            database_path: None,
            extensions: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads `qctj.toml` from the user's config directory.
    pub fn load() -> Self {
        Self::load_from(&default_config_path())
    }

    /// Loads configuration from an explicit path.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("No config file found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to parse config file {:?}: {}. Falling back to defaults.",
                        path, e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn license_timeout(&self) -> Duration {
        Duration::from_secs(self.license_timeout_secs)
    }

    pub fn checkin_timeout(&self) -> Duration {
        Duration::from_secs(self.checkin_timeout_secs)
    }

    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            vendor_url: self.vendor_url.clone(),
            framework_version: env!("CARGO_PKG_VERSION").to_string(),
            disable_checkin: self.disable_checkin,
        }
    }
}

/// `<config dir>/qctj/qctj.toml`, or `./qctj.toml` when the platform has no
/// config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("qctj"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE_NAME)
}
