//! Site facts supplied by the host platform.

use serde::{Deserialize, Serialize};

/// Locale used when the host does not report one.
pub const DEFAULT_LOCALE: &str = "en_US";

/// What the host knows about the site this code runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    /// Public home URL (e.g. `https://example.com`).
    pub home_url: String,
    /// Site title.
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Host platform version string.
    #[serde(default)]
    pub platform_version: String,
    /// Web server software banner, if known.
    #[serde(default)]
    pub server_software: String,
    #[serde(default)]
    pub multisite: bool,
    /// Active theme as `"<name> <version>"`.
    #[serde(default)]
    pub theme: String,
    /// Identifiers of active extensions.
    #[serde(default)]
    pub active_extensions: Vec<String>,
    /// Identifiers of every installed extension, active or not.
    #[serde(default)]
    pub installed_extensions: Vec<String>,
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            home_url: "http://localhost".to_string(),
            name: String::new(),
            locale: default_locale(),
            platform_version: String::new(),
            server_software: String::new(),
            multisite: false,
            theme: String::new(),
            active_extensions: Vec::new(),
            installed_extensions: Vec::new(),
        }
    }
}

impl SiteInfo {
    /// Creates site info for the given home URL with defaults elsewhere.
    #[must_use]
    pub fn new(home_url: impl Into<String>) -> Self {
        Self {
            home_url: home_url.into(),
            ..Default::default()
        }
    }

    /// Home URL with exactly one trailing slash.
    #[must_use]
    pub fn home_url_slashed(&self) -> String {
        format!("{}/", self.home_url.trim_end_matches('/'))
    }

    /// Installed extensions that are not active, in installation order.
    #[must_use]
    pub fn inactive_extensions(&self) -> Vec<String> {
        self.installed_extensions
            .iter()
            .filter(|ext| !self.active_extensions.contains(ext))
            .cloned()
            .collect()
    }

    /// Returns true for local or development hosts where opt-in prompts are
    /// pointless.
    #[must_use]
    pub fn is_development_host(&self) -> bool {
        let url = self.home_url_slashed().to_lowercase();
        url.contains("dev") || url.contains("localhost") || url.contains(":8888")
    }
}
