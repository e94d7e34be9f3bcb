use qctj_types::SiteInfo;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hex characters kept from the site URL digest.
pub const SITE_ID_LEN: usize = 16;

/// What one check-in reports about the site.
///
/// Never persisted. The home URL itself is not part of it, only
/// [`site_id`](Self::site_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub platform_version: String,
    pub framework_version: String,
    pub server: String,
    pub multisite: bool,
    pub site_id: String,
    /// `"<name> <version>"` of the active theme.
    pub theme: String,
    pub active_extensions: Vec<String>,
    pub inactive_extensions: Vec<String>,
    pub locale: String,
}

impl TelemetrySnapshot {
    /// Form-encoded body of the check-in POST.
    pub fn form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("platform_version".to_string(), self.platform_version.clone()),
            ("qctj_version".to_string(), self.framework_version.clone()),
            ("server".to_string(), self.server.clone()),
            (
                "multisite".to_string(),
                if self.multisite { "1" } else { "0" }.to_string(),
            ),
            ("site_id".to_string(), self.site_id.clone()),
            ("theme".to_string(), self.theme.clone()),
            ("locale".to_string(), self.locale.clone()),
        ];
        form.extend(
            self.active_extensions
                .iter()
                .map(|ext| ("active_plugins[]".to_string(), ext.clone())),
        );
        form.extend(
            self.inactive_extensions
                .iter()
                .map(|ext| ("inactive_plugins[]".to_string(), ext.clone())),
        );
        form
    }
}

/// Anonymous, stable identifier of a site.
///
/// Case and trailing slashes of the home URL do not change the id.
pub fn site_id(home_url: &str) -> String {
    let normalized = format!("{}/", home_url.trim_end_matches('/')).to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(SITE_ID_LEN);
    id
}

/// Collects the snapshot for `site`. Pure.
pub fn build_snapshot(site: &SiteInfo, framework_version: &str) -> TelemetrySnapshot {
    TelemetrySnapshot {
        platform_version: site.platform_version.clone(),
        framework_version: framework_version.to_string(),
        server: site.server_software.clone(),
        multisite: site.multisite,
        site_id: site_id(&site.home_url),
        theme: site.theme.clone(),
        active_extensions: site.active_extensions.clone(),
        inactive_extensions: site.inactive_extensions(),
        locale: site.locale.clone(),
    }
}
