//! Messages shown next to a license key field and on admin pages.

use crate::status::{LicenseExpiry, LicenseRecord, LicenseStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Shown on the plugin row when the extension has no valid license.
pub const PLUGIN_ROW_HINT: &str = "Enter valid license key for automatic updates.";

/// Shown at the top of the licenses tab.
pub const LICENSES_HELP_TEXT: &str = "Enter your extension license keys here to receive updates for purchased extensions. If your license key has expired, please renew your license.";

/// Days before expiry from which the "expires soon" notice is shown.
pub const EXPIRES_SOON_DAYS: i64 = 30;

/// A message rendered under a license key field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseNotice {
    /// `empty`, `valid`, `expired` or `error`.
    pub class: &'static str,
    /// Extra CSS class, e.g. `license-expires-soon-notice`.
    pub status_class: Option<&'static str>,
    pub message: String,
}

impl LicenseNotice {
    fn new(class: &'static str, status_class: Option<&'static str>, message: String) -> Self {
        Self {
            class,
            status_class,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self::new("error", Some("license-error-notice"), message)
    }
}

fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%B %-d, %Y").to_string()
}

fn expiry_date(record: &LicenseRecord) -> String {
    match record.expires {
        Some(LicenseExpiry::At(dt)) => format_date(&dt),
        Some(LicenseExpiry::Lifetime) => "never".into(),
        None => "an unknown date".into(),
    }
}

fn renew_url(vendor: &str, key: &str, medium: &str) -> String {
    format!(
        "{vendor}/checkout/?qctj_license_key={}&utm_campaign=admin&utm_source=licenses&utm_medium={medium}",
        urlencoding::encode(key)
    )
}

/// The notice for one license key field. Links point at `vendor_url`.
pub fn license_notice(
    vendor_url: &str,
    item_name: &str,
    key: &str,
    record: Option<&LicenseRecord>,
    now: DateTime<Utc>,
) -> LicenseNotice {
    let vendor = vendor_url.trim_end_matches('/');
    let Some(record) = record else {
        return LicenseNotice::new(
            "empty",
            None,
            format!("To receive updates, please enter your valid {item_name} license key."),
        );
    };

    match record.status {
        LicenseStatus::Valid => valid_notice(vendor, record, key, now),
        LicenseStatus::Expired => LicenseNotice::new(
            "expired",
            Some("license-expired-notice"),
            format!(
                "Your license key expired on {}. Please <a href=\"{}\" target=\"_blank\">renew your license key</a>.",
                expiry_date(record),
                renew_url(vendor, key, "expired")
            ),
        ),
        LicenseStatus::Revoked => LicenseNotice::error(format!(
            "Your license key has been disabled. Please <a href=\"{vendor}/support?utm_campaign=admin&utm_source=licenses&utm_medium=revoked\" target=\"_blank\">contact support</a> for more information."
        )),
        LicenseStatus::Missing => LicenseNotice::error(format!(
            "Invalid license. Please <a href=\"{vendor}/your-account?utm_campaign=admin&utm_source=licenses&utm_medium=missing\" target=\"_blank\">visit your account page</a> and verify it."
        )),
        LicenseStatus::Invalid | LicenseStatus::SiteInactive => LicenseNotice::error(format!(
            "Your {item_name} is not active for this URL. Please <a href=\"{vendor}/your-account?utm_campaign=admin&utm_source=licenses&utm_medium=invalid\" target=\"_blank\">visit your account page</a> to manage your license key URLs."
        )),
        LicenseStatus::ItemNameMismatch => LicenseNotice::error(format!(
            "This appears to be an invalid license key for {item_name}."
        )),
        LicenseStatus::NoActivationsLeft => LicenseNotice::error(format!(
            "Your license key has reached its activation limit. <a href=\"{vendor}/your-account/\">View possible upgrades</a> now."
        )),
        LicenseStatus::LicenseNotActivable => LicenseNotice::error(
            "The key you entered belongs to a bundle, please use the product specific license key."
                .to_string(),
        ),
        LicenseStatus::Empty | LicenseStatus::Unknown => {
            let error = record.error.as_deref().unwrap_or("unknown_error");
            LicenseNotice::error(format!(
                "There was an error with this license key: {error}. Please <a href=\"{vendor}/support\">contact our support team</a>."
            ))
        }
    }
}

fn valid_notice(
    vendor: &str,
    record: &LicenseRecord,
    key: &str,
    now: DateTime<Utc>,
) -> LicenseNotice {
    match record.expires {
        Some(LicenseExpiry::Lifetime) => LicenseNotice::new(
            "valid",
            Some("license-lifetime-notice"),
            "License key never expires.".to_string(),
        ),
        Some(LicenseExpiry::At(expires))
            if expires > now && expires - now < Duration::days(EXPIRES_SOON_DAYS) =>
        {
            LicenseNotice::new(
                "valid",
                Some("license-expires-soon-notice"),
                format!(
                    "Your license key expires soon! It expires on {}. <a href=\"{}\" target=\"_blank\">Renew your license key</a>.",
                    format_date(&expires),
                    renew_url(vendor, key, "renew")
                ),
            )
        }
        _ => LicenseNotice::new(
            "valid",
            Some("license-expiration-date-notice"),
            format!("Your license key expires on {}.", expiry_date(record)),
        ),
    }
}

/// Admin-wide banner when some license needs attention. Suppressed on the
/// licenses tab itself.
pub fn invalid_license_banner(active_tab: Option<&str>) -> Option<String> {
    if active_tab == Some("licenses") {
        return None;
    }
    Some(
        "You have invalid or expired license keys for QCTechJunkie Plugins. Please go to the <a href=\"admin.php?page=qctj-plugins&tab=licenses\">Licenses page</a> to correct this issue."
            .to_string(),
    )
}
