//! License status taxonomy and the persisted license record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Status of an extension's license as last reported by the license server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    Empty,
    Valid,
    Invalid,
    Expired,
    Revoked,
    Missing,
    SiteInactive,
    ItemNameMismatch,
    NoActivationsLeft,
    LicenseNotActivable,
    Unknown,
}

impl LicenseStatus {
    /// Maps a server status or error code into the taxonomy.
    pub fn from_code(code: &str) -> Self {
        match code {
            "" => LicenseStatus::Empty,
            "valid" => LicenseStatus::Valid,
            "invalid" => LicenseStatus::Invalid,
            "expired" => LicenseStatus::Expired,
            "revoked" | "disabled" => LicenseStatus::Revoked,
            "missing" => LicenseStatus::Missing,
            "site_inactive" | "inactive" => LicenseStatus::SiteInactive,
            "item_name_mismatch" => LicenseStatus::ItemNameMismatch,
            "no_activations_left" => LicenseStatus::NoActivationsLeft,
            "license_not_activable" => LicenseStatus::LicenseNotActivable,
            _ => LicenseStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Empty => "empty",
            LicenseStatus::Valid => "valid",
            LicenseStatus::Invalid => "invalid",
            LicenseStatus::Expired => "expired",
            LicenseStatus::Revoked => "revoked",
            LicenseStatus::Missing => "missing",
            LicenseStatus::SiteInactive => "site_inactive",
            LicenseStatus::ItemNameMismatch => "item_name_mismatch",
            LicenseStatus::NoActivationsLeft => "no_activations_left",
            LicenseStatus::LicenseNotActivable => "license_not_activable",
            LicenseStatus::Unknown => "unknown",
        }
    }

    pub fn is_valid(&self) -> bool {
        *self == LicenseStatus::Valid
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a license stops being valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LicenseExpiry {
    Lifetime,
    At(DateTime<Utc>),
}

impl LicenseExpiry {
    /// Parses `lifetime`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` or RFC 3339.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("lifetime") {
            return Some(LicenseExpiry::Lifetime);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Some(LicenseExpiry::At(Utc.from_utc_datetime(&dt)));
        }
        if let Some(dt) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Some(LicenseExpiry::At(Utc.from_utc_datetime(&dt)));
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| LicenseExpiry::At(dt.with_timezone(&Utc)))
    }

    pub fn is_lifetime(&self) -> bool {
        matches!(self, LicenseExpiry::Lifetime)
    }
}

impl TryFrom<String> for LicenseExpiry {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        LicenseExpiry::parse(&raw).ok_or_else(|| format!("unrecognised expiry: {raw}"))
    }
}

impl From<LicenseExpiry> for String {
    fn from(expiry: LicenseExpiry) -> Self {
        match expiry {
            LicenseExpiry::Lifetime => "lifetime".into(),
            LicenseExpiry::At(dt) => dt.to_rfc3339(),
        }
    }
}

/// Body of a license server reply.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LicenseResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub error: Option<String>,
    /// A date string, `"lifetime"`, or `false` for keys that never activated.
    #[serde(default)]
    pub expires: Option<Value>,
    #[serde(default)]
    pub item_name: Option<String>,
}

impl LicenseResponse {
    /// Status this reply maps to.
    ///
    /// `license == "valid"` wins unless the server also flagged a failure;
    /// otherwise the `error` code decides, falling back to the `license` code.
    pub fn status(&self) -> LicenseStatus {
        if self.license == "valid" && self.success != Some(false) {
            return LicenseStatus::Valid;
        }
        match self.error.as_deref().filter(|e| !e.is_empty()) {
            Some(error) => LicenseStatus::from_code(error),
            None if self.license.is_empty() => LicenseStatus::Unknown,
            None => match LicenseStatus::from_code(&self.license) {
                LicenseStatus::Valid => LicenseStatus::Unknown,
                other => other,
            },
        }
    }

    pub fn expiry(&self) -> Option<LicenseExpiry> {
        self.expires
            .as_ref()
            .and_then(Value::as_str)
            .and_then(LicenseExpiry::parse)
    }
}

/// What is persisted per extension under `<shortname>_license_active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub shortname: String,
    pub key: String,
    pub status: LicenseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<LicenseExpiry>,
    pub last_checked: DateTime<Utc>,
    /// Raw error code from the server, kept for the "unknown error" notice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LicenseRecord {
    pub fn from_response(
        shortname: &str,
        key: &str,
        response: &LicenseResponse,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            shortname: shortname.to_string(),
            key: key.to_string(),
            status: response.status(),
            expires: response.expiry(),
            last_checked: checked_at,
            error: response.error.clone().filter(|e| !e.is_empty()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status.is_valid()
    }
}
