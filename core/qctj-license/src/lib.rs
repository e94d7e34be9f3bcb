//! License activation for QCTJ extensions.
//!
//! Every paid extension owns one [`LicenseClient`]. The client activates,
//! deactivates and periodically re-checks the extension's key against the
//! vendor's license server and persists the answer as a [`LicenseRecord`].
//!
//! # Failure policy
//!
//! - Server unreachable, timed out or answering garbage: logged at `warn`,
//!   stored record left as it was ([`LicenseOutcome::Unchanged`])
//! - Failed nonce on deactivation: [`LicenseError::Authorization`]
//! - Everything else that does not apply to the request is a silent
//!   [`LicenseOutcome::Skipped`]

mod api;
mod client;
mod error;
mod notice;
mod status;

pub use api::{
    HttpLicenseApi, LicenseAction, LicenseApi, LicenseRequest, DEFAULT_API_URL, DEFAULT_TIMEOUT,
};
pub use client::{
    LicenseClient, LicenseOutcome, LicenseState, LicensedExtension, NoUpdateCache, SkipReason,
    UpdateCache,
};
pub use error::{LicenseError, LicenseResult};
pub use notice::{
    invalid_license_banner, license_notice, LicenseNotice, EXPIRES_SOON_DAYS, LICENSES_HELP_TEXT,
    PLUGIN_ROW_HINT,
};
pub use status::{LicenseExpiry, LicenseRecord, LicenseResponse, LicenseStatus};
