//! Per-extension license state machine.
//!
//! ```text
//! Empty ──activate──▶ Pending ──▶ Valid | Invalid(status)
//! Valid ──deactivate──▶ Deactivated ──▶ Empty
//! any   ──weekly check──▶ Pending
//! ```
//!
//! The stored [`LicenseRecord`] is the source of truth; `Pending` and
//! `Deactivated` only exist for the lifetime of one client.

use crate::api::{LicenseAction, LicenseApi, LicenseRequest, DEFAULT_API_URL};
use crate::error::{LicenseError, LicenseResult};
use crate::notice::{self, LicenseNotice};
use crate::status::{LicenseRecord, LicenseStatus};
use qctj_settings::{FieldDescriptor, OptionStore, Settings, SettingsSubmission};
use qctj_types::{Authorizer, Clock, MANAGE_OPTIONS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Host cache of available extension updates.
pub trait UpdateCache: Send + Sync {
    /// Forgets cached update data so the next check re-queries upstream.
    fn invalidate(&self);
}

/// For hosts without an update cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUpdateCache;

impl UpdateCache for NoUpdateCache {
    fn invalidate(&self) {}
}

/// A licensed extension as declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensedExtension {
    pub item_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub item_id: Option<u64>,
    /// Settings key that held the license key before the licenses tab existed.
    #[serde(default)]
    pub legacy_option: Option<String>,
}

impl LicensedExtension {
    pub fn new(item_name: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            version: String::new(),
            author: String::new(),
            item_id: None,
            legacy_option: None,
        }
    }

    /// `qctj_` plus the lower-cased item name, spaces as underscores, with
    /// everything outside `[a-zA-Z0-9_]` removed.
    pub fn shortname(&self) -> String {
        let cleaned: String = self
            .item_name
            .to_lowercase()
            .replace(' ', "_")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
            .collect();
        format!("qctj_{cleaned}")
    }
}

/// Observable state of one extension's license.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseState {
    Empty,
    Pending,
    Valid,
    Invalid(LicenseStatus),
    Deactivated,
}

/// Why an operation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NonceRejected,
    NotAuthorized,
    EmptyKey,
    DeactivateRequested,
    AlreadyValid,
    NotLicenseSave,
    NoDeactivateRequest,
    NotValid,
    SavingSettings,
    NoKeyStored,
}

/// What an operation did.
#[derive(Debug, Clone, PartialEq)]
pub enum LicenseOutcome {
    Skipped(SkipReason),
    /// The server could not be reached; nothing was written.
    Unchanged,
    Updated(LicenseRecord),
    Cleared,
}

/// License client for one extension.
pub struct LicenseClient {
    extension: LicensedExtension,
    shortname: String,
    site_url: String,
    vendor_url: String,
    api: Arc<dyn LicenseApi>,
    store: Arc<dyn OptionStore>,
    updates: Arc<dyn UpdateCache>,
    clock: Arc<dyn Clock>,
    in_flight: AtomicBool,
    deactivated: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl LicenseClient {
    pub fn new(
        extension: LicensedExtension,
        site_url: impl Into<String>,
        api: Arc<dyn LicenseApi>,
        store: Arc<dyn OptionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shortname = extension.shortname();
        Self {
            extension,
            shortname,
            site_url: site_url.into(),
            vendor_url: DEFAULT_API_URL.to_string(),
            api,
            store,
            updates: Arc::new(NoUpdateCache),
            clock,
            in_flight: AtomicBool::new(false),
            deactivated: AtomicBool::new(false),
        }
    }

    pub fn with_update_cache(mut self, updates: Arc<dyn UpdateCache>) -> Self {
        self.updates = updates;
        self
    }

    /// Base URL of the vendor store linked from license notices.
    pub fn with_vendor_url(mut self, vendor_url: impl Into<String>) -> Self {
        self.vendor_url = vendor_url.into();
        self
    }

    pub fn extension(&self) -> &LicensedExtension {
        &self.extension
    }

    pub fn shortname(&self) -> &str {
        &self.shortname
    }

    /// Settings key holding this extension's license key.
    pub fn key_option(&self) -> String {
        format!("{}_license_key", self.shortname)
    }

    /// Option holding the [`LicenseRecord`].
    pub fn record_option(&self) -> String {
        format!("{}_license_active", self.shortname)
    }

    /// Nonce action (and posted field name) guarding license saves.
    pub fn nonce_action(&self) -> String {
        format!("{}-nonce", self.key_option())
    }

    /// Posted button name requesting deactivation.
    pub fn deactivate_field(&self) -> String {
        format!("{}_deactivate", self.key_option())
    }

    /// The `license_key` field this extension contributes to the licenses tab.
    pub fn settings_field(&self) -> FieldDescriptor {
        FieldDescriptor::license_key(
            &self.key_option(),
            &self.extension.item_name,
            &self.record_option(),
        )
    }

    /// Adds this extension to the map of extensions that accept beta builds.
    pub fn register_beta_support(&self, betas: &mut BTreeMap<String, String>) {
        betas.insert(self.shortname.clone(), self.extension.item_name.clone());
    }

    /// Stored license key, falling back to the legacy settings key.
    pub fn license_key(&self, settings: &Settings) -> String {
        let key = settings.get_str(&self.key_option()).unwrap_or_default().trim();
        if !key.is_empty() {
            return key.to_string();
        }
        self.extension
            .legacy_option
            .as_deref()
            .and_then(|legacy| settings.get_str(legacy))
            .map(|legacy| legacy.trim().to_string())
            .unwrap_or_default()
    }

    /// The stored record. A record that no longer parses is treated as absent.
    pub fn record(&self) -> LicenseResult<Option<LicenseRecord>> {
        let Some(raw) = self.store.get(&self.record_option())? else {
            return Ok(None);
        };
        match serde_json::from_value(raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(extension = %self.shortname, error = %e, "Ignoring unreadable license record");
                Ok(None)
            }
        }
    }

    pub fn state(&self) -> LicenseResult<LicenseState> {
        if self.in_flight.load(Ordering::SeqCst) {
            return Ok(LicenseState::Pending);
        }
        Ok(match self.record()? {
            Some(record) if record.is_valid() => LicenseState::Valid,
            Some(record) => LicenseState::Invalid(record.status),
            None if self.deactivated.load(Ordering::SeqCst) => LicenseState::Deactivated,
            None => LicenseState::Empty,
        })
    }

    /// Activates the key posted with a settings save.
    ///
    /// Silently skips when the nonce or capability check fails, when any
    /// deactivation was requested in the same post, or when the stored license
    /// is already valid. An empty key deletes the stored record.
    pub async fn activate(
        &self,
        submission: &SettingsSubmission,
        authorizer: &dyn Authorizer,
    ) -> LicenseResult<LicenseOutcome> {
        let nonce_action = self.nonce_action();
        let nonce_ok = submission
            .field(&nonce_action)
            .is_some_and(|nonce| authorizer.verify_nonce(nonce, &nonce_action));
        if !nonce_ok {
            return Ok(LicenseOutcome::Skipped(SkipReason::NonceRejected));
        }
        if !authorizer.current_user_can(MANAGE_OPTIONS) {
            return Ok(LicenseOutcome::Skipped(SkipReason::NotAuthorized));
        }

        let key = submission
            .settings
            .get_str(&self.key_option())
            .unwrap_or_default()
            .trim()
            .to_string();
        if key.is_empty() {
            if self.store.delete(&self.record_option())? {
                info!(extension = %self.shortname, "License key cleared");
                return Ok(LicenseOutcome::Cleared);
            }
            return Ok(LicenseOutcome::Skipped(SkipReason::EmptyKey));
        }

        if submission.has_field_containing("license_key_deactivate") {
            return Ok(LicenseOutcome::Skipped(SkipReason::DeactivateRequested));
        }

        if self.record()?.is_some_and(|record| record.is_valid()) {
            return Ok(LicenseOutcome::Skipped(SkipReason::AlreadyValid));
        }

        let outcome = self.call_and_store(LicenseAction::ActivateLicense, &key).await?;
        if matches!(outcome, LicenseOutcome::Updated(_)) {
            self.updates.invalidate();
        }
        Ok(outcome)
    }

    /// Checks the license nonce of a save that carries this extension's key
    /// field. Saves without the field pass.
    ///
    /// Run for every extension before any of them talks to the server, so a
    /// rejected save writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Authorization`] when the nonce is missing or
    /// invalid.
    pub fn authorize(
        &self,
        submission: &SettingsSubmission,
        authorizer: &dyn Authorizer,
    ) -> LicenseResult<()> {
        if !submission.settings.contains_key(&self.key_option()) {
            return Ok(());
        }
        let nonce_action = self.nonce_action();
        let nonce_ok = submission
            .field(&nonce_action)
            .is_some_and(|nonce| authorizer.verify_nonce(nonce, &nonce_action));
        if !nonce_ok {
            warn!(extension = %self.shortname, "License nonce verification failed");
            return Err(LicenseError::Authorization(
                "Nonce verification failed".to_string(),
            ));
        }
        Ok(())
    }

    /// Deactivates the stored key when the deactivate button was pressed.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Authorization`] when the license nonce is
    /// missing or invalid.
    pub async fn deactivate(
        &self,
        submission: &SettingsSubmission,
        settings: &Settings,
        authorizer: &dyn Authorizer,
    ) -> LicenseResult<LicenseOutcome> {
        if !submission.settings.contains_key(&self.key_option()) {
            return Ok(LicenseOutcome::Skipped(SkipReason::NotLicenseSave));
        }

        self.authorize(submission, authorizer)?;
        if !authorizer.current_user_can(MANAGE_OPTIONS) {
            return Ok(LicenseOutcome::Skipped(SkipReason::NotAuthorized));
        }

        if !submission.has_field(&self.deactivate_field()) {
            return Ok(LicenseOutcome::Skipped(SkipReason::NoDeactivateRequest));
        }
        if !self.record()?.is_some_and(|record| record.is_valid()) {
            return Ok(LicenseOutcome::Skipped(SkipReason::NotValid));
        }

        let key = self.license_key(settings);
        let request = self.request(LicenseAction::DeactivateLicense, &key);
        let response = {
            let _in_flight = InFlight::start(&self.in_flight);
            self.api.call(&request).await
        };
        match response {
            Ok(_) => {
                // The response body is not inspected; the local record is
                // cleared whatever the server said.
                self.store.delete(&self.record_option())?;
                self.deactivated.store(true, Ordering::SeqCst);
                self.updates.invalidate();
                info!(extension = %self.shortname, "License deactivated");
                Ok(LicenseOutcome::Cleared)
            }
            Err(e) if e.is_transport() => {
                warn!(extension = %self.shortname, error = %e, "License deactivation failed");
                Ok(LicenseOutcome::Unchanged)
            }
            Err(e) => Err(e),
        }
    }

    /// Re-checks the stored key. Run from the weekly scheduled events.
    pub async fn weekly_check(
        &self,
        settings: &Settings,
        saving_settings: bool,
    ) -> LicenseResult<LicenseOutcome> {
        if saving_settings {
            return Ok(LicenseOutcome::Skipped(SkipReason::SavingSettings));
        }
        let key = self.license_key(settings);
        if key.is_empty() {
            return Ok(LicenseOutcome::Skipped(SkipReason::NoKeyStored));
        }
        self.call_and_store(LicenseAction::CheckLicense, &key).await
    }

    /// Notice rendered under this extension's license key field.
    pub fn notice(&self, settings: &Settings) -> LicenseResult<LicenseNotice> {
        let record = self.record()?;
        Ok(notice::license_notice(
            &self.vendor_url,
            &self.extension.item_name,
            &self.license_key(settings),
            record.as_ref(),
            self.clock.now(),
        ))
    }

    /// True when a key is stored but the server did not accept it.
    pub fn needs_attention(&self, settings: &Settings) -> LicenseResult<bool> {
        if self.license_key(settings).is_empty() {
            return Ok(false);
        }
        Ok(self.record()?.is_some_and(|record| !record.is_valid()))
    }

    /// Hint for the extension's row in the plugin list.
    pub fn plugin_row_hint(&self) -> LicenseResult<Option<&'static str>> {
        Ok(match self.record()? {
            Some(record) if record.is_valid() => None,
            _ => Some(notice::PLUGIN_ROW_HINT),
        })
    }

    fn request(&self, action: LicenseAction, key: &str) -> LicenseRequest {
        LicenseRequest {
            action,
            license: key.to_string(),
            item_name: self.extension.item_name.clone(),
            url: self.site_url.clone(),
            item_id: self.extension.item_id,
        }
    }

    async fn call_and_store(
        &self,
        action: LicenseAction,
        key: &str,
    ) -> LicenseResult<LicenseOutcome> {
        let request = self.request(action, key);
        let response = {
            let _in_flight = InFlight::start(&self.in_flight);
            self.api.call(&request).await
        };

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_transport() => {
                warn!(extension = %self.shortname, %action, error = %e, "License server call failed");
                return Ok(LicenseOutcome::Unchanged);
            }
            Err(e) => return Err(e),
        };

        let record = LicenseRecord::from_response(&self.shortname, key, &response, self.clock.now());
        self.store
            .set(&self.record_option(), &serde_json::to_value(&record)?)?;
        self.deactivated.store(false, Ordering::SeqCst);
        debug!(extension = %self.shortname, %action, status = %record.status, "Stored license record");
        Ok(LicenseOutcome::Updated(record))
    }
}
