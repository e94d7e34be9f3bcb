//! Opt-in weekly usage check-ins.
//!
//! Nothing leaves the site before the administrator opts in, either from the
//! tracking notice or by ticking `allow_tracking` on the general tab. After
//! that a check-in goes out at most once a week.

use crate::error::TelemetryResult;
use crate::snapshot::{build_snapshot, TelemetrySnapshot};
use crate::transport::{Checkin, CheckinTransport};
use qctj_settings::{OptionStore, SanitizeHook, Settings, SettingsBlob, GENERAL_TAB};
use qctj_types::{
    add_query_arg, remove_query_arg, Authorizer, Clock, SiteInfo, MANAGE_OPTIONS, WEEK_IN_SECONDS,
};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings key holding the administrator's consent.
pub const ALLOW_TRACKING: &str = "allow_tracking";

/// Option holding the unix time of the last check-in.
pub const LAST_SEND_OPTION: &str = "qctj_tracking_last_send";

/// Option set once the tracking notice has been answered or auto-dismissed.
pub const NOTICE_OPTION: &str = "qctj_tracking_notice";

/// Vendor site receiving check-ins.
pub const DEFAULT_VENDOR_URL: &str = "https://qctechjunkie.com/";

/// Request argument carrying admin actions.
pub const ACTION_ARG: &str = "qctj_action";

pub const OPT_IN_ACTION: &str = "opt_into_tracking";
pub const OPT_OUT_ACTION: &str = "opt_out_of_tracking";

pub const TRACKING_NOTICE_MESSAGE: &str = "Allow QCTechJunkie to anonymously track how our plugins are used and help us make them better. Opt-in to tracking and our newsletter today! <strong>No sensitive data is tracked.</strong>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub vendor_url: String,
    /// Reported as `qctj_version` and in the user agent.
    pub framework_version: String,
    pub disable_checkin: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            vendor_url: DEFAULT_VENDOR_URL.to_string(),
            framework_version: env!("CARGO_PKG_VERSION").to_string(),
            disable_checkin: false,
        }
    }
}

/// The opt-in prompt shown to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingNotice {
    pub message: &'static str,
    pub opt_in_url: String,
    pub opt_out_url: String,
    pub extensions_url: String,
}

pub struct TelemetryReporter {
    config: TelemetryConfig,
    site: SiteInfo,
    store: Arc<dyn OptionStore>,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn CheckinTransport>,
}

impl TelemetryReporter {
    pub fn new(
        config: TelemetryConfig,
        site: SiteInfo,
        store: Arc<dyn OptionStore>,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn CheckinTransport>,
    ) -> Self {
        Self {
            config,
            site,
            store,
            clock,
            transport,
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn build_snapshot(&self) -> TelemetrySnapshot {
        build_snapshot(&self.site, &self.config.framework_version)
    }

    /// `<vendor>/?qctj_action=checkin`
    pub fn checkin_url(&self) -> String {
        format!(
            "{}/?{ACTION_ARG}=checkin",
            self.config.vendor_url.trim_end_matches('/')
        )
    }

    pub fn user_agent(&self) -> String {
        format!(
            "QCTJ/{}; {}",
            self.config.framework_version,
            self.site.home_url_slashed()
        )
    }

    pub fn tracking_allowed(&self, settings: &Settings) -> bool {
        settings.is_enabled(ALLOW_TRACKING)
    }

    /// Unix time of the last check-in, if one was recorded.
    pub fn last_send(&self) -> TelemetryResult<Option<i64>> {
        let stored = self.store.get(LAST_SEND_OPTION)?;
        Ok(stored.and_then(|value| match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }))
    }

    /// Sends a check-in unless something rules it out.
    ///
    /// Returns `false` without sending when the site has not opted in (and
    /// `override_consent` is not set), when this site is the vendor site,
    /// when check-ins are disabled, or when the last one went out less than a
    /// week ago (and `ignore_rate_limit` is not set). Otherwise the check-in
    /// is handed to the transport and the send time recorded, whatever the
    /// remote side later answers.
    pub fn send_checkin(
        &self,
        settings: &Settings,
        override_consent: bool,
        ignore_rate_limit: bool,
    ) -> TelemetryResult<bool> {
        let consented = override_consent || self.tracking_allowed(settings);
        self.send_checkin_if(consented, ignore_rate_limit)
    }

    fn send_checkin_if(&self, consented: bool, ignore_rate_limit: bool) -> TelemetryResult<bool> {
        if self.is_vendor_site() || self.config.disable_checkin {
            debug!("Check-ins disabled for this site");
            return Ok(false);
        }
        if !consented {
            return Ok(false);
        }

        let now = self.clock.timestamp();
        if !ignore_rate_limit {
            if let Some(last) = self.last_send()? {
                if last > now - WEEK_IN_SECONDS {
                    debug!(last_send = last, "Check-in already sent this week");
                    return Ok(false);
                }
            }
        }

        let checkin = Checkin {
            url: self.checkin_url(),
            user_agent: self.user_agent(),
            snapshot: self.build_snapshot(),
        };
        let site_id = checkin.snapshot.site_id.clone();
        self.transport.dispatch(checkin);
        self.store.set(LAST_SEND_OPTION, &Value::from(now))?;
        info!(%site_id, "Check-in sent");
        Ok(true)
    }

    fn is_vendor_site(&self) -> bool {
        let vendor = format!("{}/", self.config.vendor_url.trim_end_matches('/'));
        self.site.home_url_slashed() == vendor
    }

    /// Handles the `opt_into_tracking` action.
    ///
    /// Returns `false` without side effects when the user may not manage
    /// options.
    pub fn opt_into_tracking(
        &self,
        settings: &mut Settings,
        authorizer: &dyn Authorizer,
    ) -> TelemetryResult<bool> {
        if !authorizer.current_user_can(MANAGE_OPTIONS) {
            return Ok(false);
        }
        settings.update_option(self.store.as_ref(), ALLOW_TRACKING, 1)?;
        self.send_checkin_if(true, false)?;
        self.dismiss_notice()?;
        info!("Tracking enabled");
        Ok(true)
    }

    /// Handles the `opt_out_of_tracking` action.
    ///
    /// Returns the URL to redirect to (`request_url` without the action
    /// argument), or `None` when the user may not manage options.
    pub fn opt_out_of_tracking(
        &self,
        settings: &mut Settings,
        authorizer: &dyn Authorizer,
        request_url: &str,
    ) -> TelemetryResult<Option<String>> {
        if !authorizer.current_user_can(MANAGE_OPTIONS) {
            return Ok(None);
        }
        settings.delete_option(self.store.as_ref(), ALLOW_TRACKING)?;
        self.dismiss_notice()?;
        info!("Tracking disabled");
        Ok(Some(remove_query_arg(request_url, ACTION_ARG)))
    }

    fn dismiss_notice(&self) -> TelemetryResult<()> {
        self.store.set(NOTICE_OPTION, &Value::from("1"))?;
        Ok(())
    }

    pub fn notice_dismissed(&self) -> TelemetryResult<bool> {
        Ok(self
            .store
            .get(NOTICE_OPTION)?
            .is_some_and(|v| !qctj_settings::is_empty_value(&v)))
    }

    /// The opt-in prompt for the current admin page, if it should be shown.
    ///
    /// Development hosts never see it: the notice is dismissed for them on
    /// first display.
    pub fn admin_notice(
        &self,
        settings: &Settings,
        authorizer: &dyn Authorizer,
        request_url: &str,
    ) -> TelemetryResult<Option<TrackingNotice>> {
        if self.notice_dismissed()?
            || self.tracking_allowed(settings)
            || !authorizer.current_user_can(MANAGE_OPTIONS)
        {
            return Ok(None);
        }

        if self.site.is_development_host() {
            debug!(url = %self.site.home_url, "Development host, tracking notice dismissed");
            self.dismiss_notice()?;
            return Ok(None);
        }

        let source = campaign_source(&self.site.name);
        Ok(Some(TrackingNotice {
            message: TRACKING_NOTICE_MESSAGE,
            opt_in_url: add_query_arg(request_url, ACTION_ARG, OPT_IN_ACTION),
            opt_out_url: add_query_arg(request_url, ACTION_ARG, OPT_OUT_ACTION),
            extensions_url: format!(
                "{}/downloads/?utm_source={source}&utm_medium=admin&utm_term=notice&utm_campaign=QCTJUsageTracking",
                self.config.vendor_url.trim_end_matches('/')
            ),
        }))
    }
}

/// Short, stable tag for the site in vendor campaign links.
pub fn campaign_source(site_name: &str) -> String {
    let mut digest = hex::encode(Sha256::digest(site_name.as_bytes()));
    digest.truncate(10);
    digest
}

fn is_opt_in_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => s.trim() == "1",
        _ => false,
    }
}

/// Ticking `allow_tracking` on the general tab sends the first check-in
/// right away.
impl SanitizeHook for TelemetryReporter {
    fn filter_tab_input(&self, tab: &str, input: SettingsBlob) -> SettingsBlob {
        if tab == GENERAL_TAB && input.get(ALLOW_TRACKING).is_some_and(is_opt_in_value) {
            if let Err(e) = self.send_checkin_if(true, false) {
                warn!(error = %e, "Opt-in check-in failed");
            }
        }
        input
    }
}
