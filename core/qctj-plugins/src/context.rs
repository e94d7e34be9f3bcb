//! The assembled host: settings registry, license clients, telemetry and
//! action dispatch over one option store.
//!
//! Nothing here is global. The binary builds one [`AppContext`] per process
//! and every request loads its own [`Settings`] copy from the store.

use crate::actions::{ActionPayload, ActionRegistry, ActionRequest, ActionSource, DispatchOutcome};
use crate::config::AppConfig;
use crate::error::{PluginsError, PluginsResult};
use qctj_license::{
    invalid_license_banner, LicenseApi, LicenseClient, LicenseNotice, LicenseOutcome,
    UpdateCache,
};
use qctj_settings::{
    FieldDescriptor, MemoryOptionStore, OptionStore, SanitizeHook, SanitizeOutcome, Sanitizer,
    Settings, SettingsRegistry, SettingsSubmission, SqliteOptionStore, GENERAL_TAB, LICENSES_TAB,
    MAIN_SECTION,
};
use qctj_telemetry::{
    campaign_source, CheckinTransport, TelemetryReporter, TrackingNotice, ALLOW_TRACKING,
    OPT_IN_ACTION, OPT_OUT_ACTION,
};
use qctj_types::{query_arg, Authorizer, Clock, RequestPhase, MANAGE_OPTIONS};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const TRACKING_HEADER: &str = "tracking_settings";

/// Host services the context is built on.
pub struct Collaborators {
    pub store: Arc<dyn OptionStore>,
    pub clock: Arc<dyn Clock>,
    pub license_api: Arc<dyn LicenseApi>,
    pub checkin: Arc<dyn CheckinTransport>,
    pub updates: Arc<dyn UpdateCache>,
}

/// Opens the configured SQLite options database, or an in-memory store.
pub fn open_store(config: &AppConfig) -> PluginsResult<Arc<dyn OptionStore>> {
    let Some(path) = &config.database_path else {
        debug!("No database configured, options kept in memory");
        return Ok(Arc::new(MemoryOptionStore::new()));
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            PluginsError::Config(format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    Ok(Arc::new(SqliteOptionStore::open(path)?))
}

/// Mutable state of one request while its actions run.
pub struct RequestState {
    pub settings: Settings,
    pub authorizer: Arc<dyn Authorizer>,
    pub request_url: String,
    /// Where to send the browser once the request is handled.
    pub redirect: Option<String>,
}

/// Result of [`AppContext::handle_request`].
pub struct RequestOutcome {
    pub settings: Settings,
    pub redirect: Option<String>,
    pub dispatched: Vec<(ActionSource, String, DispatchOutcome)>,
}

/// License results for one extension during a settings save.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseSave {
    pub shortname: String,
    pub activation: LicenseOutcome,
    pub deactivation: LicenseOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    pub outcome: SanitizeOutcome,
    pub licenses: Vec<LicenseSave>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    pub licenses: Vec<(String, LicenseOutcome)>,
    pub checkin_sent: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminNotices {
    pub tracking: Option<TrackingNotice>,
    pub invalid_license_banner: Option<String>,
}

pub struct AppContext {
    config: AppConfig,
    store: Arc<dyn OptionStore>,
    registry: SettingsRegistry,
    licenses: Vec<LicenseClient>,
    telemetry: Arc<TelemetryReporter>,
    hooks: Vec<Arc<dyn SanitizeHook>>,
    actions: ActionRegistry<RequestState>,
}

impl AppContext {
    /// Builds the host: core settings fields, one license client and key
    /// field per configured extension, and the tracking actions.
    ///
    /// # Errors
    ///
    /// Returns [`PluginsError::Settings`] when two extensions resolve to the
    /// same license key field.
    pub fn new(config: AppConfig, collaborators: Collaborators) -> PluginsResult<Self> {
        let Collaborators {
            store,
            clock,
            license_api,
            checkin,
            updates,
        } = collaborators;

        let telemetry = Arc::new(TelemetryReporter::new(
            config.telemetry(),
            config.site.clone(),
            store.clone(),
            clock.clone(),
            checkin,
        ));

        let mut registry = SettingsRegistry::new();
        register_core_fields(&mut registry, &config)?;

        let mut licenses = Vec::with_capacity(config.extensions.len());
        for extension in &config.extensions {
            let client = LicenseClient::new(
                extension.clone(),
                config.site.home_url.clone(),
                license_api.clone(),
                store.clone(),
                clock.clone(),
            )
            .with_update_cache(updates.clone())
            .with_vendor_url(config.vendor_url.clone());
            registry.register(LICENSES_TAB, None, client.settings_field())?;
            licenses.push(client);
        }

        let mut actions = ActionRegistry::new(&config.delayed_actions);
        register_tracking_actions(&mut actions, &telemetry);

        info!(
            extensions = licenses.len(),
            fields = registry.len(),
            "Plugin host ready"
        );

        Ok(Self {
            config,
            store,
            registry,
            licenses,
            hooks: vec![telemetry.clone() as Arc<dyn SanitizeHook>],
            telemetry,
            actions,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn OptionStore> {
        &self.store
    }

    pub fn registry(&self) -> &SettingsRegistry {
        &self.registry
    }

    /// For extensions registering their own tabs and fields.
    pub fn registry_mut(&mut self) -> &mut SettingsRegistry {
        &mut self.registry
    }

    pub fn licenses(&self) -> &[LicenseClient] {
        &self.licenses
    }

    pub fn license(&self, shortname: &str) -> Option<&LicenseClient> {
        self.licenses.iter().find(|c| c.shortname() == shortname)
    }

    pub fn telemetry(&self) -> &Arc<TelemetryReporter> {
        &self.telemetry
    }

    pub fn actions(&self) -> &ActionRegistry<RequestState> {
        &self.actions
    }

    pub fn on_action<F>(&mut self, action: &str, handler: F)
    where
        F: Fn(&mut RequestState, &ActionPayload) -> PluginsResult<()> + Send + Sync + 'static,
    {
        self.actions.on(action, handler);
    }

    pub fn add_sanitize_hook(&mut self, hook: Arc<dyn SanitizeHook>) {
        self.hooks.push(hook);
    }

    /// Reads the settings blob for this request.
    pub fn load_settings(&self) -> PluginsResult<Settings> {
        Ok(Settings::load(self.store.as_ref())?)
    }

    pub fn sanitizer(&self) -> Sanitizer<'_> {
        Sanitizer::new(&self.registry).with_hooks(self.hooks.iter().cloned())
    }

    /// Item names keyed by shortname, for extensions offering beta updates.
    pub fn beta_extensions(&self) -> BTreeMap<String, String> {
        let mut betas = BTreeMap::new();
        for client in &self.licenses {
            client.register_beta_support(&mut betas);
        }
        betas
    }

    /// Handles a settings form post.
    ///
    /// License activation and deactivation run first, against the settings
    /// stored before this save. The sanitized blob is then written back as a
    /// whole.
    ///
    /// # Errors
    ///
    /// Returns an authorization error, and writes nothing, when the user may
    /// not manage options or any posted license key lacks a valid nonce.
    /// Every nonce is checked before the first license server call.
    pub async fn save_settings(
        &self,
        submission: &SettingsSubmission,
        authorizer: &dyn Authorizer,
    ) -> PluginsResult<SaveReport> {
        if !authorizer.current_user_can(MANAGE_OPTIONS) {
            return Err(PluginsError::Authorization(format!(
                "'{MANAGE_OPTIONS}' is required to save settings"
            )));
        }

        for client in &self.licenses {
            client.authorize(submission, authorizer)?;
        }

        let mut settings = self.load_settings()?;

        let mut licenses = Vec::with_capacity(self.licenses.len());
        for client in &self.licenses {
            let activation = client.activate(submission, authorizer).await?;
            let deactivation = client.deactivate(submission, &settings, authorizer).await?;
            licenses.push(LicenseSave {
                shortname: client.shortname().to_string(),
                activation,
                deactivation,
            });
        }

        let outcome = self.sanitizer().sanitize(submission, settings.blob());
        settings.save(self.store.as_ref(), outcome.settings.clone())?;
        info!(
            scope = ?outcome.scope,
            keys = outcome.settings.len(),
            errors = outcome.errors().count(),
            "Settings saved"
        );

        Ok(SaveReport { outcome, licenses })
    }

    /// The weekly scheduled event: re-checks every license, then sends the
    /// usage check-in if the site opted in.
    pub async fn run_weekly_events(&self) -> PluginsResult<WeeklyReport> {
        let settings = self.load_settings()?;

        let mut licenses = Vec::with_capacity(self.licenses.len());
        for client in &self.licenses {
            let outcome = client.weekly_check(&settings, false).await?;
            licenses.push((client.shortname().to_string(), outcome));
        }

        let checkin_sent = self.telemetry.send_checkin(&settings, false, false)?;
        info!(licenses = licenses.len(), checkin_sent, "Weekly events done");
        Ok(WeeklyReport {
            licenses,
            checkin_sent,
        })
    }

    /// Dispatches the `qctj_action` arguments of a request in `phase`.
    pub fn handle_request(
        &self,
        phase: RequestPhase,
        request: &ActionRequest,
        authorizer: Arc<dyn Authorizer>,
        request_url: &str,
    ) -> PluginsResult<RequestOutcome> {
        let mut state = RequestState {
            settings: self.load_settings()?,
            authorizer,
            request_url: request_url.to_string(),
            redirect: None,
        };
        let dispatched = self.actions.dispatch_request(phase, request, &mut state)?;
        Ok(RequestOutcome {
            settings: state.settings,
            redirect: state.redirect,
            dispatched,
        })
    }

    /// Notices for an admin page at `request_url`.
    ///
    /// The invalid-license banner is shown at most once per page, however
    /// many licenses need attention, and never on the licenses tab.
    pub fn admin_notices(
        &self,
        authorizer: &dyn Authorizer,
        request_url: &str,
    ) -> PluginsResult<AdminNotices> {
        let settings = self.load_settings()?;
        let tracking = self
            .telemetry
            .admin_notice(&settings, authorizer, request_url)?;

        let mut banner = None;
        if authorizer.current_user_can(MANAGE_OPTIONS) {
            for client in &self.licenses {
                if client.needs_attention(&settings)? {
                    let tab = query_arg(request_url, "tab");
                    banner = invalid_license_banner(tab.as_deref());
                    break;
                }
            }
        }

        Ok(AdminNotices {
            tracking,
            invalid_license_banner: banner,
        })
    }

    /// The notice under each license key field, keyed by field id.
    pub fn license_notices(&self) -> PluginsResult<Vec<(String, LicenseNotice)>> {
        let settings = self.load_settings()?;
        self.licenses
            .iter()
            .map(|client| Ok((client.key_option(), client.notice(&settings)?)))
            .collect()
    }
}

fn register_core_fields(registry: &mut SettingsRegistry, config: &AppConfig) -> PluginsResult<()> {
    let downloads = format!(
        "{}/downloads/?utm_source={}&utm_medium=admin&utm_term=settings&utm_campaign=QCTJUsageTracking",
        config.vendor_url.trim_end_matches('/'),
        campaign_source(&config.site.name)
    );
    registry.register(
        GENERAL_TAB,
        Some(MAIN_SECTION),
        FieldDescriptor::header(TRACKING_HEADER, "<h3>Tracking</h3>"),
    )?;
    registry.register(
        GENERAL_TAB,
        Some(MAIN_SECTION),
        FieldDescriptor::checkbox(ALLOW_TRACKING, "Allow Usage Tracking?").with_desc(&format!(
            "Allow QCTechJunkie to anonymously track how this plugin is used and help us make the plugin better. Opt-in to tracking and our newsletter and immediately be emailed a discount to the QCTJ shop, valid towards the <a href=\"{downloads}\" target=\"_blank\">purchase of extensions</a>. No sensitive data is tracked."
        )),
    )?;
    Ok(())
}

fn register_tracking_actions(
    actions: &mut ActionRegistry<RequestState>,
    telemetry: &Arc<TelemetryReporter>,
) {
    let reporter = telemetry.clone();
    actions.on(OPT_IN_ACTION, move |state, _payload| {
        reporter.opt_into_tracking(&mut state.settings, state.authorizer.as_ref())?;
        Ok(())
    });

    let reporter = telemetry.clone();
    actions.on(OPT_OUT_ACTION, move |state, _payload| {
        if let Some(redirect) = reporter.opt_out_of_tracking(
            &mut state.settings,
            state.authorizer.as_ref(),
            &state.request_url,
        )? {
            state.redirect = Some(redirect);
        }
        Ok(())
    });
}
