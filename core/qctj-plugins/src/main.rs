//! QCTJ plugin host command line
//!
//! Usage:
//!   qctj show
//!   qctj save --tab general --section main --set allow_tracking=1
//!   qctj weekly
//!   qctj action opt_into_tracking
//!   qctj checkin --force
//!
//! Every command acts as a site administrator.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use qctj_license::{HttpLicenseApi, NoUpdateCache, LICENSES_HELP_TEXT};
use qctj_plugins::{
    default_config_path, open_store, ActionRequest, AppConfig, AppContext, Collaborators,
};
use qctj_settings::{SettingsBlob, SettingsSubmission, LICENSES_TAB};
use qctj_telemetry::{HttpCheckinTransport, ACTION_ARG};
use qctj_types::{add_query_arg, RequestPhase, StaticAuthorizer, SystemClock};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

static ADMIN: StaticAuthorizer = StaticAuthorizer::admin();

#[derive(Parser, Debug)]
#[command(name = "qctj")]
#[command(about = "QCTJ plugin settings, licenses and telemetry")]
struct Args {
    /// Path to qctj.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the stored settings, license notices and admin notices
    Show,
    /// Save settings as the settings page would
    Save {
        #[arg(long, default_value = "general")]
        tab: String,
        #[arg(long, default_value = "main")]
        section: String,
        /// `key=value`, repeatable
        #[arg(long = "set", value_parser = parse_key_value)]
        values: Vec<(String, String)>,
        /// Shortname of an extension whose license should be deactivated
        #[arg(long)]
        deactivate: Option<String>,
        /// Replace the whole blob instead of saving one section
        #[arg(long)]
        full: bool,
    },
    /// Run the weekly scheduled events
    Weekly,
    /// Dispatch a qctj_action
    Action {
        name: String,
        /// Dispatch in the late request phase
        #[arg(long)]
        late: bool,
        /// Send the action in the form body instead of the query string
        #[arg(long)]
        form: bool,
    },
    /// Send a usage check-in
    Checkin {
        /// Ignore consent and the weekly limit
        #[arg(long)]
        force: bool,
    },
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .compact()
        .init();

    let config_path = args.config.unwrap_or_else(default_config_path);
    let config = AppConfig::load_from(&config_path);

    let checkin = Arc::new(
        HttpCheckinTransport::new(config.checkin_timeout())
            .context("failed to create check-in transport")?,
    );
    let collaborators = Collaborators {
        store: open_store(&config).context("failed to open options store")?,
        clock: Arc::new(SystemClock),
        license_api: Arc::new(
            HttpLicenseApi::new(config.api_url.clone(), config.license_timeout())
                .context("failed to create license client")?,
        ),
        checkin: checkin.clone(),
        updates: Arc::new(NoUpdateCache),
    };
    let ctx = AppContext::new(config, collaborators)?;

    match args.command {
        Command::Show => show(&ctx)?,
        Command::Save {
            tab,
            section,
            values,
            deactivate,
            full,
        } => save(&ctx, &tab, &section, values, deactivate, full).await?,
        Command::Weekly => {
            let report = ctx.run_weekly_events().await?;
            for (shortname, outcome) in &report.licenses {
                println!("{shortname}: {outcome:?}");
            }
            println!("check-in sent: {}", report.checkin_sent);
        }
        Command::Action { name, late, form } => {
            let url = add_query_arg(&admin_url(&ctx), "page", "qctj-settings");
            let request = if form {
                ActionRequest::from_url(&url).with_form_field(ACTION_ARG, name.as_str())
            } else {
                ActionRequest::from_url(&add_query_arg(&url, ACTION_ARG, &name))
            };
            let phase = if late {
                RequestPhase::Late
            } else {
                RequestPhase::Early
            };
            let outcome = ctx.handle_request(phase, &request, Arc::new(ADMIN), &url)?;
            for (source, action, result) in &outcome.dispatched {
                println!("{source} {action}: {result:?}");
            }
            if let Some(redirect) = outcome.redirect {
                println!("redirect: {redirect}");
            }
        }
        Command::Checkin { force } => {
            let settings = ctx.load_settings()?;
            let sent = ctx.telemetry().send_checkin(&settings, force, force)?;
            println!("check-in sent: {sent}");
        }
    }

    checkin.drain().await;
    Ok(())
}

fn admin_url(ctx: &AppContext) -> String {
    format!(
        "{}/admin.php",
        ctx.config().site.home_url.trim_end_matches('/')
    )
}

fn show(ctx: &AppContext) -> Result<()> {
    let settings = ctx.load_settings()?;
    println!("{}", serde_json::to_string_pretty(settings.blob())?);

    if !ctx.licenses().is_empty() {
        println!("\n{LICENSES_HELP_TEXT}");
        for (field, notice) in ctx.license_notices()? {
            println!("  {field}: [{}] {}", notice.class, notice.message);
        }
    }

    let notices = ctx.admin_notices(&ADMIN, &admin_url(ctx))?;
    if let Some(tracking) = notices.tracking {
        println!("\n{}", serde_json::to_string_pretty(&tracking)?);
    }
    if let Some(banner) = notices.invalid_license_banner {
        println!("\n{banner}");
    }
    Ok(())
}

async fn save(
    ctx: &AppContext,
    tab: &str,
    section: &str,
    values: Vec<(String, String)>,
    deactivate: Option<String>,
    full: bool,
) -> Result<()> {
    let blob: SettingsBlob = values.into_iter().map(|(k, v)| (k, json!(v))).collect();
    let mut submission = SettingsSubmission::new(blob);
    if !full {
        submission = submission.from_page(tab, section);
    }
    // The license nonces are only rendered on the licenses tab.
    if tab == LICENSES_TAB {
        for client in ctx.licenses() {
            submission = submission.with_field(client.nonce_action(), client.nonce_action());
        }
    }
    if let Some(shortname) = deactivate {
        let Some(client) = ctx.license(&shortname) else {
            bail!("no licensed extension named '{shortname}'");
        };
        submission = submission.with_field(client.deactivate_field(), "Deactivate License");
    }

    let report = ctx.save_settings(&submission, &ADMIN).await?;
    info!(scope = ?report.outcome.scope, "Saved");
    for notice in &report.outcome.notices {
        println!("{}", serde_json::to_string(notice)?);
    }
    for license in &report.licenses {
        println!(
            "{}: activation {:?}, deactivation {:?}",
            license.shortname, license.activation, license.deactivation
        );
    }
    Ok(())
}
