//! Shared test helpers for telemetry tests.

#![allow(dead_code)]

use qctj_settings::{MemoryOptionStore, Settings, SettingsBlob};
use qctj_telemetry::{Checkin, CheckinTransport, TelemetryConfig, TelemetryReporter};
use qctj_types::{FixedClock, SiteInfo};
use serde_json::json;
use std::sync::{Arc, Mutex};

pub const SITE_URL: &str = "https://shop.example.com";

/// 2024-01-01T00:00:00Z
pub const NOW: i64 = 1_704_067_200;

/// Keeps every dispatched check-in instead of sending it.
#[derive(Default)]
pub struct RecordingTransport(Mutex<Vec<Checkin>>);

impl RecordingTransport {
    pub fn sent(&self) -> Vec<Checkin> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

impl CheckinTransport for RecordingTransport {
    fn dispatch(&self, checkin: Checkin) {
        self.0.lock().unwrap().push(checkin);
    }
}

pub struct Harness {
    pub reporter: Arc<TelemetryReporter>,
    pub store: Arc<MemoryOptionStore>,
    pub clock: Arc<FixedClock>,
    pub transport: Arc<RecordingTransport>,
}

pub fn make_site(home_url: &str) -> SiteInfo {
    SiteInfo {
        name: "Example Shop".into(),
        platform_version: "6.4.2".into(),
        server_software: "nginx/1.24".into(),
        theme: "Storefront 4.5.0".into(),
        active_extensions: vec!["qctj-gift-cards/qctj-gift-cards.php".into()],
        installed_extensions: vec![
            "qctj-gift-cards/qctj-gift-cards.php".into(),
            "hello-dolly/hello.php".into(),
        ],
        ..SiteInfo::new(home_url)
    }
}

pub fn make_config() -> TelemetryConfig {
    TelemetryConfig {
        framework_version: "1.0.0".into(),
        ..TelemetryConfig::default()
    }
}

pub fn make_harness_with(site: SiteInfo, config: TelemetryConfig) -> Harness {
    let store = Arc::new(MemoryOptionStore::new());
    let clock = Arc::new(FixedClock::at_timestamp(NOW).unwrap());
    let transport = Arc::new(RecordingTransport::default());
    let reporter = Arc::new(TelemetryReporter::new(
        config,
        site,
        store.clone(),
        clock.clone(),
        transport.clone(),
    ));
    Harness {
        reporter,
        store,
        clock,
        transport,
    }
}

pub fn make_harness() -> Harness {
    make_harness_with(make_site(SITE_URL), make_config())
}

pub fn opted_in() -> Settings {
    Settings::from_blob(SettingsBlob::from_iter([("allow_tracking", json!(1))]))
}

pub fn opted_out() -> Settings {
    Settings::from_blob(SettingsBlob::default())
}
