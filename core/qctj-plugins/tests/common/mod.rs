//! Shared test helpers for plugin host tests.

#![allow(dead_code)]

use qctj_license::{HttpLicenseApi, LicensedExtension, NoUpdateCache};
use qctj_plugins::{AppConfig, AppContext, Collaborators};
use qctj_settings::MemoryOptionStore;
use qctj_telemetry::{Checkin, CheckinTransport};
use qctj_types::{FixedClock, SiteInfo};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SITE_URL: &str = "https://shop.example.com";

/// 2024-01-01T00:00:00Z
pub const NOW: i64 = 1_704_067_200;

pub const ADMIN_PAGE: &str = "https://shop.example.com/admin.php?page=qctj-settings";

#[derive(Default)]
pub struct RecordingTransport(Mutex<Vec<Checkin>>);

impl RecordingTransport {
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
    pub ctx: AppContext,
    pub store: Arc<MemoryOptionStore>,
    pub clock: Arc<FixedClock>,
    pub checkins: Arc<RecordingTransport>,
}

pub fn gift_cards() -> LicensedExtension {
    LicensedExtension {
        version: "1.2.0".into(),
        author: "QCTechJunkie".into(),
        ..LicensedExtension::new("Gift Cards")
    }
}

pub fn make_config(api_url: &str) -> AppConfig {
    AppConfig {
        site: SiteInfo {
            name: "Example Shop".into(),
            ..SiteInfo::new(SITE_URL)
        },
        api_url: api_url.to_string(),
        extensions: vec![gift_cards()],
        ..AppConfig::default()
    }
}

pub fn make_harness_with(config: AppConfig) -> Harness {
    let store = Arc::new(MemoryOptionStore::new());
    let clock = Arc::new(FixedClock::at_timestamp(NOW).unwrap());
    let checkins = Arc::new(RecordingTransport::default());
    let license_api = Arc::new(HttpLicenseApi::new(config.api_url.clone(), Duration::from_secs(2)).unwrap());
    let ctx = AppContext::new(
        config,
        Collaborators {
            store: store.clone(),
            clock: clock.clone(),
            license_api,
            checkin: checkins.clone(),
            updates: Arc::new(NoUpdateCache),
        },
    )
    .unwrap();
    Harness {
        ctx,
        store,
        clock,
        checkins,
    }
}

pub fn make_harness(api_url: &str) -> Harness {
    make_harness_with(make_config(api_url))
}
