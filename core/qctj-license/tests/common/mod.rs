//! Shared test helpers for license tests.

#![allow(dead_code)]

use qctj_license::{
    HttpLicenseApi, LicenseClient, LicenseRecord, LicenseStatus, LicensedExtension, UpdateCache,
};
use qctj_settings::{MemoryOptionStore, OptionStore, SettingsSubmission};
use qctj_types::{FixedClock, StaticAuthorizer};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub static ADMIN: StaticAuthorizer = StaticAuthorizer::admin();

pub const SITE_URL: &str = "https://shop.example.com";

/// 2024-01-01T00:00:00Z
pub const NOW: i64 = 1_704_067_200;

#[derive(Default)]
pub struct CountingCache(AtomicUsize);

impl CountingCache {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl UpdateCache for CountingCache {
    fn invalidate(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub client: LicenseClient,
    pub store: Arc<MemoryOptionStore>,
    pub cache: Arc<CountingCache>,
    pub clock: Arc<FixedClock>,
}

pub fn gift_cards() -> LicensedExtension {
    LicensedExtension {
        version: "1.2.0".into(),
        author: "QCTechJunkie".into(),
        ..LicensedExtension::new("Gift Cards")
    }
}

pub fn make_harness_for(api_url: &str, extension: LicensedExtension) -> Harness {
    let store = Arc::new(MemoryOptionStore::new());
    let cache = Arc::new(CountingCache::default());
    let clock = Arc::new(FixedClock::at_timestamp(NOW).unwrap());
    let api = Arc::new(HttpLicenseApi::new(api_url, Duration::from_secs(2)).unwrap());
    let client = LicenseClient::new(extension, SITE_URL, api, store.clone(), clock.clone())
        .with_update_cache(cache.clone());
    Harness {
        client,
        store,
        cache,
        clock,
    }
}

pub fn make_harness(api_url: &str) -> Harness {
    make_harness_for(api_url, gift_cards())
}

/// A licenses-tab save posting `key` with a valid nonce.
pub fn license_post(client: &LicenseClient, key: &str) -> SettingsSubmission {
    SettingsSubmission::new([(client.key_option(), json!(key))].into_iter().collect())
        .from_page("licenses", "main")
        .with_field(client.nonce_action(), client.nonce_action())
}

pub fn seed_record(harness: &Harness, status: LicenseStatus) {
    let record = LicenseRecord {
        shortname: harness.client.shortname().to_string(),
        key: "ABC123".into(),
        status,
        expires: None,
        last_checked: chrono::DateTime::from_timestamp(NOW - 86_400, 0).unwrap(),
        error: None,
    };
    harness
        .store
        .set(&harness.client.record_option(), &serde_json::to_value(record).unwrap())
        .unwrap();
}

pub fn valid_lifetime() -> Value {
    json!({"success": true, "license": "valid", "expires": "lifetime"})
}
