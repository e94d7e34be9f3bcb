use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use qctj_license::{LicenseExpiry, LicenseRecord, LicenseResponse, LicenseStatus};
use serde_json::json;

fn response(value: serde_json::Value) -> LicenseResponse {
    serde_json::from_value(value).unwrap()
}

// ── Status mapping ───────────────────────────────────────────────

#[test]
fn valid_license_maps_to_valid() {
    let r = response(json!({"success": true, "license": "valid", "expires": "lifetime"}));
    assert_eq!(r.status(), LicenseStatus::Valid);
    assert_eq!(r.expiry(), Some(LicenseExpiry::Lifetime));
}

#[test]
fn error_discriminator_wins() {
    let cases = [
        ("expired", LicenseStatus::Expired),
        ("revoked", LicenseStatus::Revoked),
        ("missing", LicenseStatus::Missing),
        ("invalid", LicenseStatus::Invalid),
        ("site_inactive", LicenseStatus::SiteInactive),
        ("item_name_mismatch", LicenseStatus::ItemNameMismatch),
        ("no_activations_left", LicenseStatus::NoActivationsLeft),
        ("license_not_activable", LicenseStatus::LicenseNotActivable),
        ("something_new", LicenseStatus::Unknown),
    ];
    for (error, expected) in cases {
        let r = response(json!({"success": false, "license": "invalid", "error": error}));
        assert_eq!(r.status(), expected, "error code {error}");
    }
}

#[test]
fn license_code_used_without_error() {
    assert_eq!(
        response(json!({"license": "site_inactive"})).status(),
        LicenseStatus::SiteInactive
    );
    assert_eq!(response(json!({"license": "disabled"})).status(), LicenseStatus::Revoked);
    assert_eq!(response(json!({"license": "inactive"})).status(), LicenseStatus::SiteInactive);
    assert_eq!(response(json!({})).status(), LicenseStatus::Unknown);
}

#[test]
fn valid_with_failure_flag_is_not_valid() {
    let r = response(json!({"success": false, "license": "valid"}));
    assert_eq!(r.status(), LicenseStatus::Unknown);
}

#[test]
fn expires_false_is_ignored() {
    let r = response(json!({"license": "invalid", "expires": false}));
    assert_eq!(r.expiry(), None);
}

// ── Expiry parsing ───────────────────────────────────────────────

#[test]
fn expiry_formats() {
    assert_eq!(LicenseExpiry::parse("LIFETIME"), Some(LicenseExpiry::Lifetime));
    assert_eq!(
        LicenseExpiry::parse("2025-03-01 23:59:59"),
        Some(LicenseExpiry::At(Utc.with_ymd_and_hms(2025, 3, 1, 23, 59, 59).unwrap()))
    );
    assert_eq!(
        LicenseExpiry::parse("2025-03-01"),
        Some(LicenseExpiry::At(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()))
    );
    assert_eq!(
        LicenseExpiry::parse("2025-03-01T12:00:00+02:00"),
        Some(LicenseExpiry::At(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()))
    );
    assert_eq!(LicenseExpiry::parse("soon"), None);
}

// ── Record ───────────────────────────────────────────────────────

#[test]
fn record_serializes_as_plain_json() {
    let checked = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let record = LicenseRecord::from_response(
        "qctj_gift_cards",
        "ABC123",
        &response(json!({"license": "valid", "expires": "lifetime"})),
        checked,
    );

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["status"], json!("valid"));
    assert_eq!(value["expires"], json!("lifetime"));
    assert!(value.get("error").is_none());

    let parsed: LicenseRecord = serde_json::from_value(value).unwrap();
    assert_eq!(parsed, record);
}

#[test]
fn record_keeps_raw_error_code() {
    let record = LicenseRecord::from_response(
        "qctj_gift_cards",
        "ABC123",
        &response(json!({"success": false, "license": "invalid", "error": "blocked_ip"})),
        Utc::now(),
    );
    assert_eq!(record.status, LicenseStatus::Unknown);
    assert_eq!(record.error.as_deref(), Some("blocked_ip"));
    assert!(!record.is_valid());
}
