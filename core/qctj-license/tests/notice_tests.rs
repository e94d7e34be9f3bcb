use chrono::{Duration, TimeZone, Utc};
use qctj_license::{
    invalid_license_banner, license_notice, LicenseExpiry, LicenseRecord, LicenseStatus,
};

const VENDOR: &str = "https://qctechjunkie.com/";

fn record(status: LicenseStatus, expires: Option<LicenseExpiry>) -> LicenseRecord {
    LicenseRecord {
        shortname: "qctj_gift_cards".into(),
        key: "ABC123".into(),
        status,
        expires,
        last_checked: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        error: None,
    }
}

#[test]
fn missing_record_asks_for_key() {
    let now = Utc::now();
    let notice = license_notice(VENDOR, "Gift Cards", "", None, now);
    assert_eq!(notice.class, "empty");
    assert_eq!(
        notice.message,
        "To receive updates, please enter your valid Gift Cards license key."
    );
}

#[test]
fn lifetime_never_expires() {
    let notice = license_notice(
        VENDOR,
        "Gift Cards",
        "ABC123",
        Some(&record(LicenseStatus::Valid, Some(LicenseExpiry::Lifetime))),
        Utc::now(),
    );
    assert_eq!(notice.class, "valid");
    assert_eq!(notice.status_class, Some("license-lifetime-notice"));
    assert_eq!(notice.message, "License key never expires.");
}

#[test]
fn expiring_within_thirty_days_warns() {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let soon = record(LicenseStatus::Valid, Some(LicenseExpiry::At(now + Duration::days(10))));
    let notice = license_notice(VENDOR, "Gift Cards", "ABC123", Some(&soon), now);
    assert_eq!(notice.status_class, Some("license-expires-soon-notice"));
    assert!(notice.message.contains("expires soon"));
    assert!(notice.message.contains("March 11, 2024"));
    assert!(notice.message.contains("qctj_license_key=ABC123"));
}

#[test]
fn distant_expiry_shows_date() {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let later = record(LicenseStatus::Valid, Some(LicenseExpiry::At(now + Duration::days(90))));
    let notice = license_notice(VENDOR, "Gift Cards", "ABC123", Some(&later), now);
    assert_eq!(notice.status_class, Some("license-expiration-date-notice"));
    assert_eq!(notice.message, "Your license key expires on May 30, 2024.");
}

#[test]
fn error_statuses_have_specific_messages() {
    let now = Utc::now();
    let message = |status| {
        license_notice(VENDOR, "Gift Cards", "ABC123", Some(&record(status, None)), now).message
    };

    assert!(message(LicenseStatus::Revoked).contains("has been disabled"));
    assert!(message(LicenseStatus::Missing).starts_with("Invalid license."));
    assert!(message(LicenseStatus::Invalid).contains("Your Gift Cards is not active for this URL"));
    assert_eq!(message(LicenseStatus::SiteInactive), message(LicenseStatus::Invalid));
    assert!(message(LicenseStatus::ItemNameMismatch).contains("invalid license key for Gift Cards"));
    assert!(message(LicenseStatus::NoActivationsLeft).contains("activation limit"));
    assert!(message(LicenseStatus::LicenseNotActivable).contains("belongs to a bundle"));
    assert!(message(LicenseStatus::Unknown).contains("unknown_error"));
}

#[test]
fn expired_notice_links_to_renewal() {
    let expired = record(
        LicenseStatus::Expired,
        Some(LicenseExpiry::At(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())),
    );
    let notice = license_notice(VENDOR, "Gift Cards", "ABC123", Some(&expired), Utc::now());
    assert_eq!(notice.class, "expired");
    assert!(notice.message.contains("expired on January 1, 2020"));
    assert!(notice.message.contains("utm_medium=expired"));
}

#[test]
fn renewal_link_encodes_key_and_uses_vendor() {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let expired = record(LicenseStatus::Expired, Some(LicenseExpiry::At(now - Duration::days(1))));
    let notice = license_notice(
        "https://store.example.net",
        "Gift Cards",
        "AB\"><script>",
        Some(&expired),
        now,
    );
    assert!(notice.message.contains(
        "href=\"https://store.example.net/checkout/?qctj_license_key=AB%22%3E%3Cscript%3E&utm_campaign=admin"
    ));
    assert!(!notice.message.contains("<script>"));
    assert!(!notice.message.contains("qctechjunkie.com"));
}

#[test]
fn banner_hidden_on_licenses_tab() {
    assert!(invalid_license_banner(Some("licenses")).is_none());
    assert!(invalid_license_banner(Some("general")).is_some());
    assert!(invalid_license_banner(None).unwrap().contains("Licenses page"));
}
