use pretty_assertions::assert_eq;
use qctj_settings::{
    FieldDescriptor, FieldOption, FieldType, NoticeKind, SanitizeHook, SanitizeScope, Sanitizer,
    SettingsBlob, SettingsRegistry, SettingsSubmission, GENERAL_TAB, LICENSES_TAB, MAIN_SECTION,
    SETTINGS_UPDATED,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn blob(pairs: &[(&str, Value)]) -> SettingsBlob {
    pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
}

fn make_registry() -> SettingsRegistry {
    let mut registry = SettingsRegistry::new();
    registry.register_section(GENERAL_TAB, "display", "Display");
    registry
        .register_all(
            GENERAL_TAB,
            Some(MAIN_SECTION),
            [
                FieldDescriptor::header("tracking_settings", "Tracking"),
                FieldDescriptor::checkbox("allow_tracking", "Allow usage tracking?"),
                FieldDescriptor::text("footer_text", "Footer text"),
                FieldDescriptor::number("items_per_page", "Items per page")
                    .with_range(1.0, 100.0)
                    .with_default(10),
                FieldDescriptor::select(
                    "currency",
                    "Currency",
                    vec![FieldOption::new("usd", "USD"), FieldOption::new("eur", "EUR")],
                ),
            ],
        )
        .unwrap();
    registry
        .register_all(
            GENERAL_TAB,
            Some("display"),
            [
                FieldDescriptor::multicheck(
                    "show_on",
                    "Show on",
                    vec![FieldOption::new("shop", "Shop"), FieldOption::new("cart", "Cart")],
                ),
                FieldDescriptor::text("banner", "Banner"),
            ],
        )
        .unwrap();
    registry
}

fn section(tab: &str, section: &str) -> SanitizeScope {
    SanitizeScope::section(tab, section)
}

// ── Scope resolution ─────────────────────────────────────────────

#[test]
fn scope_comes_from_referer_query() {
    let submission = SettingsSubmission::default()
        .with_referer("https://shop.example.com/admin?page=qctj-settings&tab=extensions&section=gift_cards");
    assert_eq!(submission.scope(), section("extensions", "gift_cards"));
}

#[test]
fn scope_defaults_to_general_main() {
    let submission = SettingsSubmission::default().with_referer("/admin?page=qctj-settings");
    assert_eq!(submission.scope(), section(GENERAL_TAB, MAIN_SECTION));
}

#[test]
fn section_override_replaces_resolved_section() {
    let submission = SettingsSubmission::default()
        .from_page("extensions", MAIN_SECTION)
        .with_section_override("wishlist");
    assert_eq!(submission.scope(), section("extensions", "wishlist"));
}

#[test]
fn blank_override_is_ignored() {
    let submission = SettingsSubmission::default()
        .from_page("extensions", "gift_cards")
        .with_section_override("  ");
    assert_eq!(submission.scope(), section("extensions", "gift_cards"));
}

#[test]
fn missing_referer_means_full_scope() {
    assert_eq!(SettingsSubmission::default().scope(), SanitizeScope::Full);
    assert_eq!(
        SettingsSubmission::default().with_referer("").scope(),
        SanitizeScope::Full
    );
}

#[test]
fn encoded_referer_values_are_decoded() {
    let submission = SettingsSubmission::default().with_referer("/admin?tab=my%20tab&section=a+b");
    assert_eq!(submission.scope(), section("my tab", "a b"));
}

// ── Checkbox scenario ────────────────────────────────────────────

#[test]
fn checked_checkbox_is_stored() {
    let registry = make_registry();
    let submission = SettingsSubmission::new(blob(&[("allow_tracking", json!("1"))]))
        .from_page(GENERAL_TAB, MAIN_SECTION);

    let outcome = Sanitizer::new(&registry).sanitize(&submission, &SettingsBlob::new());
    assert_eq!(outcome.settings.get("allow_tracking"), Some(&json!("1")));
}

#[test]
fn unchecked_sentinel_removes_checkbox() {
    let registry = make_registry();
    let previous = blob(&[("allow_tracking", json!("1"))]);
    let submission = SettingsSubmission::new(blob(&[("allow_tracking", json!("-1"))]))
        .from_page(GENERAL_TAB, MAIN_SECTION);

    let outcome = Sanitizer::new(&registry).sanitize(&submission, &previous);
    assert!(!outcome.settings.contains_key("allow_tracking"));
}

#[test]
fn unchecked_sentinel_removes_multicheck() {
    let registry = make_registry();
    let previous = blob(&[("show_on", json!(["shop"]))]);
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, "display"),
        &blob(&[("show_on", json!("-1"))]),
        &previous,
    );
    assert!(!outcome.settings.contains_key("show_on"));
}

#[test]
fn checkbox_not_submitted_keeps_previous_value() {
    let registry = make_registry();
    let previous = blob(&[("allow_tracking", json!("1"))]);
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &SettingsBlob::new(),
        &previous,
    );
    assert_eq!(outcome.settings.get("allow_tracking"), Some(&json!("1")));
}

// ── Text ─────────────────────────────────────────────────────────

#[test]
fn empty_text_is_removed_in_section_scope() {
    let registry = make_registry();
    let previous = blob(&[("footer_text", json!("Old"))]);
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &blob(&[("footer_text", json!(""))]),
        &previous,
    );
    assert!(!outcome.settings.contains_key("footer_text"));
}

#[test]
fn text_is_filtered_and_trimmed() {
    let registry = make_registry();
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &blob(&[("footer_text", json!("  <strong>Hi</strong><script>x</script>  "))]),
        &SettingsBlob::new(),
    );
    assert_eq!(outcome.settings.get("footer_text"), Some(&json!("<strong>Hi</strong>x")));
}

#[test]
fn text_not_submitted_is_kept() {
    let registry = make_registry();
    let previous = blob(&[("footer_text", json!("Keep me"))]);
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &SettingsBlob::new(),
        &previous,
    );
    assert_eq!(outcome.settings.get("footer_text"), Some(&json!("Keep me")));
}

// ── Other types ──────────────────────────────────────────────────

#[test]
fn number_strings_become_numbers() {
    let registry = make_registry();
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &blob(&[("items_per_page", json!(" 25 "))]),
        &SettingsBlob::new(),
    );
    assert_eq!(outcome.settings.get("items_per_page"), Some(&json!(25)));
    assert_eq!(outcome.errors().count(), 0);
}

#[test]
fn out_of_range_number_is_omitted_with_notice() {
    let registry = make_registry();
    let previous = blob(&[("items_per_page", json!(20))]);
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &blob(&[("items_per_page", json!(500))]),
        &previous,
    );

    assert!(!outcome.settings.contains_key("items_per_page"));
    let errors: Vec<_> = outcome.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field_id.as_deref(), Some("items_per_page"));
    // The generic success notice is still shown.
    assert!(outcome.notices.iter().any(|n| n.kind == NoticeKind::Updated));
}

#[test]
fn non_numeric_number_is_rejected() {
    let registry = make_registry();
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &blob(&[("items_per_page", json!("lots"))]),
        &SettingsBlob::new(),
    );
    assert!(!outcome.settings.contains_key("items_per_page"));
    assert_eq!(outcome.errors().count(), 1);
}

#[test]
fn select_rejects_undeclared_option() {
    let registry = make_registry();
    let sanitizer = Sanitizer::new(&registry);

    let ok = sanitizer.sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &blob(&[("currency", json!("eur"))]),
        &SettingsBlob::new(),
    );
    assert_eq!(ok.settings.get("currency"), Some(&json!("eur")));

    let bad = sanitizer.sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &blob(&[("currency", json!("btc"))]),
        &SettingsBlob::new(),
    );
    assert!(!bad.settings.contains_key("currency"));
    assert_eq!(bad.errors().count(), 1);
}

#[test]
fn single_select_rejects_list_of_choices() {
    let registry = make_registry();
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &blob(&[("currency", json!(["usd", "eur"]))]),
        &blob(&[("currency", json!("usd"))]),
    );
    assert!(!outcome.settings.contains_key("currency"));
    let errors: Vec<_> = outcome.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field_id.as_deref(), Some("currency"));
}

#[test]
fn stale_select_is_removed_when_not_submitted() {
    let registry = make_registry();
    let previous = blob(&[("currency", json!("usd"))]);
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &SettingsBlob::new(),
        &previous,
    );
    assert!(!outcome.settings.contains_key("currency"));
}

// ── Scoping ──────────────────────────────────────────────────────

#[test]
fn fields_outside_the_section_are_untouched() {
    let registry = make_registry();
    let previous = blob(&[("currency", json!("usd")), ("banner", json!("Sale"))]);
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, "display"),
        &blob(&[("banner", json!("New sale"))]),
        &previous,
    );
    assert_eq!(outcome.settings.get("currency"), Some(&json!("usd")));
    assert_eq!(outcome.settings.get("banner"), Some(&json!("New sale")));
}

#[test]
fn unknown_ids_pass_through() {
    let registry = make_registry();
    let submitted = blob(&[("future_extension_flag", json!("<b>raw</b>"))]);
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &submitted,
        &SettingsBlob::new(),
    );
    assert_eq!(outcome.settings.get("future_extension_flag"), Some(&json!("<b>raw</b>")));
}

#[test]
fn layout_fields_never_reach_the_blob_via_removal() {
    let registry = make_registry();
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &blob(&[("tracking_settings", json!("x"))]),
        &SettingsBlob::new(),
    );
    // Skipped entirely, so it behaves like an unknown key.
    assert_eq!(outcome.settings.get("tracking_settings"), Some(&json!("x")));
}

#[test]
fn section_save_adds_success_notice() {
    let registry = make_registry();
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &SettingsBlob::new(),
        &SettingsBlob::new(),
    );
    assert_eq!(outcome.notices.len(), 1);
    assert_eq!(outcome.notices[0].message, SETTINGS_UPDATED);
}

#[test]
fn legacy_license_tab_is_sanitized_for_any_section() {
    let mut registry = SettingsRegistry::new();
    registry
        .register(LICENSES_TAB, None, FieldDescriptor::license_key("k", "K", "k_active"))
        .unwrap();
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        section(LICENSES_TAB, "anything"),
        &blob(&[("k", json!("  ABC  "))]),
        &SettingsBlob::new(),
    );
    assert_eq!(outcome.settings.get("k"), Some(&json!("ABC")));
}

// ── Full-blob scope ──────────────────────────────────────────────

#[test]
fn full_scope_with_empty_submission_removes_registered_keys() {
    let registry = make_registry();
    let previous = blob(&[
        ("allow_tracking", json!("1")),
        ("footer_text", json!("Hi")),
        ("currency", json!("usd")),
        ("show_on", json!(["cart"])),
        ("unregistered", json!("stays")),
    ]);
    let outcome =
        Sanitizer::new(&registry).sanitize_scoped(SanitizeScope::Full, &SettingsBlob::new(), &previous);

    assert_eq!(outcome.settings, blob(&[("unregistered", json!("stays"))]));
    assert!(outcome.notices.is_empty());
}

#[test]
fn full_scope_keeps_submitted_values() {
    let registry = make_registry();
    let submitted = blob(&[("allow_tracking", json!("1")), ("banner", json!("Hello"))]);
    let outcome =
        Sanitizer::new(&registry).sanitize_scoped(SanitizeScope::Full, &submitted, &SettingsBlob::new());
    assert_eq!(outcome.settings, submitted);
}

#[test]
fn full_scope_removes_sentinel_only_if_empty() {
    let registry = make_registry();
    let outcome = Sanitizer::new(&registry).sanitize_scoped(
        SanitizeScope::Full,
        &blob(&[("allow_tracking", json!("-1")), ("footer_text", json!("0"))]),
        &SettingsBlob::new(),
    );
    // "-1" is not empty; "0" is.
    assert_eq!(outcome.settings.get("allow_tracking"), Some(&json!("-1")));
    assert!(!outcome.settings.contains_key("footer_text"));
}

// ── Hooks ────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingHook {
    calls: Mutex<Vec<String>>,
}

impl SanitizeHook for RecordingHook {
    fn filter_tab_input(&self, tab: &str, mut input: SettingsBlob) -> SettingsBlob {
        self.calls.lock().unwrap().push(format!("tab:{tab}"));
        input.insert("from_tab_filter", "yes");
        input
    }

    fn filter_section_input(&self, tab: &str, section: &str, input: SettingsBlob) -> SettingsBlob {
        self.calls.lock().unwrap().push(format!("section:{tab}-{section}"));
        input
    }

    fn post_sanitize(&self, field_id: &str, field_type: FieldType, value: Value) -> Value {
        if field_type == FieldType::Text {
            self.calls.lock().unwrap().push(format!("post:{field_id}"));
            return Value::String(format!("{}!", value.as_str().unwrap_or_default()));
        }
        value
    }
}

#[test]
fn hooks_run_in_order() {
    let registry = make_registry();
    let hook = Arc::new(RecordingHook::default());
    let outcome = Sanitizer::new(&registry).with_hook(hook.clone()).sanitize_scoped(
        section(GENERAL_TAB, MAIN_SECTION),
        &blob(&[("footer_text", json!("Hi"))]),
        &SettingsBlob::new(),
    );

    assert_eq!(
        *hook.calls.lock().unwrap(),
        vec!["tab:general", "section:general-main", "post:footer_text"]
    );
    assert_eq!(outcome.settings.get("footer_text"), Some(&json!("Hi!")));
    assert_eq!(outcome.settings.get("from_tab_filter"), Some(&json!("yes")));
}

#[test]
fn input_filters_do_not_run_for_full_scope() {
    let registry = make_registry();
    let hook = Arc::new(RecordingHook::default());
    Sanitizer::new(&registry).with_hook(hook.clone()).sanitize_scoped(
        SanitizeScope::Full,
        &SettingsBlob::new(),
        &SettingsBlob::new(),
    );
    assert!(hook.calls.lock().unwrap().is_empty());
}
