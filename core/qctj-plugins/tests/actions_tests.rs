use pretty_assertions::assert_eq;
use qctj_plugins::{
    sanitize_action, ActionRegistry, ActionRequest, ActionSource, DispatchOutcome, PluginsError,
};
use qctj_types::RequestPhase;
use std::collections::BTreeMap;

/// Records which actions ran, with the value of `marker` from their payload.
#[derive(Default)]
struct Log(Vec<(String, Option<String>)>);

fn make_registry() -> ActionRegistry<Log> {
    let mut actions = ActionRegistry::default();
    for name in ["add_to_cart", "remove_item", "export"] {
        actions.on(name, move |log: &mut Log, payload| {
            log.0.push((name.to_string(), payload.get("marker").cloned()));
            Ok(())
        });
    }
    actions
}

fn payload() -> BTreeMap<String, String> {
    BTreeMap::new()
}

// ── dispatch ─────────────────────────────────────────────────────

#[test]
fn default_delayed_list_is_add_to_cart() {
    let actions: ActionRegistry<Log> = ActionRegistry::default();
    assert_eq!(actions.delayed_actions().collect::<Vec<_>>(), vec!["add_to_cart"]);
    assert!(actions.is_delayed("add_to_cart"));
    assert!(!actions.is_delayed("remove_item"));
}

#[test]
fn delayed_action_waits_for_late_phase() {
    let actions = make_registry();
    let mut log = Log::default();

    let early = actions
        .dispatch(RequestPhase::Early, "add_to_cart", &mut log, &payload())
        .unwrap();
    assert_eq!(early, DispatchOutcome::Deferred);
    assert!(log.0.is_empty());

    let late = actions
        .dispatch(RequestPhase::Late, "add_to_cart", &mut log, &payload())
        .unwrap();
    assert_eq!(late, DispatchOutcome::Ran(1));
    assert_eq!(log.0.len(), 1);
}

#[test]
fn ordinary_action_runs_only_early() {
    let actions = make_registry();
    let mut log = Log::default();

    let early = actions
        .dispatch(RequestPhase::Early, "remove_item", &mut log, &payload())
        .unwrap();
    let late = actions
        .dispatch(RequestPhase::Late, "remove_item", &mut log, &payload())
        .unwrap();

    assert_eq!(early, DispatchOutcome::Ran(1));
    assert_eq!(late, DispatchOutcome::AlreadyRan);
    assert_eq!(log.0.len(), 1);
}

#[test]
fn unknown_action_is_unhandled() {
    let actions = make_registry();
    let mut log = Log::default();
    let outcome = actions
        .dispatch(RequestPhase::Early, "nope", &mut log, &payload())
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Unhandled);
}

#[test]
fn configured_delayed_list_replaces_default() {
    let mut actions: ActionRegistry<Log> = ActionRegistry::new(["Export"]);
    actions.on("export", |log: &mut Log, _| {
        log.0.push(("export".into(), None));
        Ok(())
    });
    assert!(actions.is_delayed("export"));
    assert!(!actions.is_delayed("add_to_cart"));

    let mut log = Log::default();
    assert_eq!(
        actions
            .dispatch(RequestPhase::Early, "export", &mut log, &payload())
            .unwrap(),
        DispatchOutcome::Deferred
    );
}

#[test]
fn handlers_run_in_registration_order() {
    let mut actions: ActionRegistry<Vec<u8>> = ActionRegistry::default();
    actions.on("export", |seen: &mut Vec<u8>, _| {
        seen.push(1);
        Ok(())
    });
    actions.on("export", |seen: &mut Vec<u8>, _| {
        seen.push(2);
        Ok(())
    });

    let mut seen = Vec::new();
    let outcome = actions
        .dispatch(RequestPhase::Early, "export", &mut seen, &BTreeMap::new())
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Ran(2));
    assert_eq!(seen, vec![1, 2]);
}

#[test]
fn handler_error_stops_dispatch() {
    let mut actions: ActionRegistry<Vec<u8>> = ActionRegistry::default();
    actions.on("export", |_: &mut Vec<u8>, _| {
        Err(PluginsError::ActionFailed {
            action: "export".into(),
            message: "disk full".into(),
        })
    });
    actions.on("export", |seen: &mut Vec<u8>, _| {
        seen.push(2);
        Ok(())
    });

    let mut seen = Vec::new();
    let err = actions
        .dispatch(RequestPhase::Early, "export", &mut seen, &BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, PluginsError::ActionFailed { .. }));
    assert!(seen.is_empty());
}

// ── Request dispatch ─────────────────────────────────────────────

#[test]
fn action_names_are_sanitized() {
    assert_eq!(sanitize_action("Remove_Item"), "remove_item");
    assert_eq!(sanitize_action("add-to-cart<script>"), "add-to-cartscript");
    assert_eq!(sanitize_action("a.b/c d"), "abcd");
}

#[test]
fn request_reads_action_from_query() {
    let request = ActionRequest::from_url("/shop?qctj_action=Remove_Item&marker=q");
    assert_eq!(request.action(ActionSource::Query).as_deref(), Some("remove_item"));
    assert_eq!(request.action(ActionSource::Form), None);
}

#[test]
fn empty_action_is_ignored() {
    let request = ActionRequest::from_url("/shop?qctj_action=%3C%3E");
    assert_eq!(request.action(ActionSource::Query), None);
}

#[test]
fn query_and_form_each_dispatch_once() {
    let actions = make_registry();
    let request = ActionRequest::from_url("/shop?qctj_action=remove_item&marker=q")
        .with_form_field("qctj_action", "remove_item")
        .with_form_field("marker", "f");

    let mut log = Log::default();
    let dispatched = actions
        .dispatch_request(RequestPhase::Early, &request, &mut log)
        .unwrap();

    assert_eq!(dispatched.len(), 2);
    assert_eq!(dispatched[0].0, ActionSource::Query);
    assert_eq!(dispatched[1].0, ActionSource::Form);
    assert_eq!(
        log.0,
        vec![
            ("remove_item".to_string(), Some("q".to_string())),
            ("remove_item".to_string(), Some("f".to_string())),
        ]
    );
}

#[test]
fn delayed_request_action_runs_once_across_phases() {
    let actions = make_registry();
    let request = ActionRequest::from_url("/shop?qctj_action=add_to_cart");
    let mut log = Log::default();

    actions
        .dispatch_request(RequestPhase::Early, &request, &mut log)
        .unwrap();
    assert!(log.0.is_empty());

    actions
        .dispatch_request(RequestPhase::Late, &request, &mut log)
        .unwrap();
    assert_eq!(log.0.len(), 1);
}
