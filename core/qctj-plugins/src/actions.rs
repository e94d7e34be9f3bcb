//! `qctj_action` request dispatch.
//!
//! A request may name an action in its query string, its form body or both.
//! Every action runs in the early request phase unless it is on the delayed
//! list, in which case it waits for the late phase, once the host has
//! resolved the full request context.

use crate::error::PluginsResult;
use qctj_telemetry::ACTION_ARG;
use qctj_types::{query_pairs, RequestPhase};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Parameters of the request source (query or form) that named the action.
pub type ActionPayload = BTreeMap<String, String>;

pub type ActionHandler<C> = Box<dyn Fn(&mut C, &ActionPayload) -> PluginsResult<()> + Send + Sync>;

/// Lower-cases `raw` and keeps only `[a-z0-9_-]`.
pub fn sanitize_action(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-'))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSource {
    Query,
    Form,
}

impl fmt::Display for ActionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionSource::Query => "query",
            ActionSource::Form => "form",
        })
    }
}

/// What happened to one dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// This many handlers ran.
    Ran(usize),
    /// Delayed action seen in the early phase; it runs later.
    Deferred,
    /// Non-delayed action seen in the late phase; it already ran early.
    AlreadyRan,
    /// Nothing is registered under the name.
    Unhandled,
}

/// The action-relevant parts of an incoming request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionRequest {
    pub query: ActionPayload,
    pub form: ActionPayload,
}

impl ActionRequest {
    /// A request carrying only the query string of `url`.
    pub fn from_url(url: &str) -> Self {
        Self {
            query: query_pairs(url).into_iter().collect(),
            form: ActionPayload::new(),
        }
    }

    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(name.into(), value.into());
        self
    }

    pub fn payload(&self, source: ActionSource) -> &ActionPayload {
        match source {
            ActionSource::Query => &self.query,
            ActionSource::Form => &self.form,
        }
    }

    /// The sanitized action named by `source`, if any.
    pub fn action(&self, source: ActionSource) -> Option<String> {
        self.payload(source)
            .get(ACTION_ARG)
            .map(|raw| sanitize_action(raw))
            .filter(|action| !action.is_empty())
    }
}

/// Named action handlers plus the delayed allow-list.
///
/// `C` is the request state handlers work on.
pub struct ActionRegistry<C> {
    handlers: BTreeMap<String, Vec<ActionHandler<C>>>,
    delayed: BTreeSet<String>,
}

impl<C> Default for ActionRegistry<C> {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_DELAYED_ACTIONS.iter().copied())
    }
}

impl<C> ActionRegistry<C> {
    pub fn new<S: AsRef<str>>(delayed: impl IntoIterator<Item = S>) -> Self {
        Self {
            handlers: BTreeMap::new(),
            delayed: delayed
                .into_iter()
                .map(|action| sanitize_action(action.as_ref()))
                .collect(),
        }
    }

    /// Adds a handler. Several handlers may share one action; they run in
    /// registration order.
    pub fn on<F>(&mut self, action: &str, handler: F)
    where
        F: Fn(&mut C, &ActionPayload) -> PluginsResult<()> + Send + Sync + 'static,
    {
        self.handlers
            .entry(sanitize_action(action))
            .or_default()
            .push(Box::new(handler));
    }

    pub fn delay(&mut self, action: &str) {
        self.delayed.insert(sanitize_action(action));
    }

    pub fn is_delayed(&self, action: &str) -> bool {
        self.delayed.contains(action)
    }

    pub fn delayed_actions(&self) -> impl Iterator<Item = &str> {
        self.delayed.iter().map(String::as_str)
    }

    pub fn has_handler(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Runs the handlers of `action` if it belongs to `phase`.
    ///
    /// # Errors
    ///
    /// Returns the first handler error; later handlers do not run.
    pub fn dispatch(
        &self,
        phase: RequestPhase,
        action: &str,
        state: &mut C,
        payload: &ActionPayload,
    ) -> PluginsResult<DispatchOutcome> {
        match (self.is_delayed(action), phase) {
            (true, RequestPhase::Early) => return Ok(DispatchOutcome::Deferred),
            (false, RequestPhase::Late) => return Ok(DispatchOutcome::AlreadyRan),
            _ => {}
        }

        let Some(handlers) = self.handlers.get(action) else {
            debug!(action, ?phase, "No handler for action");
            return Ok(DispatchOutcome::Unhandled);
        };
        for handler in handlers {
            handler(state, payload)?;
        }
        debug!(action, ?phase, handlers = handlers.len(), "Dispatched action");
        Ok(DispatchOutcome::Ran(handlers.len()))
    }

    /// Dispatches the query action, then the form action, of `request`.
    ///
    /// An action named in both sources runs twice, once with each payload.
    pub fn dispatch_request(
        &self,
        phase: RequestPhase,
        request: &ActionRequest,
        state: &mut C,
    ) -> PluginsResult<Vec<(ActionSource, String, DispatchOutcome)>> {
        let mut dispatched = Vec::new();
        for source in [ActionSource::Query, ActionSource::Form] {
            let Some(action) = request.action(source) else {
                continue;
            };
            let outcome = self.dispatch(phase, &action, state, request.payload(source))?;
            debug!(%source, action = %action, ?outcome, "Request action");
            dispatched.push((source, action, outcome));
        }
        Ok(dispatched)
    }
}
