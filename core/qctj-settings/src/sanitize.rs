//! The write path for the settings blob.
//!
//! A save comes in either scoped to one tab/section page (the usual case,
//! detected from the referer of the settings form) or as a full-blob
//! replacement. Both merge the submission over the previous blob and run
//! every registered field through its [`FieldHandler`](crate::FieldHandler),
//! but they differ in which keys are removed afterwards.

use crate::blob::{is_empty_value, SettingsBlob, UNCHECKED_SENTINEL};
use crate::field::FieldType;
use crate::handler::SanitizeHook;
use crate::registry::{SettingsRegistry, GENERAL_TAB, MAIN_SECTION};
use qctj_types::{add_query_arg, query_arg};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Notice added to every section-scoped save.
pub const SETTINGS_UPDATED: &str = "Settings updated.";

/// Which keys a save may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeScope {
    /// Only fields shown on one tab/section page.
    Section { tab: String, section: String },
    /// Every registered field.
    Full,
}

impl SanitizeScope {
    pub fn section(tab: &str, section: &str) -> Self {
        Self::Section {
            tab: tab.into(),
            section: section.into(),
        }
    }
}

/// A settings form post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsSubmission {
    /// Values posted under the settings form array.
    pub settings: SettingsBlob,
    /// Referer of the form, carrying `tab=` and `section=` in its query.
    /// Absent for programmatic full-blob saves.
    pub referer: Option<String>,
    /// Section posted by a page that redirected away from an empty `main`.
    pub section_override: Option<String>,
    /// Every other top-level posted field (nonces, button names).
    pub fields: BTreeMap<String, String>,
}

impl SettingsSubmission {
    pub fn new(settings: SettingsBlob) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Marks the submission as coming from the `tab`/`section` page.
    pub fn from_page(mut self, tab: &str, section: &str) -> Self {
        let referer = add_query_arg("/settings?page=qctj-settings", "tab", tab);
        self.referer = Some(add_query_arg(&referer, "section", section));
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn with_section_override(mut self, section: impl Into<String>) -> Self {
        self.section_override = Some(section.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns true if any posted field name contains `needle`.
    pub fn has_field_containing(&self, needle: &str) -> bool {
        self.fields.keys().any(|k| k.contains(needle))
    }

    /// Resolves the scope of this save.
    ///
    /// A non-empty referer means a section-scoped save; tab and section
    /// default to `general`/`main` and the override replaces the section.
    pub fn scope(&self) -> SanitizeScope {
        let Some(referer) = self.referer.as_deref().filter(|r| !r.is_empty()) else {
            return SanitizeScope::Full;
        };

        let (tab, section) = parse_referer(referer);
        let section = match self.section_override.as_deref().map(str::trim) {
            Some(overridden) if !overridden.is_empty() => overridden.to_string(),
            _ => section.unwrap_or_else(|| MAIN_SECTION.to_string()),
        };

        SanitizeScope::Section {
            tab: tab.unwrap_or_else(|| GENERAL_TAB.to_string()),
            section,
        }
    }
}

fn parse_referer(referer: &str) -> (Option<String>, Option<String>) {
    let non_empty = |key| query_arg(referer, key).filter(|v| !v.is_empty());
    (non_empty("tab"), non_empty("section"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Updated,
    Error,
}

/// A message surfaced on the settings page after a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsNotice {
    pub kind: NoticeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    pub message: String,
}

impl SettingsNotice {
    pub fn updated() -> Self {
        Self {
            kind: NoticeKind::Updated,
            field_id: None,
            message: SETTINGS_UPDATED.into(),
        }
    }

    pub fn error(field_id: &str, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            field_id: Some(field_id.into()),
            message: message.into(),
        }
    }
}

/// Result of a save: the blob to persist plus notices.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizeOutcome {
    pub scope: SanitizeScope,
    pub settings: SettingsBlob,
    pub notices: Vec<SettingsNotice>,
}

impl SanitizeOutcome {
    pub fn errors(&self) -> impl Iterator<Item = &SettingsNotice> {
        self.notices.iter().filter(|n| n.kind == NoticeKind::Error)
    }
}

/// Merges and validates submissions against a registry.
pub struct Sanitizer<'a> {
    registry: &'a SettingsRegistry,
    hooks: Vec<Arc<dyn SanitizeHook>>,
}

impl<'a> Sanitizer<'a> {
    pub fn new(registry: &'a SettingsRegistry) -> Self {
        Self {
            registry,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn SanitizeHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = Arc<dyn SanitizeHook>>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Sanitizes a form post against the previously stored blob.
    pub fn sanitize(
        &self,
        submission: &SettingsSubmission,
        previous: &SettingsBlob,
    ) -> SanitizeOutcome {
        self.sanitize_scoped(submission.scope(), &submission.settings, previous)
    }

    /// Sanitizes `submitted` in an explicit scope.
    pub fn sanitize_scoped(
        &self,
        scope: SanitizeScope,
        submitted: &SettingsBlob,
        previous: &SettingsBlob,
    ) -> SanitizeOutcome {
        let mut input = submitted.clone();
        let field_types = match &scope {
            SanitizeScope::Section { tab, section } => {
                for hook in &self.hooks {
                    input = hook.filter_tab_input(tab, input);
                }
                for hook in &self.hooks {
                    input = hook.filter_section_input(tab, section, input);
                }
                self.registry.field_types(Some((tab, section)))
            }
            SanitizeScope::Full => self.registry.field_types(None),
        };

        let mut output = previous.merged(&input);
        let mut notices = Vec::new();

        for (key, field_type) in field_types {
            if !field_type.is_setting() {
                continue;
            }

            if let Some(value) = output.remove(key) {
                match self.sanitize_value(key, field_type, value) {
                    Ok(value) => {
                        output.insert(key, value);
                    }
                    Err(err) => {
                        warn!(field = key, error = %err, "Rejected settings value");
                        notices.push(SettingsNotice::error(key, err.to_string()));
                        continue;
                    }
                }
            }

            let remove = match &scope {
                SanitizeScope::Section { .. } => {
                    removed_from_section(key, field_type, &input, &output)
                }
                SanitizeScope::Full => input.get(key).is_none_or(is_empty_value),
            };
            if remove {
                debug!(field = key, "Removing setting");
                output.remove(key);
            }
        }

        if matches!(scope, SanitizeScope::Section { .. }) {
            notices.push(SettingsNotice::updated());
        }

        SanitizeOutcome {
            scope,
            settings: output,
            notices,
        }
    }

    fn sanitize_value(
        &self,
        key: &str,
        field_type: FieldType,
        value: Value,
    ) -> crate::SettingsResult<Value> {
        let value = match self.registry.handler(key) {
            Some(handler) => handler.apply(key, value)?,
            None => value,
        };
        Ok(self
            .hooks
            .iter()
            .fold(value, |value, hook| hook.post_sanitize(key, field_type, value)))
    }
}

fn removed_from_section(
    key: &str,
    field_type: FieldType,
    input: &SettingsBlob,
    output: &SettingsBlob,
) -> bool {
    let submitted = input.get(key);
    match field_type {
        FieldType::Checkbox | FieldType::Multicheck => {
            submitted.is_some() && output.get_str(key) == Some(UNCHECKED_SENTINEL)
        }
        FieldType::Text => submitted.is_some_and(is_empty_value),
        _ => match submitted {
            Some(value) => is_empty_value(value),
            None => output.contains_key(key),
        },
    }
}
