//! Declarative registry of every configurable field, grouped as
//! tab → section → field.

use crate::blob::{is_empty_value, SettingsBlob};
use crate::error::{SettingsError, SettingsResult};
use crate::field::{FieldDescriptor, FieldType};
use crate::handler::FieldHandler;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error};

/// The tab that always exists.
pub const GENERAL_TAB: &str = "general";
/// Tab that extensions put their own settings in.
pub const EXTENSIONS_TAB: &str = "extensions";
/// Tab holding one license key field per licensed extension.
pub const LICENSES_TAB: &str = "licenses";
/// Tab for miscellaneous settings.
pub const MISC_TAB: &str = "misc";
/// Section that fields fall back to.
pub const MAIN_SECTION: &str = "main";

/// A tab as listed in the settings navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: String,
    pub label: String,
}

/// A section within a tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub id: String,
    pub label: String,
}

impl SectionInfo {
    fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Tab {
    id: String,
    label: String,
    sections: Vec<SectionInfo>,
    /// Set once any field is registered without a section.
    legacy_flat: bool,
}

impl Tab {
    fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            sections: Vec::new(),
            legacy_flat: false,
        }
    }

    fn has_section(&self, section: &str) -> bool {
        self.sections.iter().any(|s| s.id == section)
    }
}

#[derive(Debug, Clone)]
struct RegisteredField {
    descriptor: FieldDescriptor,
    handler: FieldHandler,
}

/// The settings registry.
///
/// Tabs, sections and fields are kept in registration order. Field ids are
/// unique across the whole registry.
#[derive(Debug, Clone)]
pub struct SettingsRegistry {
    tabs: Vec<Tab>,
    fields: HashMap<String, RegisteredField>,
    order: Vec<String>,
}

impl Default for SettingsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsRegistry {
    /// Creates a registry with the stock tab/section tree:
    /// `general/main`, `extensions/main`, `licenses` (no sections) and
    /// `misc/main`.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_section(GENERAL_TAB, MAIN_SECTION, "General");
        registry.register_tab(EXTENSIONS_TAB, "Extensions");
        registry.register_section(EXTENSIONS_TAB, MAIN_SECTION, "Main");
        registry.register_tab(LICENSES_TAB, "Licenses");
        registry.register_tab(MISC_TAB, "Misc");
        registry.register_section(MISC_TAB, MAIN_SECTION, "Miscellaneous");
        registry
    }

    /// Creates a registry holding only the `general` tab.
    pub fn empty() -> Self {
        Self {
            tabs: vec![Tab::new(GENERAL_TAB, "General")],
            fields: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Adds a tab, or relabels it if it already exists.
    pub fn register_tab(&mut self, id: &str, label: &str) {
        match self.tabs.iter_mut().find(|t| t.id == id) {
            Some(tab) => tab.label = label.into(),
            None => self.tabs.push(Tab::new(id, label)),
        }
    }

    /// Adds a section to a tab, creating the tab when needed.
    pub fn register_section(&mut self, tab: &str, id: &str, label: &str) {
        let tab = self.tab_mut(tab);
        match tab.sections.iter_mut().find(|s| s.id == id) {
            Some(section) => section.label = label.into(),
            None => tab.sections.push(SectionInfo::new(id, label)),
        }
    }

    /// Registers a field.
    ///
    /// `section` overrides the descriptor's own section. A field without any
    /// section switches its tab to the legacy flat layout, where every field
    /// of the tab belongs to `main`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::DuplicateFieldId`] if the id is taken.
    pub fn register(
        &mut self,
        tab: &str,
        section: Option<&str>,
        mut descriptor: FieldDescriptor,
    ) -> SettingsResult<()> {
        if self.fields.contains_key(&descriptor.id) {
            error!(field = %descriptor.id, tab, "Duplicate settings field id");
            return Err(SettingsError::DuplicateFieldId(descriptor.id));
        }

        descriptor.tab = tab.to_string();
        if let Some(section) = section {
            descriptor.section = Some(section.to_string());
        }

        let tab_entry = self.tab_mut(tab);
        if descriptor.section.is_none() {
            tab_entry.legacy_flat = true;
        }

        debug!(
            field = %descriptor.id,
            tab,
            section = descriptor.section.as_deref().unwrap_or(MAIN_SECTION),
            field_type = %descriptor.field_type,
            "Registered settings field"
        );

        let handler = FieldHandler::resolve(&descriptor);
        self.order.push(descriptor.id.clone());
        self.fields.insert(
            descriptor.id.clone(),
            RegisteredField {
                descriptor,
                handler,
            },
        );
        Ok(())
    }

    /// Registers every descriptor in order, stopping at the first error.
    pub fn register_all(
        &mut self,
        tab: &str,
        section: Option<&str>,
        descriptors: impl IntoIterator<Item = FieldDescriptor>,
    ) -> SettingsResult<()> {
        for descriptor in descriptors {
            self.register(tab, section, descriptor)?;
        }
        Ok(())
    }

    /// Tabs shown in the navigation, in registration order.
    ///
    /// `general` is always first; every other tab is listed only once it
    /// holds at least one field.
    pub fn tabs(&self) -> Vec<TabInfo> {
        self.tabs
            .iter()
            .filter(|t| t.id == GENERAL_TAB || self.tab_has_fields(&t.id))
            .map(|t| TabInfo {
                id: t.id.clone(),
                label: t.label.clone(),
            })
            .collect()
    }

    /// Sections of a tab; a single `main` section when none were registered.
    pub fn sections(&self, tab: &str) -> Vec<SectionInfo> {
        match self.tabs.iter().find(|t| t.id == tab) {
            Some(t) if !t.sections.is_empty() => t.sections.clone(),
            _ => vec![SectionInfo::new(MAIN_SECTION, "Main")],
        }
    }

    /// Declared type of a field.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UnknownField`] for unregistered ids.
    pub fn field_type(&self, id: &str) -> SettingsResult<FieldType> {
        self.fields
            .get(id)
            .map(|f| f.descriptor.field_type)
            .ok_or_else(|| SettingsError::UnknownField(id.to_string()))
    }

    pub fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.fields.get(id).map(|f| &f.descriptor)
    }

    /// Sanitizer strategy resolved for a field at registration.
    pub fn handler(&self, id: &str) -> Option<&FieldHandler> {
        self.fields.get(id).map(|f| &f.handler)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fields.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Section a field is displayed and saved under.
    pub fn section_of(&self, id: &str) -> Option<String> {
        let field = self.field(id)?;
        Some(self.resolve_section(field))
    }

    /// Fields shown on one tab/section page, in registration order.
    pub fn fields_in(&self, tab: &str, section: &str) -> Vec<&FieldDescriptor> {
        self.iter()
            .filter(|f| f.tab == tab && self.resolve_section(f) == section)
            .collect()
    }

    /// Flattens the registry into `(id, type)` pairs, optionally restricted
    /// to one tab/section scope.
    ///
    /// In a legacy flat tab every field matches any section of that tab.
    pub fn field_types(&self, scope: Option<(&str, &str)>) -> Vec<(&str, FieldType)> {
        self.iter()
            .filter(|f| match scope {
                None => true,
                Some((tab, section)) => {
                    f.tab == tab
                        && (self.is_legacy_flat(tab) || self.resolve_section(f) == section)
                }
            })
            .map(|f| (f.id.as_str(), f.field_type))
            .collect()
    }

    /// When a tab's `main` section is empty, the first section that does
    /// have fields. The settings page silently shows that section instead and
    /// posts a section-override token so the save is scoped correctly.
    pub fn first_populated_section(&self, tab: &str) -> Option<String> {
        if !self.fields_in(tab, MAIN_SECTION).is_empty() {
            return None;
        }
        self.sections(tab)
            .into_iter()
            .filter(|s| s.id != MAIN_SECTION)
            .find(|s| !self.fields_in(tab, &s.id).is_empty())
            .map(|s| s.id)
    }

    /// Declared default of a field, if it has a non-empty one.
    pub fn default_for(&self, id: &str) -> Option<&Value> {
        self.field(id)
            .map(|f| &f.default)
            .filter(|v| !is_empty_value(v))
    }

    /// Every non-empty default of a setting field.
    pub fn defaults(&self) -> SettingsBlob {
        self.iter()
            .filter(|f| f.field_type.is_setting() && !is_empty_value(&f.default))
            .map(|f| (f.id.clone(), f.default.clone()))
            .collect()
    }

    /// Descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.order
            .iter()
            .filter_map(|id| self.fields.get(id))
            .map(|f| &f.descriptor)
    }

    fn tab_mut(&mut self, id: &str) -> &mut Tab {
        let idx = match self.tabs.iter().position(|t| t.id == id) {
            Some(idx) => idx,
            None => {
                self.tabs.push(Tab::new(id, &title_case(id)));
                self.tabs.len() - 1
            }
        };
        &mut self.tabs[idx]
    }

    fn tab_has_fields(&self, tab: &str) -> bool {
        self.iter().any(|f| f.tab == tab)
    }

    fn is_legacy_flat(&self, tab: &str) -> bool {
        self.tabs.iter().any(|t| t.id == tab && t.legacy_flat)
    }

    fn resolve_section(&self, field: &FieldDescriptor) -> String {
        let Some(tab) = self.tabs.iter().find(|t| t.id == field.tab) else {
            return MAIN_SECTION.to_string();
        };
        match &field.section {
            Some(section) if !tab.legacy_flat && tab.has_section(section) => section.clone(),
            _ => MAIN_SECTION.to_string(),
        }
    }
}

fn title_case(id: &str) -> String {
    id.split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
