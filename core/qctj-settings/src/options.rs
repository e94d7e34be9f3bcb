use crate::blob::{is_empty_value, SettingsBlob};
use crate::error::SettingsResult;
use crate::registry::SettingsRegistry;
use crate::store::OptionStore;
use serde_json::Value;
use tracing::info;

/// Option name of the settings blob.
pub const SETTINGS_OPTION: &str = "qctj_settings";

/// Per-tab blobs written by releases that predate the single blob. Merged in
/// this order, later wins.
pub const LEGACY_SETTINGS_OPTIONS: [&str; 3] = [
    "qctj_settings_general",
    "qctj_settings_extensions",
    "qctj_settings_licenses",
];

/// Request-scoped copy of the settings blob.
///
/// Loaded once and passed by reference. Writes go through to the store and
/// are mirrored into this copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    blob: SettingsBlob,
}

impl Settings {
    /// Loads the blob, migrating the legacy per-tab blobs when it is empty.
    pub fn load(store: &dyn OptionStore) -> SettingsResult<Self> {
        let stored = read_blob(store)?;
        if !stored.is_empty() {
            return Ok(Self { blob: stored });
        }

        let mut migrated = SettingsBlob::new();
        for name in LEGACY_SETTINGS_OPTIONS {
            if let Some(legacy) = store.get(name)? {
                migrated.merge(&SettingsBlob::from_value(legacy));
            }
        }
        if !migrated.is_empty() {
            info!(keys = migrated.len(), "Migrated legacy settings into {SETTINGS_OPTION}");
        }
        store.set(SETTINGS_OPTION, &migrated.clone().into_value())?;
        Ok(Self { blob: migrated })
    }

    pub fn from_blob(blob: SettingsBlob) -> Self {
        Self { blob }
    }

    pub fn blob(&self) -> &SettingsBlob {
        &self.blob
    }

    /// Value of `key`, or `default` when it is missing or empty.
    pub fn get_option(&self, key: &str, default: impl Into<Value>) -> Value {
        match self.blob.get(key) {
            Some(value) if !is_empty_value(value) => value.clone(),
            _ => default.into(),
        }
    }

    /// Value of `key`, or the field's declared default.
    pub fn value_or_default(&self, key: &str, registry: &SettingsRegistry) -> Value {
        let default = registry.default_for(key).cloned().unwrap_or(Value::Null);
        self.get_option(key, default)
    }

    /// String value of `key` when non-empty.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.blob.get_str(key).filter(|s| !s.is_empty())
    }

    /// True when `key` holds a non-empty value.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.blob.is_set(key)
    }

    /// Writes one key. An empty value deletes the key instead.
    ///
    /// The stored blob is re-read first so keys written by other code paths
    /// in the same request are not lost.
    pub fn update_option(
        &mut self,
        store: &dyn OptionStore,
        key: &str,
        value: impl Into<Value>,
    ) -> SettingsResult<bool> {
        if key.is_empty() {
            return Ok(false);
        }
        let value = value.into();
        if is_empty_value(&value) {
            return self.delete_option(store, key);
        }

        let mut stored = read_blob(store)?;
        stored.insert(key, value);
        let changed = store.set(SETTINGS_OPTION, &stored.clone().into_value())?;
        self.blob = stored;
        Ok(changed)
    }

    /// Removes one key.
    pub fn delete_option(&mut self, store: &dyn OptionStore, key: &str) -> SettingsResult<bool> {
        if key.is_empty() {
            return Ok(false);
        }
        let mut stored = read_blob(store)?;
        stored.remove(key);
        let changed = store.set(SETTINGS_OPTION, &stored.clone().into_value())?;
        self.blob = stored;
        Ok(changed)
    }

    /// Replaces the whole blob, e.g. with a sanitizer result.
    pub fn save(&mut self, store: &dyn OptionStore, blob: SettingsBlob) -> SettingsResult<bool> {
        let changed = store.set(SETTINGS_OPTION, &blob.clone().into_value())?;
        self.blob = blob;
        Ok(changed)
    }
}

fn read_blob(store: &dyn OptionStore) -> SettingsResult<SettingsBlob> {
    Ok(store
        .get(SETTINGS_OPTION)?
        .map(SettingsBlob::from_value)
        .unwrap_or_default())
}
