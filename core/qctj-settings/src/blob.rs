use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Value posted by the hidden input that accompanies every checkbox, so an
/// explicitly unchecked box can be told apart from one that was not rendered.
pub const UNCHECKED_SENTINEL: &str = "-1";

/// The single settings record persisted under one option name.
///
/// Keys are unique; a missing key means "use the declared default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsBlob(Map<String, Value>);

impl SettingsBlob {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a blob from a stored JSON value. Anything other than an object
    /// (an uninitialised option is stored as `null` or `""`) yields an empty blob.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`, if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns true if `key` holds a non-empty value.
    pub fn is_set(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !is_empty_value(v))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Overwrites keys in `self` with every key of `other`.
    pub fn merge(&mut self, other: &SettingsBlob) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Returns `self` overlaid with `other`; `other` wins on conflicts.
    pub fn merged(&self, other: &SettingsBlob) -> SettingsBlob {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for SettingsBlob {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SettingsBlob {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Loose emptiness as the settings forms see it: `null`, `false`, zero,
/// `""`, `"0"` and empty collections are all empty.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
