use crate::blob::SettingsBlob;
use crate::error::{SettingsError, SettingsResult};
use crate::field::{FieldDescriptor, FieldType};
use crate::kses;
use serde_json::{Number, Value};

/// Per-type sanitizer, resolved once when a field is registered.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldHandler {
    /// Layout-only types. Never written to the blob.
    Skip,
    /// Allowed-tag HTML filter, then trim.
    Text,
    /// Numeric value, bounds-checked when the field declares them.
    Number { min: Option<f64>, max: Option<f64> },
    /// Declared option keys only.
    Select { allowed: Vec<String>, multiple: bool },
    /// No type-specific sanitizer; the value passes through.
    Missing,
}

impl FieldHandler {
    pub fn resolve(field: &FieldDescriptor) -> Self {
        match field.field_type {
            FieldType::Header | FieldType::Hook | FieldType::DescriptiveText => Self::Skip,
            FieldType::Text => Self::Text,
            FieldType::Number => Self::Number {
                min: field.min,
                max: field.max,
            },
            FieldType::Select => Self::Select {
                allowed: field.options.iter().map(|o| o.value.clone()).collect(),
                multiple: field.multiple,
            },
            FieldType::Checkbox | FieldType::Multicheck | FieldType::LicenseKey => Self::Missing,
        }
    }

    /// Sanitizes one submitted value.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Validation`] when the value cannot be kept.
    pub fn apply(&self, field_id: &str, value: Value) -> SettingsResult<Value> {
        match self {
            Self::Skip | Self::Missing => Ok(trim_string(value)),
            Self::Text => Ok(match value {
                Value::String(s) => Value::String(kses::filter_allowed_html(&s).trim().to_string()),
                other => other,
            }),
            Self::Number { min, max } => sanitize_number(field_id, value, *min, *max),
            Self::Select { allowed, multiple } => {
                sanitize_select(field_id, value, allowed, *multiple)
            }
        }
    }
}

fn trim_string(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other,
    }
}

fn invalid(field_id: &str, message: impl Into<String>) -> SettingsError {
    SettingsError::Validation {
        field_id: field_id.to_string(),
        message: message.into(),
    }
}

fn sanitize_number(
    field_id: &str,
    value: Value,
    min: Option<f64>,
    max: Option<f64>,
) -> SettingsResult<Value> {
    let parsed = match &value {
        Value::Null => return Ok(value),
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return Ok(Value::String(String::new())),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(n) = parsed.filter(|n| n.is_finite()) else {
        return Err(invalid(field_id, "must be a number"));
    };

    if let Some(min) = min.filter(|min| n < *min) {
        return Err(invalid(field_id, format!("must be at least {min}")));
    }
    if let Some(max) = max.filter(|max| n > *max) {
        return Err(invalid(field_id, format!("must be at most {max}")));
    }

    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return Ok(Value::from(n as i64));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| invalid(field_id, "must be a number"))
}

fn sanitize_select(
    field_id: &str,
    value: Value,
    allowed: &[String],
    multiple: bool,
) -> SettingsResult<Value> {
    let is_allowed = |s: &str| allowed.is_empty() || allowed.iter().any(|a| a == s);

    match value {
        Value::Array(items) if multiple => Ok(Value::Array(
            items
                .into_iter()
                .filter(|item| item.as_str().is_some_and(is_allowed))
                .collect(),
        )),
        Value::Array(_) | Value::Object(_) => {
            Err(invalid(field_id, "only one choice may be selected"))
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || is_allowed(s) {
                Ok(Value::String(s.to_string()))
            } else {
                Err(invalid(field_id, format!("'{s}' is not one of the available choices")))
            }
        }
        Value::Number(n) if !allowed.is_empty() => {
            let key = n.to_string();
            if is_allowed(&key) {
                Ok(Value::String(key))
            } else {
                Err(invalid(field_id, format!("'{key}' is not one of the available choices")))
            }
        }
        other => Ok(other),
    }
}

/// Extension point around a settings save.
///
/// Every method has a pass-through default; implement only what you need.
/// Hooks run in the order they were added to the sanitizer.
pub trait SanitizeHook: Send + Sync {
    /// Filters the submitted values of a whole tab before they are merged.
    fn filter_tab_input(&self, tab: &str, input: SettingsBlob) -> SettingsBlob {
        let _ = tab;
        input
    }

    /// Filters the submitted values of one tab section, after the tab filter.
    fn filter_section_input(&self, tab: &str, section: &str, input: SettingsBlob) -> SettingsBlob {
        let _ = (tab, section);
        input
    }

    /// Called for every value after its type sanitizer.
    fn post_sanitize(&self, field_id: &str, field_type: FieldType, value: Value) -> Value {
        let _ = (field_id, field_type);
        value
    }
}
