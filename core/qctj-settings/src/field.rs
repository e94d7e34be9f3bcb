use crate::error::{SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Name of the form array every settings input is posted under.
pub const SETTINGS_FORM_NAME: &str = "qctj_settings";

/// The kind of a settings field. Selects sanitizer and renderer behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Checkbox,
    Text,
    Number,
    Select,
    Multicheck,
    LicenseKey,
    Header,
    Hook,
    DescriptiveText,
}

impl FieldType {
    pub const ALL: [FieldType; 9] = [
        FieldType::Checkbox,
        FieldType::Text,
        FieldType::Number,
        FieldType::Select,
        FieldType::Multicheck,
        FieldType::LicenseKey,
        FieldType::Header,
        FieldType::Hook,
        FieldType::DescriptiveText,
    ];

    /// Returns false for layout-only types that never reach the blob.
    pub fn is_setting(&self) -> bool {
        !matches!(
            self,
            FieldType::Header | FieldType::Hook | FieldType::DescriptiveText
        )
    }

    /// Returns true for the checkbox family that posts the unchecked sentinel.
    pub fn is_checkable(&self) -> bool {
        matches!(self, FieldType::Checkbox | FieldType::Multicheck)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Checkbox => "checkbox",
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Select => "select",
            FieldType::Multicheck => "multicheck",
            FieldType::LicenseKey => "license_key",
            FieldType::Header => "header",
            FieldType::Hook => "hook",
            FieldType::DescriptiveText => "descriptive_text",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// One choice of a select or multicheck field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Declarative metadata for one configurable setting.
///
/// The rendering arguments (`size`, `placeholder`, `faux`, ...) are carried
/// as a data contract for whatever draws the form; this crate only reads
/// `field_type`, `default`, `options`, `min`, `max` and `multiple`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: String,
    /// Tab the field lives in. Filled in by the registry.
    #[serde(default)]
    pub tab: String,
    /// Section within the tab. `None` means the legacy flat layout.
    #[serde(default)]
    pub section: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, rename = "std")]
    pub default: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default = "default_allow_blank")]
    pub allow_blank: bool,
    #[serde(default)]
    pub readonly: bool,
    /// Rendered without a `name`, so it is never submitted.
    #[serde(default)]
    pub faux: bool,
    #[serde(default)]
    pub field_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip_desc: Option<String>,
    /// For `license_key` fields: option holding the activation record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid_license_option: Option<String>,
}

fn default_allow_blank() -> bool {
    true
}

impl FieldDescriptor {
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            tab: String::new(),
            section: None,
            field_type,
            default: Value::String(String::new()),
            name: String::new(),
            desc: String::new(),
            size: None,
            options: Vec::new(),
            min: None,
            max: None,
            step: None,
            multiple: false,
            placeholder: None,
            allow_blank: true,
            readonly: false,
            faux: false,
            field_class: String::new(),
            tooltip_title: None,
            tooltip_desc: None,
            is_valid_license_option: None,
        }
    }

    /// Parses a descriptor from loosely typed JSON (extension manifests).
    ///
    /// An unrecognised `type` is a configuration error, not a parse error, so
    /// callers can report the offending field id.
    pub fn from_json(value: &Value) -> SettingsResult<Self> {
        let field_id = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if let Some(raw_type) = value.get("type").and_then(Value::as_str) {
            if raw_type.parse::<FieldType>().is_err() {
                return Err(SettingsError::UnknownFieldType {
                    field_id,
                    field_type: raw_type.to_string(),
                });
            }
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Shorthand for a checkbox.
    pub fn checkbox(id: &str, name: &str) -> Self {
        Self::new(id, FieldType::Checkbox).with_name(name)
    }

    /// Shorthand for a free-text input.
    pub fn text(id: &str, name: &str) -> Self {
        Self::new(id, FieldType::Text).with_name(name)
    }

    /// Shorthand for a numeric input with the usual 0..=999999 range.
    pub fn number(id: &str, name: &str) -> Self {
        let mut field = Self::new(id, FieldType::Number).with_name(name);
        field.min = Some(0.0);
        field.max = Some(999_999.0);
        field.step = Some(1.0);
        field
    }

    /// Shorthand for a single-choice select.
    pub fn select(id: &str, name: &str, options: Vec<FieldOption>) -> Self {
        let mut field = Self::new(id, FieldType::Select).with_name(name);
        field.options = options;
        field
    }

    /// Shorthand for a group of checkboxes.
    pub fn multicheck(id: &str, name: &str, options: Vec<FieldOption>) -> Self {
        let mut field = Self::new(id, FieldType::Multicheck).with_name(name);
        field.options = options;
        field
    }

    /// Shorthand for an extension license key input.
    pub fn license_key(id: &str, name: &str, license_option: &str) -> Self {
        let mut field = Self::new(id, FieldType::LicenseKey).with_name(name);
        field.size = Some("regular".into());
        field.is_valid_license_option = Some(license_option.into());
        field
    }

    /// Shorthand for a section heading.
    pub fn header(id: &str, name: &str) -> Self {
        Self::new(id, FieldType::Header).with_name(name)
    }

    /// Shorthand for a placeholder that extensions fill at render time.
    pub fn hook(id: &str) -> Self {
        Self::new(id, FieldType::Hook)
    }

    /// Shorthand for a block of explanatory text.
    pub fn descriptive_text(id: &str, desc: &str) -> Self {
        Self::new(id, FieldType::DescriptiveText).with_desc(desc)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_desc(mut self, desc: &str) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn with_section(mut self, section: &str) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// Form input name, e.g. `qctj_settings[allow_tracking]`.
    pub fn input_name(&self) -> String {
        format!("{SETTINGS_FORM_NAME}[{}]", sanitize_key(&self.id))
    }

    /// Name of the nonce field rendered next to a license key input.
    pub fn nonce_name(&self) -> String {
        format!("{}-nonce", sanitize_key(&self.id))
    }

    /// Returns true if `value` is one of the declared option keys.
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

/// Strips everything except alphanumerics, `_`, `-`, `.`, `:` and `/`.
///
/// Keys are internal identifiers embedded into form names and nonce actions.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '/'))
        .collect()
}
