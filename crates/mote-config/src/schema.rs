//! Static description of every configuration field.
//!
//! # Design
//! - The schema is data: an ordered list of [`FieldDescriptor`]s built once at
//!   startup from a table. Its order is the merge and emit order.
//! - Object fields carry no value; leaves carry a typed default.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};

/// Primitive type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Boolean leaf.
    Bool,
    /// Signed integer leaf.
    Int,
    /// String leaf (may be null).
    String,
    /// Nested object holding other fields.
    Object,
}

impl FieldType {
    /// Render the type name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::String => "string",
            Self::Object => "object",
        }
    }
}

/// Value held by a leaf field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// String value; `None` is the null string.
    Str(Option<String>),
}

impl TypedValue {
    /// Type of the value.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::Bool(_) => FieldType::Bool,
            Self::Int(_) => FieldType::Int,
            Self::Str(_) => FieldType::String,
        }
    }

    /// JSON rendering of the value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(*value),
            Self::Int(value) => Value::from(*value),
            Self::Str(Some(value)) => Value::String(value.clone()),
            Self::Str(None) => Value::Null,
        }
    }

    /// Convert a JSON value into a typed value for a leaf of type `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TypeMismatch`] when the JSON type does not fit.
    pub fn from_json(ty: FieldType, value: &Value, path: &str) -> ConfigResult<Self> {
        let mismatch = || ConfigError::TypeMismatch {
            path: path.to_string(),
            expected: ty.as_str(),
        };
        match (ty, value) {
            (FieldType::Bool, Value::Bool(flag)) => Ok(Self::Bool(*flag)),
            (FieldType::Int, Value::Number(number)) => {
                number.as_i64().map(Self::Int).ok_or_else(mismatch)
            }
            (FieldType::String, Value::String(text)) => Ok(Self::Str(Some(text.clone()))),
            (FieldType::String, Value::Null) => Ok(Self::Str(None)),
            _ => Err(mismatch()),
        }
    }
}

/// One field of the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Dotted path, e.g. `wifi.ap.ssid`.
    pub path: String,
    /// Primitive type.
    pub ty: FieldType,
    /// Built-in default; `None` for objects.
    pub default: Option<TypedValue>,
    /// Only the unrestricted layer may set this field.
    pub sys_only: bool,
}

impl FieldDescriptor {
    /// Nested object field.
    #[must_use]
    pub fn object(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ty: FieldType::Object,
            default: None,
            sys_only: false,
        }
    }

    /// Boolean leaf with a default.
    #[must_use]
    pub fn boolean(path: impl Into<String>, default: bool) -> Self {
        Self::leaf(path, TypedValue::Bool(default))
    }

    /// Integer leaf with a default.
    #[must_use]
    pub fn int(path: impl Into<String>, default: i64) -> Self {
        Self::leaf(path, TypedValue::Int(default))
    }

    /// String leaf with an optional default.
    #[must_use]
    pub fn string(path: impl Into<String>, default: Option<&str>) -> Self {
        Self::leaf(path, TypedValue::Str(default.map(str::to_string)))
    }

    /// Restrict the field to the unrestricted layer.
    #[must_use]
    pub const fn sys_only(mut self) -> Self {
        self.sys_only = true;
        self
    }

    fn leaf(path: impl Into<String>, default: TypedValue) -> Self {
        Self {
            path: path.into(),
            ty: default.field_type(),
            default: Some(default),
            sys_only: false,
        }
    }

    /// Dotted path of the enclosing object, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.path.rsplit_once('.').map(|(parent, _)| parent)
    }

    /// Last segment of the path.
    #[must_use]
    pub fn key(&self) -> &str {
        self.path
            .rsplit_once('.')
            .map_or(self.path.as_str(), |(_, key)| key)
    }
}

/// Ordered, immutable collection of field descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema from descriptors in emit order. Parents must precede children.
    #[must_use]
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        let index = fields
            .iter()
            .enumerate()
            .map(|(position, field)| (field.path.clone(), position))
            .collect();
        Self { fields, index }
    }

    /// Schema of the device firmware.
    #[must_use]
    pub fn device() -> Arc<Self> {
        Arc::clone(&DEVICE_SCHEMA)
    }

    /// Every field in stable order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by dotted path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FieldDescriptor> {
        self.index_of(path).map(|position| &self.fields[position])
    }

    /// Position of a field in schema order.
    #[must_use]
    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.index.get(path).copied()
    }

    /// Built-in default of a leaf field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownField`] if the path does not exist and
    /// [`ConfigError::TypeMismatch`] if it names an object.
    pub fn default_for(&self, path: &str) -> ConfigResult<TypedValue> {
        let field = self.get(path).ok_or_else(|| ConfigError::UnknownField {
            path: path.to_string(),
        })?;
        field
            .default
            .clone()
            .ok_or_else(|| ConfigError::TypeMismatch {
                path: path.to_string(),
                expected: "leaf",
            })
    }

    /// Fields whose parent is `prefix` (top-level fields for `None`).
    pub fn children<'a>(
        &'a self,
        prefix: Option<&'a str>,
    ) -> impl Iterator<Item = &'a FieldDescriptor> + 'a {
        self.fields
            .iter()
            .filter(move |field| field.parent() == prefix)
    }
}

static DEVICE_SCHEMA: Lazy<Arc<Schema>> = Lazy::new(|| Arc::new(Schema::new(device_fields())));

fn device_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::string("conf_acl", Some("*")).sys_only(),
        FieldDescriptor::object("wifi"),
        FieldDescriptor::object("wifi.ap"),
        FieldDescriptor::boolean("wifi.ap.enable", true),
        FieldDescriptor::string("wifi.ap.ssid", Some("Mote_??????")),
        FieldDescriptor::string("wifi.ap.pass", None),
        FieldDescriptor::int("wifi.ap.channel", 6),
        FieldDescriptor::object("wifi.sta"),
        FieldDescriptor::boolean("wifi.sta.enable", false),
        FieldDescriptor::string("wifi.sta.ssid", None),
        FieldDescriptor::string("wifi.sta.pass", None),
        FieldDescriptor::object("http"),
        FieldDescriptor::boolean("http.enable", true),
        FieldDescriptor::string("http.listen_addr", Some("0.0.0.0:80")),
        FieldDescriptor::string("http.hidden_files", None),
        FieldDescriptor::string("http.upload_acl", Some("*")),
        FieldDescriptor::object("debug"),
        FieldDescriptor::int("debug.level", 2),
        FieldDescriptor::int("debug.factory_reset_gpio", -1),
        FieldDescriptor::boolean("debug.enable_prompt", true),
        FieldDescriptor::object("sys"),
        FieldDescriptor::int("sys.wdt_timeout", 30),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn device_schema_order_is_stable() {
        let first: Vec<_> = Schema::device()
            .fields()
            .iter()
            .map(|f| f.path.clone())
            .collect();
        let second: Vec<_> = Schema::device()
            .fields()
            .iter()
            .map(|f| f.path.clone())
            .collect();
        assert_eq!(first, second);
        assert_eq!(first[0], "conf_acl");
    }

    #[test]
    fn parents_precede_children() {
        let schema = Schema::device();
        for (position, field) in schema.fields().iter().enumerate() {
            if let Some(parent) = field.parent() {
                let parent_position = schema.index_of(parent).expect("parent declared");
                assert!(parent_position < position, "{} before parent", field.path);
                assert_eq!(schema.get(parent).map(|f| f.ty), Some(FieldType::Object));
            }
        }
    }

    #[test]
    fn default_for_reports_unknown_and_object_paths() {
        let schema = Schema::device();
        assert_eq!(
            schema.default_for("wifi.ap.channel").expect("default"),
            TypedValue::Int(6)
        );
        assert!(matches!(
            schema.default_for("wifi.ap.nope"),
            Err(ConfigError::UnknownField { .. })
        ));
        assert!(matches!(
            schema.default_for("wifi.ap"),
            Err(ConfigError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn children_walks_one_level() {
        let schema = Schema::device();
        let top: Vec<_> = schema.children(None).map(FieldDescriptor::key).collect();
        assert_eq!(top, vec!["conf_acl", "wifi", "http", "debug", "sys"]);
        let ap: Vec<_> = schema
            .children(Some("wifi.ap"))
            .map(FieldDescriptor::key)
            .collect();
        assert_eq!(ap, vec!["enable", "ssid", "pass", "channel"]);
    }

    #[test]
    fn typed_values_convert_from_json() {
        assert_eq!(
            TypedValue::from_json(FieldType::Int, &json!(42), "a").expect("int"),
            TypedValue::Int(42)
        );
        assert_eq!(
            TypedValue::from_json(FieldType::String, &Value::Null, "a").expect("null"),
            TypedValue::Str(None)
        );
        assert!(TypedValue::from_json(FieldType::Int, &json!(1.5), "a").is_err());
        assert!(TypedValue::from_json(FieldType::Bool, &json!("true"), "a").is_err());
        assert!(TypedValue::from_json(FieldType::Object, &json!({}), "a").is_err());
    }
}
