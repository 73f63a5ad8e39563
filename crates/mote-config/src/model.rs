//! In-memory configuration tree.
//!
//! # Design
//! - A [`Config`] holds one slot per schema field, in schema order; object
//!   slots stay empty. Every instance is complete: it starts from the schema
//!   defaults and only ever has typed values replaced.
//! - Serialisation walks the schema so emitted JSON follows schema order.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{FieldType, Schema, TypedValue};

/// Effective value of every field described by a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    schema: Arc<Schema>,
    values: Vec<Option<TypedValue>>,
}

/// Shared read-only handle to the live configuration.
pub type LiveConfig = Arc<Config>;

impl Config {
    /// Configuration holding the schema's built-in defaults.
    #[must_use]
    pub fn from_schema(schema: Arc<Schema>) -> Self {
        let values = schema
            .fields()
            .iter()
            .map(|field| field.default.clone())
            .collect();
        Self { schema, values }
    }

    /// Schema this configuration follows.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Current value of a leaf field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownField`] for unknown paths and
    /// [`ConfigError::TypeMismatch`] for object paths.
    pub fn get(&self, path: &str) -> ConfigResult<&TypedValue> {
        let position = self
            .schema
            .index_of(path)
            .ok_or_else(|| ConfigError::UnknownField {
                path: path.to_string(),
            })?;
        self.values[position]
            .as_ref()
            .ok_or_else(|| ConfigError::TypeMismatch {
                path: path.to_string(),
                expected: "leaf",
            })
    }

    /// Replace the value of a leaf field.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is unknown, names an object, or the
    /// value's type differs from the schema.
    pub fn set(&mut self, path: &str, value: TypedValue) -> ConfigResult<()> {
        let position = self
            .schema
            .index_of(path)
            .ok_or_else(|| ConfigError::UnknownField {
                path: path.to_string(),
            })?;
        let expected = self.schema.fields()[position].ty;
        if expected == FieldType::Object || value.field_type() != expected {
            return Err(ConfigError::TypeMismatch {
                path: path.to_string(),
                expected: expected.as_str(),
            });
        }
        self.values[position] = Some(value);
        Ok(())
    }

    /// Boolean value of `path`, if it is a boolean leaf.
    #[must_use]
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        match self.get(path) {
            Ok(TypedValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    /// Integer value of `path`, if it is an integer leaf.
    #[must_use]
    pub fn get_int(&self, path: &str) -> Option<i64> {
        match self.get(path) {
            Ok(TypedValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// String value of `path`, if it is a non-null string leaf.
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        match self.get(path) {
            Ok(TypedValue::Str(Some(value))) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Access rule the application declared through `conf_acl`; empty when unset.
    #[must_use]
    pub fn conf_acl(&self) -> &str {
        self.get_str("conf_acl").unwrap_or("")
    }

    /// Leaves in schema order with their current values.
    pub fn leaves(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.schema
            .fields()
            .iter()
            .zip(&self.values)
            .filter_map(|(field, value)| value.as_ref().map(|value| (field.path.as_str(), value)))
    }

    /// Full JSON rendering in schema order.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.render(|_, _| true)
    }

    /// JSON rendering of only the leaves that differ from `base`.
    ///
    /// Objects left without any differing leaf are omitted.
    #[must_use]
    pub fn diff_json(&self, base: &Self) -> Value {
        self.render(|position, value| {
            base.values.get(position).and_then(Option::as_ref) != Some(value)
        })
    }

    /// Serialise to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Emit`] if serialisation fails.
    pub fn emit(&self, pretty: bool) -> ConfigResult<String> {
        render_string(&self.to_json(), pretty)
    }

    fn render(&self, include: impl Fn(usize, &TypedValue) -> bool) -> Value {
        let mut root = Map::new();
        'fields: for (position, field) in self.schema.fields().iter().enumerate() {
            let Some(value) = &self.values[position] else {
                continue;
            };
            if !include(position, value) {
                continue;
            }
            let segments: Vec<&str> = field.path.split('.').collect();
            let Some((key, parents)) = segments.split_last() else {
                continue;
            };
            let mut cursor = &mut root;
            for parent in parents {
                let slot = cursor
                    .entry((*parent).to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                match slot {
                    Value::Object(next) => cursor = next,
                    _ => continue 'fields,
                }
            }
            cursor.insert((*key).to_string(), value.to_json());
        }
        Value::Object(root)
    }
}

/// Render a JSON value compactly or pretty-printed.
///
/// # Errors
///
/// Returns [`ConfigError::Emit`] if serialisation fails.
pub fn render_string(value: &Value, pretty: bool) -> ConfigResult<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.map_err(|source| ConfigError::Emit { source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_follow_schema() {
        let config = Config::from_schema(Schema::device());
        assert_eq!(config.conf_acl(), "*");
        assert_eq!(config.get_int("sys.wdt_timeout"), Some(30));
        assert_eq!(config.get_bool("http.enable"), Some(true));
        assert_eq!(config.get_str("wifi.sta.ssid"), None);
        assert!(config.get("wifi").is_err());
    }

    #[test]
    fn set_enforces_types() {
        let mut config = Config::from_schema(Schema::device());
        config
            .set("debug.level", TypedValue::Int(3))
            .expect("int accepted");
        assert_eq!(config.get_int("debug.level"), Some(3));
        assert!(config.set("debug.level", TypedValue::Bool(true)).is_err());
        assert!(config.set("debug", TypedValue::Int(1)).is_err());
        assert!(config.set("nope", TypedValue::Int(1)).is_err());
    }

    #[test]
    fn json_follows_schema_order_and_nesting() {
        let config = Config::from_schema(Schema::device());
        let value = config.to_json();
        let keys: Vec<_> = value
            .as_object()
            .expect("object")
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["conf_acl", "wifi", "http", "debug", "sys"]);
        assert_eq!(value["wifi"]["ap"]["channel"], json!(6));
        assert_eq!(value["wifi"]["sta"]["pass"], Value::Null);
    }

    #[test]
    fn diff_contains_only_changed_leaves() {
        let base = Config::from_schema(Schema::device());
        let mut changed = base.clone();
        changed
            .set("wifi.sta.ssid", TypedValue::Str(Some("home".into())))
            .expect("set");
        assert_eq!(
            changed.diff_json(&base),
            json!({ "wifi": { "sta": { "ssid": "home" } } })
        );
        assert_eq!(base.diff_json(&base), json!({}));
    }

    #[test]
    fn emit_supports_pretty_output() {
        let config = Config::from_schema(Schema::device());
        let compact = config.emit(false).expect("compact");
        let pretty = config.emit(true).expect("pretty");
        assert!(!compact.contains('\n'));
        assert!(pretty.contains('\n'));
        let reparsed: Value = serde_json::from_str(&pretty).expect("valid json");
        assert_eq!(reparsed, config.to_json());
    }
}
