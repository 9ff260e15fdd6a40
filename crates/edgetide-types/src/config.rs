//! Configuration value model.
//!
//! Pipeline and stage configuration is an ordered list of named values.
//! [`ConfigValue`] is the tagged union the engine accepts; binding into a
//! typed bean is an explicit, fallible conversion owned by the consumer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One named configuration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    #[serde(default)]
    pub value: ConfigValue,
}

impl Config {
    pub fn new(name: impl Into<String>, value: ConfigValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Tagged configuration value union.
///
/// Untagged on the wire: JSON shapes map directly onto variants. Numbers
/// are always carried as `f64`, matching the source format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ConfigValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Human-readable name of the carried type, for configuration error
    /// messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Convert to a dynamic JSON value (for EL constants and persistence).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(ConfigValue::to_json).collect())
            }
            Self::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_deserialization_matches_json_shapes() {
        let configs: Vec<Config> = serde_json::from_str(
            r#"[
                {"name": "shouldRetry", "value": true},
                {"name": "retryAttempts", "value": -1},
                {"name": "title", "value": "edge pipeline"},
                {"name": "lanes", "value": [{"outputLane": "lane1"}]},
                {"name": "unset", "value": null}
            ]"#,
        )
        .unwrap();
        assert_eq!(configs[0].value.as_bool(), Some(true));
        assert_eq!(configs[1].value.as_f64(), Some(-1.0));
        assert_eq!(configs[2].value.as_str(), Some("edge pipeline"));
        assert_eq!(configs[3].value.as_list().unwrap().len(), 1);
        assert!(configs[4].value.is_null());
    }

    #[test]
    fn missing_value_defaults_to_null() {
        let config: Config = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert!(config.value.is_null());
    }

    #[test]
    fn type_names_for_error_messages() {
        assert_eq!(ConfigValue::Bool(true).type_name(), "boolean");
        assert_eq!(ConfigValue::Number(1.0).type_name(), "number");
        assert_eq!(ConfigValue::String("x".into()).type_name(), "string");
    }

    #[test]
    fn to_json_roundtrips_shapes() {
        let value = ConfigValue::Map(
            [(
                "k".to_string(),
                ConfigValue::List(vec![ConfigValue::Number(1.0), ConfigValue::Bool(false)]),
            )]
            .into(),
        );
        assert_eq!(value.to_json(), serde_json::json!({"k": [1.0, false]}));
    }
}
