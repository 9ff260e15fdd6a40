//! Tagged field values.
//!
//! [`Field`] is the unit of data inside a record: a primitive or a
//! container of further fields. The serde representation is externally
//! tagged (`{"type": "STRING", "value": "..."}`) so persisted records
//! keep their exact type shape.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A tagged value flowing through pipeline records.
///
/// The type tag always matches the stored value's shape; containers may
/// nest arbitrarily. Value semantics (no shared ownership) make cycles
/// impossible by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Field {
    #[serde(rename = "STRING")]
    String(String),
    #[serde(rename = "INTEGER")]
    Integer(i64),
    #[serde(rename = "FLOAT")]
    Float(f64),
    #[serde(rename = "BOOLEAN")]
    Boolean(bool),
    #[serde(rename = "DATETIME")]
    Datetime(DateTime<Utc>),
    #[serde(rename = "BYTE_ARRAY")]
    ByteArray(Vec<u8>),
    #[serde(rename = "LIST")]
    List(Vec<Field>),
    #[serde(rename = "MAP")]
    Map(BTreeMap<String, Field>),
}

impl Field {
    /// Observable type name of this field (e.g. `"MAP"`, `"STRING"`).
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "STRING",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Boolean(_) => "BOOLEAN",
            Self::Datetime(_) => "DATETIME",
            Self::ByteArray(_) => "BYTE_ARRAY",
            Self::List(_) => "LIST",
            Self::Map(_) => "MAP",
        }
    }

    /// Returns `true` for `LIST` and `MAP` fields.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Borrow the inner string of a `STRING` field.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the entries of a `MAP` field.
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Field>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow the elements of a `LIST` field.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Field]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Convert to a dynamic JSON value for expression evaluation.
    ///
    /// Datetimes render as RFC 3339 strings, byte arrays as number
    /// arrays; containers convert recursively.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Datetime(dt) => {
                serde_json::Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Self::ByteArray(bytes) => {
                serde_json::Value::Array(bytes.iter().map(|b| serde_json::Value::from(*b)).collect())
            }
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Field::to_json).collect())
            }
            Self::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Build a `MAP` field from an iterator of key/field pairs.
    pub fn map<K: Into<String>, I: IntoIterator<Item = (K, Field)>>(entries: I) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a `STRING` field.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_match_variants() {
        assert_eq!(Field::String("x".into()).type_name(), "STRING");
        assert_eq!(Field::Integer(1).type_name(), "INTEGER");
        assert_eq!(Field::Float(1.5).type_name(), "FLOAT");
        assert_eq!(Field::Boolean(true).type_name(), "BOOLEAN");
        assert_eq!(Field::ByteArray(vec![1]).type_name(), "BYTE_ARRAY");
        assert_eq!(Field::List(vec![]).type_name(), "LIST");
        assert_eq!(Field::map::<&str, _>([]).type_name(), "MAP");
    }

    #[test]
    fn serde_roundtrip_preserves_type_tag() {
        let field = Field::map([
            ("text", Field::string("test data 1")),
            ("count", Field::Integer(7)),
        ]);
        let json = serde_json::to_string(&field).unwrap();
        assert!(json.contains("\"MAP\""));
        let back: Field = serde_json::from_str(&json).unwrap();
        assert_eq!(field, back);
    }

    #[test]
    fn to_json_flattens_containers() {
        let field = Field::map([(
            "items",
            Field::List(vec![Field::Integer(1), Field::Integer(2)]),
        )]);
        assert_eq!(
            field.to_json(),
            serde_json::json!({"items": [1, 2]})
        );
    }

    #[test]
    fn container_check() {
        assert!(Field::List(vec![]).is_container());
        assert!(Field::map::<&str, _>([]).is_container());
        assert!(!Field::string("x").is_container());
    }
}
