//! Generic values used for trace environments and user attributes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{GraphError, Result};

/// Dynamically typed value.
///
/// Trace environment entries and stream user attributes are free-form; the core
/// never interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    UnsignedInteger(u64),
    SignedInteger(i64),
    Real(f64),
    String(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Create an empty map value.
    pub fn map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// String contents, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Unsigned integer contents; non-negative signed integers convert.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UnsignedInteger(v) => Some(*v),
            Value::SignedInteger(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Signed integer contents; unsigned integers that fit convert.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::SignedInteger(v) => Some(*v),
            Value::UnsignedInteger(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Boolean contents.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow a map entry.
    pub fn map_entry(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Mutably borrow a map entry.
    pub fn map_entry_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self {
            Value::Map(map) => map.get_mut(key),
            _ => None,
        }
    }

    /// Insert or replace a map entry.
    pub fn insert_map_entry(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        match self {
            Value::Map(map) => {
                map.insert(key.into(), value.into());
                Ok(())
            }
            other => Err(GraphError::type_conversion(format!(
                "cannot insert a map entry into {:?}",
                other
            ))),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UnsignedInteger(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::SignedInteger(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_entries() {
        let mut env = Value::map();
        env.insert_map_entry("hostname", "box").unwrap();
        env.insert_map_entry("tracer_major", 2u64).unwrap();

        assert_eq!(env.map_entry("hostname").and_then(Value::as_str), Some("box"));
        assert_eq!(env.map_entry("tracer_major").and_then(Value::as_u64), Some(2));
        assert!(env.map_entry("missing").is_none());

        let mut scalar = Value::from(true);
        assert!(scalar.insert_map_entry("k", 1u64).is_err());
    }

    #[test]
    fn integer_conversions() {
        assert_eq!(Value::SignedInteger(-1).as_u64(), None);
        assert_eq!(Value::SignedInteger(7).as_u64(), Some(7));
        assert_eq!(Value::UnsignedInteger(u64::MAX).as_i64(), None);
    }

    #[test]
    fn yaml_roundtrip_keeps_structure() {
        let yaml = "domain: kernel\ncpus: 8\nfeatures: [a, b]\n";
        let value: Value = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(value.map_entry("domain").and_then(Value::as_str), Some("kernel"));
        assert_eq!(value.map_entry("cpus").and_then(Value::as_u64), Some(8));
        assert!(matches!(value.map_entry("features"), Some(Value::Array(items)) if items.len() == 2));
    }
}
