use std::fmt;

use serde::{Deserialize, Serialize};

/// Value types a device resource may declare in the registry
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    String,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Binary,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A decoded reading value
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Float64(f64),
    Int32(i32),
    String(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float64(_) => ValueKind::Float64,
            Value::Int32(_) => ValueKind::Int32,
            Value::String(_) => ValueKind::String,
        }
    }
}

/// One decoded measurement, tagged with where it came from
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    pub device_name: String,
    pub resource_name: String,
    pub value: Value,
}

impl Reading {
    pub fn new(device_name: &str, resource_name: &str, value: Value) -> Self {
        Self {
            device_name: device_name.to_string(),
            resource_name: resource_name.to_string(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kind_from_registry_name() {
        let kind: ValueKind = serde_json::from_str("\"Float64\"").unwrap();
        assert_eq!(kind, ValueKind::Float64);
        assert!(serde_json::from_str::<ValueKind>("\"float64\"").is_err());
    }

    #[test]
    fn test_value_serializes_untagged() {
        assert_eq!(serde_json::to_string(&Value::Float64(23.5)).unwrap(), "23.5");
        assert_eq!(serde_json::to_string(&Value::Int32(-7)).unwrap(), "-7");
        assert_eq!(
            serde_json::to_string(&Value::String("on".into())).unwrap(),
            "\"on\""
        );
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::Int32(1).kind(), ValueKind::Int32);
        assert_eq!(Value::String(String::new()).kind().to_string(), "String");
    }
}
