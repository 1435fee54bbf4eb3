use std::fmt;

use serde::{Deserialize, Serialize};

/// One raw parameter value as it appears in the analytics export: a
/// record with at most one of the typed slots populated (though nothing
/// stops an upstream SDK from filling several).
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct TypedValue {
    #[serde(default)]
    pub string_value: Option<String>,
    #[serde(default)]
    pub int_value: Option<i64>,
    #[serde(default)]
    pub float_value: Option<f64>,
    #[serde(default)]
    pub double_value: Option<f64>,
}

impl TypedValue {
    pub fn string(v: impl Into<String>) -> Self {
        TypedValue {
            string_value: Some(v.into()),
            ..Default::default()
        }
    }

    pub fn int(v: i64) -> Self {
        TypedValue {
            int_value: Some(v),
            ..Default::default()
        }
    }

    pub fn float(v: f64) -> Self {
        TypedValue {
            float_value: Some(v),
            ..Default::default()
        }
    }

    pub fn double(v: f64) -> Self {
        TypedValue {
            double_value: Some(v),
            ..Default::default()
        }
    }
}

/// An event's parameter bag (or user-property bag, or item-level
/// custom-dimension bag): an ordered sequence of keyed records.
/// Read-only input to extraction, never mutated.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct KeyValueCollection {
    pub entries: Vec<(String, TypedValue)>,
}

impl KeyValueCollection {
    pub fn new(entries: Vec<(String, TypedValue)>) -> Self {
        KeyValueCollection { entries }
    }

    /// First record stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&TypedValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// A value after type-directed resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Text(String),
    Integer(i64),
    Number(f64),
}

impl ResolvedValue {
    pub fn as_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::Text(s) => write!(f, "{s}"),
            ResolvedValue::Integer(i) => write!(f, "{i}"),
            ResolvedValue::Number(n) => write!(f, "{n}"),
        }
    }
}
