//! The machine state store's dynamic value type.
//!
//! The firmware's key space is extensible and firmware-defined, so the
//! store keeps a single `HashMap<String, Value>` rather than per-name typed
//! fields (see SPEC_FULL.md §3, §9 "Dynamic state map").

use serde::{Deserialize, Serialize};

/// A scalar value held by the machine state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Numeric view, coercing bool to 0/1. Returns `None` for `Str`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(_) => None,
        }
    }

    /// Integer view, truncating floats. Returns `None` for `Str`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(if *b { 1 } else { 0 }),
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Str(_) => None,
        }
    }

    /// Truthiness view: nonzero numbers and `true` are truthy.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    /// String view; numbers and bools are formatted, not quoted.
    pub fn as_str_lossy(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
        }
    }

    /// Parse a MDI-style literal (`true`/`false`/float/bareword string),
    /// mirroring the coercion `AVR.mdi()` performs on `$name=value` in
    /// `original_source/AVR.py`.
    pub fn parse_literal(raw: &str) -> Value {
        if raw.eq_ignore_ascii_case("true") {
            Value::Bool(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Value::Bool(false)
        } else if let Ok(f) = raw.parse::<f64>() {
            Value::Float(f)
        } else {
            Value::Str(raw.to_string())
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
