//! Flag values and names.

use serde::{Deserialize, Serialize};
use sitecfg_directives::RawValue;
use std::fmt;

/// The value of a capability flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    /// Enumerated symbol, e.g. `PJ_SSL_SOCK_IMP_APPLE`
    Symbol(String),
}

impl FlagValue {
    /// Whether the flag counts as "set" for exclusivity checks.
    ///
    /// Mirrors `#if FLAG`: zero is false, any defined symbol is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            FlagValue::Int(i) => *i != 0,
            FlagValue::Symbol(_) => true,
        }
    }

    /// Variant name, used in type mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            FlagValue::Bool(_) => "bool",
            FlagValue::Int(_) => "int",
            FlagValue::Symbol(_) => "symbol",
        }
    }

    /// Render as a C macro replacement list.
    pub fn to_c_literal(&self) -> String {
        match self {
            FlagValue::Bool(true) => "1".to_string(),
            FlagValue::Bool(false) => "0".to_string(),
            FlagValue::Int(i) => i.to_string(),
            FlagValue::Symbol(s) => s.clone(),
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Int(i) => write!(f, "{}", i),
            FlagValue::Symbol(s) => f.write_str(s),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(b: bool) -> Self {
        FlagValue::Bool(b)
    }
}

impl From<i64> for FlagValue {
    fn from(i: i64) -> Self {
        FlagValue::Int(i)
    }
}

// Lets integer literals default to `i32` in generic `Into<FlagValue>` calls
impl From<i32> for FlagValue {
    fn from(i: i32) -> Self {
        FlagValue::Int(i64::from(i))
    }
}

impl From<&str> for FlagValue {
    fn from(s: &str) -> Self {
        FlagValue::Symbol(s.to_string())
    }
}

impl From<RawValue> for FlagValue {
    fn from(raw: RawValue) -> Self {
        match raw {
            // `#define NAME` defines the macro as present
            RawValue::Empty => FlagValue::Bool(true),
            RawValue::Int(i) => FlagValue::Int(i),
            RawValue::Bool(b) => FlagValue::Bool(b),
            RawValue::Ident(s) => FlagValue::Symbol(s),
        }
    }
}

/// Check a flag name: must be a C identifier.
pub fn is_valid_name(name: &str) -> bool {
    sitecfg_directives::is_identifier(name)
}
