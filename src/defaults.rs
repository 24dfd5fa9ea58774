//! Documented fallback defaults
//!
//! Defaults are consulted by lookups only. They never take part in
//! exclusivity validation and are not part of the resolved flag set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::flag::FlagValue;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagDefaults(BTreeMap<String, FlagValue>);

impl FlagDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`FlagDefaults::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace a default, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FlagValue>) -> Option<FlagValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
