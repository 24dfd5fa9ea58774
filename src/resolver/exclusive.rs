//! Mutual exclusion groups
//!
//! A group names flags of which at most one may be truthy once all layers
//! have been applied (e.g. little- vs big-endian).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::{ConflictingFlag, ResolveError};
use crate::resolved::ResolvedFlag;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionGroup {
    pub name: String,
    pub flags: Vec<String>,
}

impl ExclusionGroup {
    pub fn new<I, S>(name: impl Into<String>, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut members: Vec<String> = Vec::new();
        for flag in flags {
            let flag = flag.into();
            if !members.contains(&flag) {
                members.push(flag);
            }
        }
        Self {
            name: name.into(),
            flags: members,
        }
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// Structural validation pass, run once after every layer is applied.
///
/// Groups are checked in order; the first violated group is reported with
/// all of its truthy members.
pub(crate) fn validate(
    groups: &[ExclusionGroup],
    flags: &BTreeMap<String, ResolvedFlag>,
) -> Result<(), ResolveError> {
    for group in groups {
        // `flags` is public and deserializable; a repeated member counts once
        let mut seen = HashSet::new();
        let truthy: Vec<ConflictingFlag> = group
            .flags
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .filter_map(|name| {
                flags
                    .get(name)
                    .filter(|f| f.value.is_truthy())
                    .map(|f| ConflictingFlag {
                        flag: name.clone(),
                        layer: f.source.clone(),
                    })
            })
            .collect();

        if truthy.len() > 1 {
            return Err(ResolveError::ConflictingAssignment {
                group: group.name.clone(),
                flags: truthy,
            });
        }
    }
    Ok(())
}
