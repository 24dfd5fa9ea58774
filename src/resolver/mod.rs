//! Configuration resolver
//!
//! Merges priority-ordered layers into one immutable configuration:
//! - Layers apply in ascending priority (higher priority wins)
//! - Within a layer, undef-before-set clears the prior value first
//! - Last writer wins; overwriting a different value without an undef is
//!   reported as a redefinition (fatal in strict mode)
//! - Exclusion groups are validated once, after every layer is applied

mod exclusive;

pub use exclusive::ExclusionGroup;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::defaults::FlagDefaults;
use crate::flag::FlagValue;
use crate::layer::{Layer, LayerId};
use crate::resolved::{AppliedLayer, Diagnostic, Replaced, ResolvedConfiguration, ResolvedFlag};

/// A truthy member of a violated exclusion group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictingFlag {
    pub flag: String,
    pub layer: LayerId,
}

impl fmt::Display for ConflictingFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (from {})", self.flag, self.layer)
    }
}

fn join_conflicts(flags: &[ConflictingFlag]) -> String {
    flags
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolution errors. All are fatal: no configuration is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("priority {priority} is already used by layer '{existing}' (rejected layer '{rejected}')")]
    DuplicatePriority {
        priority: i32,
        existing: LayerId,
        rejected: LayerId,
    },

    #[error("conflicting assignment in exclusion group '{group}': {} are all set", join_conflicts(.flags))]
    ConflictingAssignment {
        group: String,
        flags: Vec<ConflictingFlag>,
    },

    #[error("flag '{flag}' redefined by layer '{layer}' ({previous} -> {value}) without undef; previous value from layer '{previous_layer}'")]
    Redefinition {
        flag: String,
        previous_layer: LayerId,
        previous: FlagValue,
        layer: LayerId,
        value: FlagValue,
    },
}

/// Resolution options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Treat redefinitions without undef-before-set as fatal
    #[serde(default)]
    pub strict: bool,
}

/// Collects layers, exclusion groups and defaults for one resolution session.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    layers: Vec<(i32, Layer)>,
    groups: Vec<ExclusionGroup>,
    defaults: FlagDefaults,
    options: ResolveOptions,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ResolveOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Queue a layer. Lower priorities are applied first.
    pub fn register_layer(&mut self, layer: Layer, priority: i32) -> Result<(), ResolveError> {
        if let Some((_, existing)) = self.layers.iter().find(|(p, _)| *p == priority) {
            return Err(ResolveError::DuplicatePriority {
                priority,
                existing: existing.id().clone(),
                rejected: layer.id().clone(),
            });
        }
        tracing::debug!(layer = %layer.id(), priority, "registered layer");
        self.layers.push((priority, layer));
        Ok(())
    }

    pub fn add_exclusion_group(&mut self, group: ExclusionGroup) {
        self.groups.push(group);
    }

    pub fn set_defaults(&mut self, defaults: FlagDefaults) {
        self.defaults = defaults;
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Resolve the registered layers.
    ///
    /// Does not consume the resolver; resolving twice yields equal results.
    pub fn resolve(&self) -> Result<ResolvedConfiguration, ResolveError> {
        resolve_with(&self.layers, &self.groups, self.defaults.clone(), self.options)
    }
}

/// Resolve an explicit `(priority, layer)` sequence with default options and
/// no fallback defaults.
pub fn resolve(
    layers: &[(i32, Layer)],
    groups: &[ExclusionGroup],
) -> Result<ResolvedConfiguration, ResolveError> {
    resolve_with(layers, groups, FlagDefaults::default(), ResolveOptions::default())
}

/// Full resolution entry point.
pub fn resolve_with(
    layers: &[(i32, Layer)],
    groups: &[ExclusionGroup],
    defaults: FlagDefaults,
    options: ResolveOptions,
) -> Result<ResolvedConfiguration, ResolveError> {
    check_priorities(layers)?;

    let mut ordered: Vec<&(i32, Layer)> = layers.iter().collect();
    ordered.sort_by_key(|(priority, _)| *priority);

    let mut flags: BTreeMap<String, ResolvedFlag> = BTreeMap::new();
    let mut diagnostics = Vec::new();
    let mut applied = Vec::with_capacity(ordered.len());

    for (priority, layer) in ordered {
        tracing::debug!(layer = %layer.id(), priority, assignments = layer.len(), "applying layer");
        apply_layer(layer, &mut flags, &mut diagnostics, options)?;
        applied.push(AppliedLayer {
            id: layer.id().clone(),
            priority: *priority,
        });
    }

    exclusive::validate(groups, &flags)?;

    Ok(ResolvedConfiguration::new(flags, applied, diagnostics, defaults))
}

/// Reject sequences where two layers share a priority, before any merging.
fn check_priorities(layers: &[(i32, Layer)]) -> Result<(), ResolveError> {
    let mut seen: BTreeMap<i32, &LayerId> = BTreeMap::new();
    for (priority, layer) in layers {
        if let Some(existing) = seen.insert(*priority, layer.id()) {
            return Err(ResolveError::DuplicatePriority {
                priority: *priority,
                existing: existing.clone(),
                rejected: layer.id().clone(),
            });
        }
    }
    Ok(())
}

fn apply_layer(
    layer: &Layer,
    flags: &mut BTreeMap<String, ResolvedFlag>,
    diagnostics: &mut Vec<Diagnostic>,
    options: ResolveOptions,
) -> Result<(), ResolveError> {
    for assignment in layer.assignments() {
        // A value-less assignment always clears, marker or not
        if assignment.undef_before_set || assignment.is_clear_only() {
            if let Some(cleared) = flags.remove(&assignment.name) {
                tracing::trace!(
                    flag = %assignment.name,
                    previous = %cleared.value,
                    previous_layer = %cleared.source,
                    layer = %layer.id(),
                    "cleared before set"
                );
            }
        }

        let Some(value) = &assignment.value else {
            continue;
        };

        match flags.get_mut(&assignment.name) {
            Some(existing) => {
                if existing.value != *value {
                    if options.strict {
                        return Err(ResolveError::Redefinition {
                            flag: assignment.name.clone(),
                            previous_layer: existing.source.clone(),
                            previous: existing.value.clone(),
                            layer: layer.id().clone(),
                            value: value.clone(),
                        });
                    }
                    tracing::warn!(
                        flag = %assignment.name,
                        previous = %existing.value,
                        value = %value,
                        previous_layer = %existing.source,
                        layer = %layer.id(),
                        "flag redefined without undef"
                    );
                    diagnostics.push(Diagnostic::Redefinition {
                        flag: assignment.name.clone(),
                        previous_layer: existing.source.clone(),
                        previous: existing.value.clone(),
                        layer: layer.id().clone(),
                        value: value.clone(),
                    });
                }
                existing.replaced.push(Replaced {
                    layer: existing.source.clone(),
                    value: existing.value.clone(),
                });
                existing.value = value.clone();
                existing.source = layer.id().clone();
                existing.detected = assignment.detected;
            }
            None => {
                flags.insert(
                    assignment.name.clone(),
                    ResolvedFlag {
                        value: value.clone(),
                        source: layer.id().clone(),
                        detected: assignment.detected,
                        replaced: Vec::new(),
                    },
                );
            }
        }
    }
    Ok(())
}
