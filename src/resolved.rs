//! Resolved configuration with full provenance
//!
//! The resolved configuration is the immutable result of a resolution
//! session: every present flag carries exactly one winning layer. Values are
//! read through [`ResolvedConfiguration::get`] and friends; reads never
//! mutate anything.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::defaults::FlagDefaults;
use crate::flag::FlagValue;
use crate::layer::LayerId;

/// Schema version for the JSON rendering
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "sitecfg/resolved_config@1";

/// A value this flag held before being overwritten without an undef
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replaced {
    pub layer: LayerId,
    pub value: FlagValue,
}

/// Final value of one flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFlag {
    pub value: FlagValue,

    /// Layer that set the winning value
    pub source: LayerId,

    /// Winning value came from host auto-detection
    pub detected: bool,

    /// Earlier values overwritten by plain assignment, oldest first.
    /// Emptied whenever an undef-before-set clears the flag.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub replaced: Vec<Replaced>,
}

/// A layer as it was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedLayer {
    pub id: LayerId,
    pub priority: i32,
}

/// Non-fatal resolution notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A flag was overwritten with a different value without undef-before-set
    Redefinition {
        flag: String,
        previous_layer: LayerId,
        previous: FlagValue,
        layer: LayerId,
        value: FlagValue,
    },
}

/// Read-time errors. Recoverable: callers pick a fallback or propagate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("unknown flag '{0}'")]
    UnknownFlag(String),

    #[error("flag '{flag}' is a {found}, expected {expected}")]
    TypeMismatch {
        flag: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Where a looked-up value came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "layer", rename_all = "snake_case")]
pub enum Origin {
    Layer(LayerId),
    Default,
}

/// Provenance of a single flag, as reported by `explain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub flag: String,
    pub value: FlagValue,
    pub origin: Origin,
    pub detected: bool,
    pub replaced: Vec<Replaced>,
}

impl Explanation {
    /// Human-readable rendering
    pub fn to_human(&self) -> String {
        let mut out = format!("{} = {}", self.flag, self.value);
        match &self.origin {
            Origin::Layer(layer) if self.detected => {
                out.push_str(&format!("\n  set by: {} (auto-detected)", layer))
            }
            Origin::Layer(layer) => out.push_str(&format!("\n  set by: {}", layer)),
            Origin::Default => out.push_str("\n  set by: documented default"),
        }
        for replaced in &self.replaced {
            out.push_str(&format!(
                "\n  overrides: {} from {}",
                replaced.value, replaced.layer
            ));
        }
        out
    }
}

/// Immutable mapping from flag name to final value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfiguration {
    flags: BTreeMap<String, ResolvedFlag>,
    layers: Vec<AppliedLayer>,
    diagnostics: Vec<Diagnostic>,
    defaults: FlagDefaults,
}

/// Canonical content covered by the digest
#[derive(Serialize)]
struct DigestInput<'a> {
    flags: &'a BTreeMap<String, ResolvedFlag>,
    layers: &'a [AppliedLayer],
}

/// JSON rendering
#[derive(Serialize)]
struct Report<'a> {
    schema_version: u32,
    schema_id: &'static str,
    digest: String,
    layers: &'a [AppliedLayer],
    flags: &'a BTreeMap<String, ResolvedFlag>,
    #[serde(skip_serializing_if = "no_diagnostics")]
    diagnostics: &'a [Diagnostic],
}

fn no_diagnostics(diagnostics: &&[Diagnostic]) -> bool {
    diagnostics.is_empty()
}

impl ResolvedConfiguration {
    pub(crate) fn new(
        flags: BTreeMap<String, ResolvedFlag>,
        layers: Vec<AppliedLayer>,
        diagnostics: Vec<Diagnostic>,
        defaults: FlagDefaults,
    ) -> Self {
        Self {
            flags,
            layers,
            diagnostics,
            defaults,
        }
    }

    /// Wrap for sharing across threads and subsystems.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Look up a flag, falling back to the documented default.
    pub fn get(&self, name: &str) -> Result<&FlagValue, LookupError> {
        self.flags
            .get(name)
            .map(|f| &f.value)
            .or_else(|| self.defaults.get(name))
            .ok_or_else(|| LookupError::UnknownFlag(name.to_string()))
    }

    /// Look up a flag, returning `fallback` when it is unknown.
    pub fn get_or(&self, name: &str, fallback: FlagValue) -> FlagValue {
        self.get(name).cloned().unwrap_or(fallback)
    }

    /// Boolean view. Integers follow the C convention (nonzero is true).
    pub fn get_bool(&self, name: &str) -> Result<bool, LookupError> {
        match self.get(name)? {
            FlagValue::Bool(b) => Ok(*b),
            FlagValue::Int(i) => Ok(*i != 0),
            other => Err(mismatch(name, "bool", other)),
        }
    }

    /// Integer view. Booleans map to 0/1.
    pub fn get_int(&self, name: &str) -> Result<i64, LookupError> {
        match self.get(name)? {
            FlagValue::Int(i) => Ok(*i),
            FlagValue::Bool(b) => Ok(i64::from(*b)),
            other => Err(mismatch(name, "int", other)),
        }
    }

    pub fn get_symbol(&self, name: &str) -> Result<&str, LookupError> {
        match self.get(name)? {
            FlagValue::Symbol(s) => Ok(s.as_str()),
            other => Err(mismatch(name, "symbol", other)),
        }
    }

    /// Truthiness of any value, as `#if NAME` would see it.
    pub fn is_enabled(&self, name: &str) -> Result<bool, LookupError> {
        self.get(name).map(FlagValue::is_truthy)
    }

    /// Whether a layer set this flag (defaults do not count).
    pub fn contains(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    pub fn flag(&self, name: &str) -> Option<&ResolvedFlag> {
        self.flags.get(name)
    }

    /// Winning layer for a flag set by a layer.
    pub fn source_of(&self, name: &str) -> Option<&LayerId> {
        self.flags.get(name).map(|f| &f.source)
    }

    /// Every flag set by a layer, sorted by name.
    pub fn flags(&self) -> impl Iterator<Item = (&str, &ResolvedFlag)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Layers in application order
    pub fn layers(&self) -> &[AppliedLayer] {
        &self.layers
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn defaults(&self) -> &FlagDefaults {
        &self.defaults
    }

    /// Report where a flag's value comes from.
    pub fn explain(&self, name: &str) -> Result<Explanation, LookupError> {
        if let Some(flag) = self.flags.get(name) {
            return Ok(Explanation {
                flag: name.to_string(),
                value: flag.value.clone(),
                origin: Origin::Layer(flag.source.clone()),
                detected: flag.detected,
                replaced: flag.replaced.clone(),
            });
        }

        self.defaults
            .get(name)
            .map(|value| Explanation {
                flag: name.to_string(),
                value: value.clone(),
                origin: Origin::Default,
                detected: false,
                replaced: Vec::new(),
            })
            .ok_or_else(|| LookupError::UnknownFlag(name.to_string()))
    }

    /// SHA-256 hex digest of the RFC 8785 (JCS) form of flags and layers.
    ///
    /// Equal inputs always produce equal digests.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let jcs_bytes = serde_json_canonicalizer::to_vec(&DigestInput {
            flags: &self.flags,
            layers: &self.layers,
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&jcs_bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Serialize to JSON (pretty printed)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Report {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID,
            digest: self.digest()?,
            layers: &self.layers,
            flags: &self.flags,
            diagnostics: &self.diagnostics,
        })
    }

    /// Write JSON to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }

    /// Render as a C header, one `#define` per flag, sorted by name.
    pub fn to_header(&self, guard: &str) -> String {
        let applied: Vec<String> = self
            .layers
            .iter()
            .map(|l| format!("{} ({})", l.id, l.priority))
            .collect();

        let mut out = String::new();
        out.push_str("/* Generated by sitecfg. Do not edit.\n");
        out.push_str(&format!(" * Layers: {}\n */\n", applied.join(", ")));
        out.push_str(&format!("#ifndef {}\n#define {}\n\n", guard, guard));
        for (name, flag) in &self.flags {
            out.push_str(&format!(
                "#define {} {} /* {} */\n",
                name,
                flag.value.to_c_literal(),
                flag.source
            ));
        }
        out.push_str(&format!("\n#endif /* {} */\n", guard));
        out
    }
}

fn mismatch(flag: &str, expected: &'static str, found: &FlagValue) -> LookupError {
    LookupError::TypeMismatch {
        flag: flag.to_string(),
        expected,
        found: found.kind(),
    }
}
