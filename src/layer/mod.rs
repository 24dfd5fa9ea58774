//! Configuration layers
//!
//! A layer is a named, ordered set of flag assignments. Layers can be built
//! in code, lexed from a `#define`/`#undef` header, or read from a TOML table.

mod directives;
mod toml_layer;

pub use directives::from_directives;
pub use toml_layer::from_toml_str;
pub(crate) use toml_layer::toml_to_flag;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sitecfg_directives::DirectiveError;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::flag::{is_valid_name, FlagValue};

/// Identity of a layer, e.g. `"sample"` or `"platform-override"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One flag assignment inside a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: String,

    /// New value; `None` clears the flag without redefining it
    pub value: Option<FlagValue>,

    /// Clear any prior value before assigning (`#undef` then `#define`)
    pub undef_before_set: bool,

    /// Value came from host auto-detection rather than a declaration
    pub detected: bool,
}

impl Assignment {
    /// Plain assignment (last writer wins).
    pub fn set(name: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            undef_before_set: false,
            detected: false,
        }
    }

    /// Clear a flag without setting a new value.
    pub fn undef(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            undef_before_set: true,
            detected: false,
        }
    }

    /// Mark this assignment as undef-before-set.
    pub fn undef_first(mut self) -> Self {
        self.undef_before_set = true;
        self
    }

    /// Mark this assignment as auto-detected.
    pub fn detected(mut self) -> Self {
        self.detected = true;
        self
    }

    pub fn is_clear_only(&self) -> bool {
        self.value.is_none()
    }
}

/// Layer construction errors
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("layer '{layer}': invalid flag name '{name}'")]
    InvalidName { layer: LayerId, name: String },

    #[error("layer '{layer}': flag '{name}' is assigned more than once")]
    DuplicateAssignment { layer: LayerId, name: String },

    #[error("layer '{layer}': flag '{name}' has unsupported value: {reason}")]
    InvalidValue {
        layer: LayerId,
        name: String,
        reason: String,
    },

    #[error("layer '{layer}': {source}")]
    Directive {
        layer: LayerId,
        #[source]
        source: DirectiveError,
    },

    #[error("layer '{layer}': TOML parse error: {message}")]
    Toml { layer: LayerId, message: String },

    #[error("failed to read layer file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported layer file extension: {0} (expected .h or .toml)")]
    UnknownFormat(PathBuf),
}

/// A named, ordered set of flag assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLayer")]
pub struct Layer {
    id: LayerId,
    assignments: Vec<Assignment>,
}

/// Unchecked wire form; deserialization goes through [`Layer::from_assignments`].
#[derive(Deserialize)]
struct RawLayer {
    id: LayerId,
    assignments: Vec<Assignment>,
}

impl TryFrom<RawLayer> for Layer {
    type Error = LayerError;

    fn try_from(raw: RawLayer) -> Result<Self, Self::Error> {
        Layer::from_assignments(raw.id, raw.assignments)
    }
}

impl Layer {
    /// Create an empty layer.
    pub fn new(id: impl Into<LayerId>) -> Self {
        Self {
            id: id.into(),
            assignments: Vec::new(),
        }
    }

    /// Build a layer from a sequence of assignments.
    pub fn from_assignments(
        id: impl Into<LayerId>,
        assignments: impl IntoIterator<Item = Assignment>,
    ) -> Result<Self, LayerError> {
        let mut layer = Self::new(id);
        for assignment in assignments {
            layer.push(assignment)?;
        }
        Ok(layer)
    }

    /// Append an assignment. Each flag may be assigned once per layer.
    pub fn push(&mut self, assignment: Assignment) -> Result<(), LayerError> {
        if !is_valid_name(&assignment.name) {
            return Err(LayerError::InvalidName {
                layer: self.id.clone(),
                name: assignment.name,
            });
        }
        if self.assignments.iter().any(|a| a.name == assignment.name) {
            return Err(LayerError::DuplicateAssignment {
                layer: self.id.clone(),
                name: assignment.name,
            });
        }
        self.assignments.push(assignment);
        Ok(())
    }

    /// Builder form of [`Layer::push`].
    pub fn with(mut self, assignment: Assignment) -> Result<Self, LayerError> {
        self.push(assignment)?;
        Ok(self)
    }

    pub fn id(&self) -> &LayerId {
        &self.id
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Look up this layer's assignment for `name`.
    pub fn assignment(&self, name: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.name == name)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub(crate) fn renamed(mut self, id: impl Into<LayerId>) -> Self {
        self.id = id.into();
        self
    }

    pub(crate) fn check_unique(names: &[&str]) -> Option<String> {
        let mut seen = HashSet::new();
        names
            .iter()
            .find(|n| !seen.insert(**n))
            .map(|n| n.to_string())
    }
}

/// Where a file-backed layer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSource {
    pub path: String,

    /// SHA-256 of the raw file bytes
    pub digest: String,
}

/// A layer read from disk, with provenance.
#[derive(Debug, Clone)]
pub struct LoadedLayer {
    pub layer: Layer,
    pub source: LayerSource,
}

/// Load a layer file, choosing the format by extension.
///
/// `name` overrides the layer id; otherwise a TOML layer's own `name` is
/// used, falling back to the file stem.
pub fn load_file(path: &Path, name: Option<&str>) -> Result<LoadedLayer, LayerError> {
    let bytes = fs::read(path).map_err(|source| LayerError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    let id = LayerId::new(name.map(str::to_string).unwrap_or(stem));

    let text = String::from_utf8(bytes).map_err(|e| LayerError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    let layer = match extension.as_deref() {
        Some("h") | Some("hpp") => {
            let file = sitecfg_directives::parse(&text).map_err(|source| {
                LayerError::Directive {
                    layer: id.clone(),
                    source,
                }
            })?;
            from_directives(id, &file)?
        }
        Some("toml") => {
            let layer = from_toml_str(id, &text)?;
            match name {
                Some(explicit) => layer.renamed(explicit),
                None => layer,
            }
        }
        _ => return Err(LayerError::UnknownFormat(path.to_path_buf())),
    };

    tracing::debug!(
        layer = %layer.id(),
        path = %path.display(),
        assignments = layer.len(),
        "loaded layer file"
    );

    Ok(LoadedLayer {
        layer,
        source: LayerSource {
            path: path.to_string_lossy().to_string(),
            digest,
        },
    })
}
