//! Resolution manifest (sitecfg.toml)
//!
//! Lists the layers of a resolution session with their priorities, plus
//! exclusion groups, fallback defaults and options:
//!
//! ```toml
//! [[layer]]
//! name = "sample"
//! priority = 0
//! path = "config_site_sample.h"
//!
//! [[layer]]
//! priority = 100
//! builtin = "ios"
//!
//! [[exclusive]]
//! name = "video-backend"
//! flags = ["PJMEDIA_HAS_VID_TOOLBOX_CODEC", "PJMEDIA_HAS_FFMPEG_VID_CODEC"]
//!
//! [defaults]
//! PJ_HAS_IPV6 = 0
//!
//! [options]
//! strict = false
//! ```
//!
//! Layer paths are relative to the manifest's directory.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::builtin;
use crate::defaults::FlagDefaults;
use crate::flag::is_valid_name;
use crate::layer::{self, toml_to_flag, Layer, LayerError, LayerId};
use crate::resolved::ResolvedConfiguration;
use crate::resolver::{ExclusionGroup, ResolveError, ResolveOptions, Resolver};

/// Manifest errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// One `[[layer]]` entry. Exactly one of `path`, `detect` and `builtin` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerEntry {
    /// Layer id override
    pub name: Option<String>,

    pub priority: i32,

    /// `.h` or `.toml` layer file
    pub path: Option<PathBuf>,

    /// Use the auto-detected host layer
    #[serde(default)]
    pub detect: bool,

    /// Name of a built-in layer
    pub builtin: Option<String>,
}

impl LayerEntry {
    pub fn file(priority: i32, path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            priority,
            path: Some(path.into()),
            detect: false,
            builtin: None,
        }
    }

    pub fn builtin(priority: i32, name: impl Into<String>) -> Self {
        Self {
            name: None,
            priority,
            path: None,
            detect: false,
            builtin: Some(name.into()),
        }
    }

    pub fn detected(priority: i32) -> Self {
        Self {
            name: None,
            priority,
            path: None,
            detect: true,
            builtin: None,
        }
    }

    fn source_count(&self) -> usize {
        usize::from(self.path.is_some()) + usize::from(self.detect) + usize::from(self.builtin.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestOptions {
    /// Redefinition without undef-before-set is fatal
    #[serde(default)]
    pub strict: bool,

    /// Add the built-in endianness and cpu-arch exclusion groups
    #[serde(default = "default_true")]
    pub builtin_groups: bool,

    /// Start from the library's documented defaults
    #[serde(default = "default_true")]
    pub builtin_defaults: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            strict: false,
            builtin_groups: true,
            builtin_defaults: true,
        }
    }
}

/// Origin of a layer in a loaded manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
    File,
    Detected,
    Builtin,
}

/// A contributing layer with provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSource {
    pub layer: LayerId,
    pub priority: i32,
    pub origin: SourceOrigin,

    /// File path (None for detected/builtin)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for detected/builtin)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// A manifest turned into a ready-to-run resolver
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub resolver: Resolver,
    pub sources: Vec<ConfigSource>,

    /// SHA-256 of the manifest file itself, when read from disk
    pub manifest_digest: Option<String>,
}

impl LoadedManifest {
    pub fn resolve(&self) -> Result<ResolvedConfiguration, ResolveError> {
        self.resolver.resolve()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, rename = "layer")]
    pub layers: Vec<LayerEntry>,

    #[serde(default)]
    pub exclusive: Vec<ExclusionGroup>,

    #[serde(default)]
    pub defaults: toml::Table,

    #[serde(default)]
    pub options: ManifestOptions,
}

impl Manifest {
    /// Parse a manifest from a TOML string
    pub fn from_str(s: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(s)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read and parse a manifest file, returning it with the SHA-256 of its bytes.
    pub fn read(path: &Path) -> Result<(Self, String), ManifestError> {
        let bytes = fs::read(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let text = String::from_utf8(bytes)
            .map_err(|e| ManifestError::Validation(format!("manifest is not UTF-8: {}", e)))?;
        Ok((Self::from_str(&text)?, digest))
    }

    /// Read a manifest file and load its layers relative to its directory.
    pub fn load(path: &Path) -> Result<LoadedManifest, ManifestError> {
        let (manifest, digest) = Self::read(path)?;
        let mut loaded = manifest.into_loaded(base_dir_of(path))?;
        loaded.manifest_digest = Some(digest);
        Ok(loaded)
    }

    /// Validate structure that serde cannot express
    pub fn validate(&self) -> Result<(), ManifestError> {
        for entry in &self.layers {
            if entry.source_count() != 1 {
                return Err(ManifestError::Validation(format!(
                    "layer at priority {} must set exactly one of 'path', 'detect' or 'builtin'",
                    entry.priority
                )));
            }
            if let Some(name) = &entry.builtin {
                if !builtin::LAYER_NAMES.contains(&name.as_str()) {
                    return Err(ManifestError::Validation(format!(
                        "unknown builtin layer '{}' (expected one of: {})",
                        name,
                        builtin::LAYER_NAMES.join(", ")
                    )));
                }
            }
        }

        for group in &self.exclusive {
            if group.flags.len() < 2 {
                return Err(ManifestError::Validation(format!(
                    "exclusion group '{}' needs at least two flags",
                    group.name
                )));
            }
            if let Some(bad) = group.flags.iter().find(|f| !is_valid_name(f)) {
                return Err(ManifestError::Validation(format!(
                    "exclusion group '{}': invalid flag name '{}'",
                    group.name, bad
                )));
            }
            let members: Vec<&str> = group.flags.iter().map(String::as_str).collect();
            if let Some(repeated) = Layer::check_unique(&members) {
                return Err(ManifestError::Validation(format!(
                    "exclusion group '{}' lists '{}' more than once",
                    group.name, repeated
                )));
            }
        }

        for (name, value) in &self.defaults {
            if !is_valid_name(name) {
                return Err(ManifestError::Validation(format!(
                    "invalid default flag name '{}'",
                    name
                )));
            }
            toml_to_flag(value).map_err(|reason| {
                ManifestError::Validation(format!("default for '{}': {}", name, reason))
            })?;
        }

        Ok(())
    }

    /// Fallback defaults: documented library defaults (if enabled) overlaid
    /// with the manifest's own `[defaults]`.
    pub fn flag_defaults(&self) -> Result<FlagDefaults, ManifestError> {
        let mut defaults = if self.options.builtin_defaults {
            builtin::documented_defaults()
        } else {
            FlagDefaults::new()
        };
        for (name, value) in &self.defaults {
            let value = toml_to_flag(value).map_err(|reason| {
                ManifestError::Validation(format!("default for '{}': {}", name, reason))
            })?;
            defaults.insert(name.clone(), value);
        }
        Ok(defaults)
    }

    /// Load every layer and register it with a fresh resolver.
    pub fn into_loaded(&self, base_dir: &Path) -> Result<LoadedManifest, ManifestError> {
        let mut resolver = Resolver::with_options(ResolveOptions {
            strict: self.options.strict,
        });
        let mut sources = Vec::with_capacity(self.layers.len());

        for entry in &self.layers {
            let (layer, source) = load_entry(entry, base_dir)?;
            tracing::debug!(
                layer = %layer.id(),
                priority = entry.priority,
                origin = ?source.origin,
                "manifest layer loaded"
            );
            resolver.register_layer(layer, entry.priority)?;
            sources.push(source);
        }

        if self.options.builtin_groups {
            for group in builtin::exclusion_groups() {
                resolver.add_exclusion_group(group);
            }
        }
        for group in &self.exclusive {
            resolver.add_exclusion_group(group.clone());
        }

        resolver.set_defaults(self.flag_defaults()?);

        Ok(LoadedManifest {
            resolver,
            sources,
            manifest_digest: None,
        })
    }
}

/// Directory that relative layer paths in a manifest are resolved against.
pub fn base_dir_of(manifest_path: &Path) -> &Path {
    manifest_path.parent().unwrap_or_else(|| Path::new("."))
}

fn load_entry(entry: &LayerEntry, base_dir: &Path) -> Result<(Layer, ConfigSource), ManifestError> {
    let name = entry.name.as_deref();

    if let Some(path) = &entry.path {
        let full = base_dir.join(path);
        let loaded = layer::load_file(&full, name)?;
        let source = ConfigSource {
            layer: loaded.layer.id().clone(),
            priority: entry.priority,
            origin: SourceOrigin::File,
            path: Some(loaded.source.path),
            digest: Some(loaded.source.digest),
        };
        return Ok((loaded.layer, source));
    }

    let (layer, origin) = if entry.detect {
        (crate::detect::host_layer()?, SourceOrigin::Detected)
    } else {
        let builtin_name = entry.builtin.as_deref().unwrap_or_default();
        let layer = builtin::layer(builtin_name).ok_or_else(|| {
            ManifestError::Validation(format!("unknown builtin layer '{}'", builtin_name))
        })??;
        (layer, SourceOrigin::Builtin)
    };

    let layer = match name {
        Some(name) => layer.renamed(name),
        None => layer,
    };
    let source = ConfigSource {
        layer: layer.id().clone(),
        priority: entry.priority,
        origin,
        path: None,
        digest: None,
    };
    Ok((layer, source))
}
