//! TOML layer format
//!
//! ```toml
//! name = "ios"                                  # optional
//! undef = ["PJ_IS_LITTLE_ENDIAN", "PJ_HAS_IPV6"]
//!
//! [set]
//! PJ_IS_LITTLE_ENDIAN = true
//! PJ_SSL_SOCK_IMP = "PJ_SSL_SOCK_IMP_APPLE"
//! ```
//!
//! Names listed in `undef` that are also in `[set]` become undef-before-set;
//! the rest are cleared without a new value.

use serde::Deserialize;

use super::{Assignment, Layer, LayerError, LayerId};
use crate::flag::FlagValue;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlLayer {
    name: Option<String>,

    #[serde(default)]
    undef: Vec<String>,

    #[serde(default)]
    set: toml::Table,
}

/// Parse a TOML layer. `default_id` is used when the document has no `name`.
pub fn from_toml_str(default_id: impl Into<LayerId>, text: &str) -> Result<Layer, LayerError> {
    let default_id = default_id.into();
    let parsed: TomlLayer = toml::from_str(text).map_err(|e| LayerError::Toml {
        layer: default_id.clone(),
        message: e.to_string(),
    })?;

    let id = parsed.name.map(LayerId::new).unwrap_or(default_id);

    let undef_names: Vec<&str> = parsed.undef.iter().map(String::as_str).collect();
    if let Some(name) = Layer::check_unique(&undef_names) {
        return Err(LayerError::DuplicateAssignment { layer: id, name });
    }

    let mut layer = Layer::new(id);

    // Clear-only entries first, in declaration order
    for name in &parsed.undef {
        if !parsed.set.contains_key(name) {
            layer.push(Assignment::undef(name.clone()))?;
        }
    }

    for (name, raw) in parsed.set {
        let value = toml_to_flag(&raw).map_err(|reason| LayerError::InvalidValue {
            layer: layer.id().clone(),
            name: name.clone(),
            reason,
        })?;
        let mut assignment = Assignment::set(name, value);
        if parsed.undef.contains(&assignment.name) {
            assignment = assignment.undef_first();
        }
        layer.push(assignment)?;
    }

    Ok(layer)
}

/// Convert a TOML scalar into a flag value
pub(crate) fn toml_to_flag(value: &toml::Value) -> Result<FlagValue, String> {
    match value {
        toml::Value::Boolean(b) => Ok(FlagValue::Bool(*b)),
        toml::Value::Integer(i) => Ok(FlagValue::Int(*i)),
        toml::Value::String(s) if crate::flag::is_valid_name(s) => Ok(FlagValue::Symbol(s.clone())),
        toml::Value::String(s) => Err(format!("symbol '{}' is not an identifier", s)),
        other => Err(format!("{} values are not supported", other.type_str())),
    }
}
