//! sitecfg - layered compile-time configuration resolver
//!
//! Merges a base configuration layer with priority-ordered platform override
//! layers into one immutable set of capability flags (endianness, CPU
//! architecture, codec and TLS backends, protocol toggles). Override layers
//! can redefine, clear or extend base flags; contradictory results such as
//! both endianness flags being set fail resolution.

pub mod builtin;
pub mod capabilities;
pub mod defaults;
pub mod detect;
pub mod flag;
pub mod layer;
pub mod manifest;
pub mod resolved;
pub mod resolver;

pub use capabilities::{Capabilities, TlsBackend};
pub use defaults::FlagDefaults;
pub use flag::FlagValue;
pub use layer::{Assignment, Layer, LayerError, LayerId};
pub use manifest::{LayerEntry, Manifest, ManifestError};
pub use resolved::{Explanation, LookupError, Origin, ResolvedConfiguration};
pub use resolver::{resolve, ExclusionGroup, ResolveError, ResolveOptions, Resolver};
