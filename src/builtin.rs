//! Built-in layers, exclusion groups and documented defaults

use crate::defaults::FlagDefaults;
use crate::detect;
use crate::layer::{Assignment, Layer, LayerError};
use crate::resolver::ExclusionGroup;

/// Id of the built-in iOS platform override layer
pub const IOS_LAYER: &str = "ios";

/// CPU architecture flags; at most one may be set.
pub const CPU_ARCH_FLAGS: &[&str] = &[
    "PJ_M_I386",
    "PJ_M_X86_64",
    "PJ_M_IA64",
    "PJ_M_ARM",
    "PJ_M_ARMV4",
    "PJ_M_ARM64",
    "PJ_M_MIPS",
    "PJ_M_POWERPC",
    "PJ_M_SPARC",
];

/// Names accepted by [`layer`].
pub const LAYER_NAMES: &[&str] = &[detect::HOST_LAYER, IOS_LAYER];

/// Endianness and CPU architecture groups.
pub fn exclusion_groups() -> Vec<ExclusionGroup> {
    vec![
        ExclusionGroup::new("endianness", [detect::LITTLE_ENDIAN, detect::BIG_ENDIAN]),
        ExclusionGroup::new("cpu-arch", CPU_ARCH_FLAGS.iter().copied()),
    ]
}

/// iOS platform override.
///
/// All iOS devices are little-endian, so both endianness flags are forced
/// with undef-before-set rather than trusting detection.
pub fn ios_override_layer() -> Result<Layer, LayerError> {
    Layer::from_assignments(
        IOS_LAYER,
        [
            Assignment::set(detect::LITTLE_ENDIAN, 1).undef_first(),
            Assignment::set(detect::BIG_ENDIAN, 0).undef_first(),
            Assignment::set("PJ_CONFIG_IPHONE", 1),
            Assignment::set("PJMEDIA_HAS_VIDEO", 1),
            Assignment::set("PJMEDIA_HAS_VID_TOOLBOX_CODEC", 1),
            Assignment::set("PJ_HAS_SSL_SOCK", 1),
            Assignment::set("PJ_SSL_SOCK_IMP", "PJ_SSL_SOCK_IMP_APPLE"),
            Assignment::set("PJ_OS_HAS_CHECK_STACK", 0),
            Assignment::set("PJSIP_DONT_SWITCH_TO_TCP", 1),
            Assignment::set("PJ_M_ARM", 1),
        ],
    )
}

/// Look up a built-in layer by name.
pub fn layer(name: &str) -> Option<Result<Layer, LayerError>> {
    match name {
        detect::HOST_LAYER => Some(detect::host_layer()),
        IOS_LAYER => Some(ios_override_layer()),
        _ => None,
    }
}

/// Library defaults applied when no layer sets a flag.
pub fn documented_defaults() -> FlagDefaults {
    FlagDefaults::new()
        .with("PJ_CONFIG_IPHONE", 0)
        .with("PJMEDIA_HAS_VIDEO", 0)
        .with("PJMEDIA_HAS_VID_TOOLBOX_CODEC", 0)
        .with("PJ_HAS_SSL_SOCK", 0)
        .with("PJ_SSL_SOCK_IMP", "PJ_SSL_SOCK_IMP_OPENSSL")
        .with("PJ_OS_HAS_CHECK_STACK", 0)
        .with("PJSIP_DONT_SWITCH_TO_TCP", 0)
}
