//! Host auto-detection layer
//!
//! Stands in for the macro checks a base config uses to guess endianness and
//! CPU architecture. Values come from the target this crate is compiled for
//! and are marked as detected so provenance output can tell them apart.

use crate::layer::{Assignment, Layer, LayerError};

/// Id of the detected layer
pub const HOST_LAYER: &str = "host-detect";

pub const LITTLE_ENDIAN: &str = "PJ_IS_LITTLE_ENDIAN";
pub const BIG_ENDIAN: &str = "PJ_IS_BIG_ENDIAN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Endianness of the compilation target.
pub fn host_endianness() -> Endianness {
    if cfg!(target_endian = "big") {
        Endianness::Big
    } else {
        Endianness::Little
    }
}

/// `PJ_M_*` flag matching the compilation target, if it is one we know.
pub fn host_arch_flag() -> Option<&'static str> {
    let flag = if cfg!(target_arch = "x86_64") {
        "PJ_M_X86_64"
    } else if cfg!(target_arch = "x86") {
        "PJ_M_I386"
    } else if cfg!(target_arch = "aarch64") {
        "PJ_M_ARM64"
    } else if cfg!(target_arch = "arm") {
        "PJ_M_ARMV4"
    } else if cfg!(any(target_arch = "powerpc", target_arch = "powerpc64")) {
        "PJ_M_POWERPC"
    } else if cfg!(any(target_arch = "mips", target_arch = "mips64")) {
        "PJ_M_MIPS"
    } else if cfg!(any(target_arch = "sparc", target_arch = "sparc64")) {
        "PJ_M_SPARC"
    } else {
        return None;
    };
    Some(flag)
}

/// Build the detected host layer.
pub fn host_layer() -> Result<Layer, LayerError> {
    let little = host_endianness() == Endianness::Little;

    let mut layer = Layer::new(HOST_LAYER);
    layer.push(Assignment::set(LITTLE_ENDIAN, little).detected())?;
    layer.push(Assignment::set(BIG_ENDIAN, !little).detected())?;

    match host_arch_flag() {
        Some(arch) => layer.push(Assignment::set(arch, true).detected())?,
        None => tracing::debug!("host architecture not recognized; no PJ_M_* flag detected"),
    }

    Ok(layer)
}
