//! Shared fixtures for integration tests
//!
//! `site/` holds an iOS platform override header, the generic sample header
//! it is layered over, and a manifest tying them together.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use sitecfg::{Assignment, Layer};

/// Directory with the header and manifest fixtures
pub fn site_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/site")
}

pub fn site_header_path() -> PathBuf {
    site_dir().join("config_site.h")
}

pub fn sample_header_path() -> PathBuf {
    site_dir().join("config_site_sample.h")
}

pub fn manifest_path() -> PathBuf {
    site_dir().join("sitecfg.toml")
}

pub fn broken_override_path() -> PathBuf {
    site_dir().join("big_endian.toml")
}

/// Base layer whose endianness flags came from auto-detection
pub fn detected_base() -> Layer {
    Layer::from_assignments(
        "base",
        [
            Assignment::set("PJ_IS_LITTLE_ENDIAN", true).detected(),
            Assignment::set("PJ_IS_BIG_ENDIAN", false).detected(),
            Assignment::set("PJ_HAS_IPV6", 1),
        ],
    )
    .expect("valid base layer")
}

/// Override forcing little-endian with undef-before-set on both flags
pub fn forced_little_endian() -> Layer {
    Layer::from_assignments(
        "platform-override",
        [
            Assignment::set("PJ_IS_LITTLE_ENDIAN", true).undef_first(),
            Assignment::set("PJ_IS_BIG_ENDIAN", false).undef_first(),
        ],
    )
    .expect("valid override layer")
}
