//! Manifest-driven resolution sessions

mod fixtures;

use std::fs;

use sitecfg::manifest::{base_dir_of, LayerEntry, SourceOrigin};
use sitecfg::{FlagValue, Manifest, ManifestError, Origin, ResolveError};

#[test]
fn test_load_fixture_manifest() {
    let loaded = Manifest::load(&fixtures::manifest_path()).unwrap();

    assert_eq!(loaded.sources.len(), 2);
    assert!(loaded
        .sources
        .iter()
        .all(|s| s.origin == SourceOrigin::File && s.digest.is_some()));
    assert_eq!(loaded.manifest_digest.as_ref().map(String::len), Some(64));

    let config = loaded.resolve().unwrap();
    assert_eq!(config.source_of("PJ_CONFIG_IPHONE").unwrap().as_str(), "ios");
    assert_eq!(config.layers().len(), 2);
    assert_eq!(config.layers()[0].id.as_str(), "sample");
}

#[test]
fn test_manifest_defaults_answer_lookups() {
    let config = Manifest::load(&fixtures::manifest_path())
        .unwrap()
        .resolve()
        .unwrap();

    // From [defaults]
    assert_eq!(config.get("PJ_HAS_TCP"), Ok(&FlagValue::Int(1)));
    // Documented library default
    assert_eq!(config.get_int("PJ_OS_HAS_CHECK_STACK"), Ok(0));

    let explanation = config.explain("PJ_HAS_TCP").unwrap();
    assert_eq!(explanation.origin, Origin::Default);
    assert!(!config.flags().any(|(name, _)| name == "PJ_HAS_TCP"));
}

#[test]
fn test_defaults_do_not_change_digest() {
    let with_defaults = Manifest::load(&fixtures::manifest_path())
        .unwrap()
        .resolve()
        .unwrap();

    let (mut manifest, _) = Manifest::read(&fixtures::manifest_path()).unwrap();
    manifest.defaults.clear();
    manifest.options.builtin_defaults = false;
    let without = manifest
        .into_loaded(base_dir_of(&fixtures::manifest_path()))
        .unwrap()
        .resolve()
        .unwrap();

    assert_eq!(with_defaults.digest().unwrap(), without.digest().unwrap());
}

#[test]
fn test_override_above_site_breaks_endianness() {
    let (mut manifest, _) = Manifest::read(&fixtures::manifest_path()).unwrap();
    manifest
        .layers
        .push(LayerEntry::file(20, fixtures::broken_override_path()));

    let loaded = manifest
        .into_loaded(base_dir_of(&fixtures::manifest_path()))
        .unwrap();
    assert_eq!(loaded.sources[2].layer.as_str(), "broken-override");

    match loaded.resolve().unwrap_err() {
        ResolveError::ConflictingAssignment { group, flags } => {
            assert_eq!(group, "endianness");
            assert_eq!(flags[0].layer.as_str(), "ios");
            assert_eq!(flags[1].layer.as_str(), "broken-override");
        }
        other => panic!("expected ConflictingAssignment, got {:?}", other),
    }
}

#[test]
fn test_override_below_site_is_cleared() {
    // The site header forces both endianness flags, so a lower layer's
    // mistake is undone
    let (mut manifest, _) = Manifest::read(&fixtures::manifest_path()).unwrap();
    manifest
        .layers
        .push(LayerEntry::file(5, fixtures::broken_override_path()));

    let config = manifest
        .into_loaded(base_dir_of(&fixtures::manifest_path()))
        .unwrap()
        .resolve()
        .unwrap();
    assert!(!config.is_enabled("PJ_IS_BIG_ENDIAN").unwrap());
    assert!(config.flag("PJ_IS_BIG_ENDIAN").unwrap().replaced.is_empty());
}

#[test]
fn test_duplicate_priority_in_manifest() {
    let (mut manifest, _) = Manifest::read(&fixtures::manifest_path()).unwrap();
    manifest.layers.push(LayerEntry::builtin(10, "ios"));

    let err = manifest
        .into_loaded(base_dir_of(&fixtures::manifest_path()))
        .unwrap_err();
    assert!(matches!(
        err,
        ManifestError::Resolve(ResolveError::DuplicatePriority { priority: 10, .. })
    ));
}

#[test]
fn test_manifest_with_builtin_and_toml_layers() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("sample.toml"),
        r#"
[set]
PJ_IS_LITTLE_ENDIAN = true
PJ_IS_BIG_ENDIAN = false
PJ_HAS_SSL_SOCK = 1
PJ_SSL_SOCK_IMP = "PJ_SSL_SOCK_IMP_GNUTLS"
"#,
    )
    .unwrap();
    let manifest_path = dir.path().join("sitecfg.toml");
    fs::write(
        &manifest_path,
        r#"
[[layer]]
name = "sample"
priority = 0
path = "sample.toml"

[[layer]]
priority = 100
builtin = "ios"

[options]
strict = false
"#,
    )
    .unwrap();

    let loaded = Manifest::load(&manifest_path).unwrap();
    assert_eq!(loaded.sources[1].origin, SourceOrigin::Builtin);

    let config = loaded.resolve().unwrap();
    assert_eq!(
        config.get_symbol("PJ_SSL_SOCK_IMP"),
        Ok("PJ_SSL_SOCK_IMP_APPLE")
    );
    // Undef-before-set replaces the TOML booleans without a diagnostic
    assert_eq!(config.get("PJ_IS_LITTLE_ENDIAN"), Ok(&FlagValue::Int(1)));
    assert_eq!(config.diagnostics().len(), 1);
}

#[test]
fn test_invalid_manifests() {
    let both = r#"
[[layer]]
priority = 0
path = "a.h"
builtin = "ios"
"#;
    assert!(matches!(
        Manifest::from_str(both),
        Err(ManifestError::Validation(_))
    ));

    let unknown_builtin = r#"
[[layer]]
priority = 0
builtin = "android"
"#;
    assert!(matches!(
        Manifest::from_str(unknown_builtin),
        Err(ManifestError::Validation(_))
    ));

    let bad_default = r#"
[defaults]
PJ_LOG_MAX_LEVEL = 4.5
"#;
    assert!(matches!(
        Manifest::from_str(bad_default),
        Err(ManifestError::Validation(_))
    ));

    assert!(matches!(
        Manifest::from_str("[[layer]]\npriority = \"high\"\n"),
        Err(ManifestError::Parse(_))
    ));
}

#[test]
fn test_missing_layer_file() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("sitecfg.toml");
    fs::write(
        &manifest_path,
        "[[layer]]\npriority = 0\npath = \"missing.h\"\n",
    )
    .unwrap();

    assert!(matches!(
        Manifest::load(&manifest_path),
        Err(ManifestError::Layer(_))
    ));
}
