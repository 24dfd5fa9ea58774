//! iOS site header layered over the generic sample header
//!
//! Loads both fixture headers through the directive parser and checks the
//! merged result, its redefinition diagnostics and the typed capability view.

mod fixtures;

use sitecfg::builtin;
use sitecfg::layer::load_file;
use sitecfg::resolved::Diagnostic;
use sitecfg::resolver::resolve_with;
use sitecfg::{
    resolve, Capabilities, FlagDefaults, FlagValue, Layer, ResolveError, ResolveOptions,
    TlsBackend,
};

fn site_layers() -> Vec<(i32, Layer)> {
    let sample = load_file(&fixtures::sample_header_path(), Some("sample")).unwrap();
    let site = load_file(&fixtures::site_header_path(), Some("ios")).unwrap();
    vec![(0, sample.layer), (10, site.layer)]
}

#[test]
fn test_site_header_parses_into_layer() {
    let loaded = load_file(&fixtures::site_header_path(), None).unwrap();
    let layer = loaded.layer;

    // Id falls back to the file stem
    assert_eq!(layer.id().as_str(), "config_site");
    assert_eq!(layer.len(), 10);

    let little = layer.assignment("PJ_IS_LITTLE_ENDIAN").unwrap();
    assert!(little.undef_before_set);
    assert_eq!(little.value, Some(FlagValue::Int(1)));

    let tls = layer.assignment("PJ_SSL_SOCK_IMP").unwrap();
    assert!(!tls.undef_before_set);
    assert_eq!(tls.value, Some(FlagValue::from("PJ_SSL_SOCK_IMP_APPLE")));

    assert_eq!(loaded.source.digest.len(), 64);
}

#[test]
fn test_site_header_matches_builtin_layer() {
    let from_file = load_file(&fixtures::site_header_path(), Some("ios"))
        .unwrap()
        .layer;
    let builtin = builtin::ios_override_layer().unwrap();
    assert_eq!(from_file, builtin);
}

#[test]
fn test_sample_header_values() {
    let sample = load_file(&fixtures::sample_header_path(), None).unwrap().layer;
    assert_eq!(
        sample.assignment("PJSIP_MAX_URL_SIZE").unwrap().value,
        Some(FlagValue::Int(256))
    );
    assert!(sample
        .assignments()
        .iter()
        .all(|a| !a.undef_before_set && a.value.is_some()));
}

#[test]
fn test_site_over_sample() {
    let config = resolve(&site_layers(), &builtin::exclusion_groups()).unwrap();

    assert!(config.get_bool("PJ_IS_LITTLE_ENDIAN").unwrap());
    assert!(!config.get_bool("PJ_IS_BIG_ENDIAN").unwrap());
    assert_eq!(config.source_of("PJ_IS_LITTLE_ENDIAN").unwrap().as_str(), "ios");

    // Flags only the sample sets pass through untouched
    assert_eq!(config.get_int("PJ_LOG_MAX_LEVEL"), Ok(4));
    assert_eq!(config.source_of("PJ_HAS_IPV6").unwrap().as_str(), "sample");

    assert_eq!(
        config.get_symbol("PJ_SSL_SOCK_IMP"),
        Ok("PJ_SSL_SOCK_IMP_APPLE")
    );

    let ssl = config.flag("PJ_HAS_SSL_SOCK").unwrap();
    assert_eq!(ssl.value, FlagValue::Int(1));
    assert_eq!(ssl.replaced.len(), 1);
    assert_eq!(ssl.replaced[0].layer.as_str(), "sample");
    assert_eq!(ssl.replaced[0].value, FlagValue::Int(0));
}

#[test]
fn test_plain_redefinitions_are_reported() {
    let config = resolve(&site_layers(), &builtin::exclusion_groups()).unwrap();

    let redefined: Vec<&str> = config
        .diagnostics()
        .iter()
        .map(|d| match d {
            Diagnostic::Redefinition { flag, .. } => flag.as_str(),
        })
        .collect();
    assert_eq!(redefined, vec!["PJMEDIA_HAS_VIDEO", "PJ_HAS_SSL_SOCK"]);
}

#[test]
fn test_strict_mode_rejects_plain_redefinition() {
    let err = resolve_with(
        &site_layers(),
        &builtin::exclusion_groups(),
        FlagDefaults::new(),
        ResolveOptions { strict: true },
    )
    .unwrap_err();

    match err {
        ResolveError::Redefinition {
            flag,
            previous_layer,
            layer,
            ..
        } => {
            assert_eq!(flag, "PJMEDIA_HAS_VIDEO");
            assert_eq!(previous_layer.as_str(), "sample");
            assert_eq!(layer.as_str(), "ios");
        }
        other => panic!("expected Redefinition, got {:?}", other),
    }
}

#[test]
fn test_site_capabilities() {
    let config = resolve(&site_layers(), &builtin::exclusion_groups()).unwrap();
    let caps = Capabilities::from_config(&config).unwrap();

    assert!(caps.little_endian);
    assert_eq!(caps.arch.as_deref(), Some("PJ_M_ARM"));
    assert_eq!(caps.tls, TlsBackend::Apple);
    assert!(caps.video);
    assert!(caps.video_toolbox);
    assert!(caps.iphone);
    assert!(!caps.check_stack);
    assert!(caps.dont_switch_to_tcp);
}

#[test]
fn test_rendered_header_round_trips() {
    let config = resolve(&site_layers(), &builtin::exclusion_groups()).unwrap();
    let header = config.to_header("__RESOLVED_SITE_H__");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resolved.h");
    std::fs::write(&path, &header).unwrap();

    let reparsed = load_file(&path, Some("resolved")).unwrap().layer;
    let again = resolve(&[(0, reparsed)], &builtin::exclusion_groups()).unwrap();

    assert_eq!(again.len(), config.len());
    for (name, flag) in config.flags() {
        assert_eq!(again.get(name).unwrap(), &flag.value, "{}", name);
    }
}
