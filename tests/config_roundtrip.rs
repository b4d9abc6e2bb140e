//! Settings save/load and path layout.

mod common;

use certgate::config::{Settings, TrustPaths, DEFAULT_CONNECT_TIMEOUT_MS};
use std::time::Duration;

#[test]
fn settings_roundtrip() {
    let dir = common::temp_home();
    let paths = TrustPaths::for_test(dir.path());

    let settings = Settings {
        connect_timeout_ms: 750,
        platform_anchors: false,
    };
    settings.save(&paths).unwrap();
    assert!(paths.settings_file.is_file());

    let loaded = Settings::load(&paths).unwrap();
    assert_eq!(loaded, settings);
    assert_eq!(loaded.connect_timeout(), Duration::from_millis(750));
}

#[test]
fn missing_file_yields_defaults() {
    let dir = common::temp_home();
    let paths = TrustPaths::for_test(dir.path());
    let loaded = Settings::load(&paths).unwrap();
    assert_eq!(loaded, Settings::default());
    assert_eq!(loaded.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
    assert!(loaded.platform_anchors);
}

#[test]
fn partial_file_fills_defaults() {
    let dir = common::temp_home();
    let paths = TrustPaths::for_test(dir.path());
    std::fs::write(&paths.settings_file, "platform_anchors = false\n").unwrap();
    let loaded = Settings::load(&paths).unwrap();
    assert!(!loaded.platform_anchors);
    assert_eq!(loaded.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
}

#[test]
fn malformed_file_is_an_error() {
    let dir = common::temp_home();
    let paths = TrustPaths::for_test(dir.path());
    std::fs::write(&paths.settings_file, "connect_timeout_ms = \"soon\"\n").unwrap();
    assert!(Settings::load(&paths).is_err());
}

#[test]
fn paths_live_under_base() {
    let dir = common::temp_home();
    let paths = TrustPaths::for_test(dir.path());
    assert_eq!(paths.data_dir, dir.path());
    assert_eq!(paths.store_file, dir.path().join("trust_store.p12"));
    assert_eq!(paths.settings_file, dir.path().join("settings.toml"));
}

#[test]
fn ensure_dirs_creates_nested_base() {
    let dir = common::temp_home();
    let paths = TrustPaths::for_test(dir.path().join("a").join("b"));
    paths.ensure_dirs().unwrap();
    assert!(paths.data_dir.is_dir());
}
