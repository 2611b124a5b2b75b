//! Tests for manifest discovery and loading from disk.

use modlayer_config::{ConfigError, ManifestDiscovery, ResolutionManifest};
use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

// Loading merges MODLAYER_* variables, so tests touching the environment
// must not overlap with any other load.
fn test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

const TWO_LAYERS: &str = r#"
[settings]
log_level = "info"

[[layers]]
name = "platform"
roots = ["platform"]

[[layers.modules]]
name = "platform"
version = "1.0"
exports = [{ package = "platform.api" }]

[[layers]]
name = "app"
roots = ["app"]

[[layers.modules]]
name = "app"
requires = [{ name = "platform" }]
packages = ["app"]
"#;

#[test]
fn load_toml_manifest_and_resolve() {
    let _guard = test_lock().lock().expect("lock");
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("modlayer.toml"), TWO_LAYERS).expect("write manifest");

    let manifest = ManifestDiscovery::new(dir.path()).load().expect("load manifest");
    assert_eq!(manifest.layers.len(), 2);
    assert_eq!(manifest.settings.log_level.as_deref(), Some("info"));

    let layers = manifest.resolve().expect("resolve layers");
    let app = layers.get("app").expect("app layer");
    let platform = app.find_module("platform").expect("platform visible from app");
    assert_eq!(platform.descriptor().to_name_and_version(), "platform@1.0");
    assert!(app.find_module("app").expect("app module").reads_module("platform"));
}

#[test]
fn load_json_manifest() {
    let _guard = test_lock().lock().expect("lock");
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("modlayer.json"),
        r#"{
            "layers": [{
                "name": "base",
                "roots": ["m1"],
                "modules": [{
                    "format": "modlayer-descriptor",
                    "format_version": 1,
                    "name": "m1",
                    "requires": [{ "name": "m2", "modifiers": ["transitive"] }]
                }],
                "fallback_modules": [{ "name": "m2" }]
            }]
        }"#,
    )
    .expect("write manifest");

    let layers = ManifestDiscovery::new(dir.path())
        .load()
        .expect("load manifest")
        .resolve()
        .expect("resolve layers");
    let base = layers.get("base").expect("base layer");
    assert_eq!(base.len(), 2);
    let mut names: Vec<&str> = base.descriptors().map(|d| d.name()).collect();
    names.sort_unstable();
    assert_eq!(names, ["m1", "m2"]);
}

#[test]
fn environment_overrides_settings() {
    let _guard = test_lock().lock().expect("lock");
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("modlayer.toml"), TWO_LAYERS).expect("write manifest");

    unsafe {
        env::set_var("MODLAYER_SETTINGS__LOG_LEVEL", "debug");
        env::set_var("MODLAYER_SETTINGS__CHECK", "false");
    }
    let manifest = ManifestDiscovery::new(dir.path()).load();
    unsafe {
        env::remove_var("MODLAYER_SETTINGS__LOG_LEVEL");
        env::remove_var("MODLAYER_SETTINGS__CHECK");
    }

    let manifest = manifest.expect("load manifest");
    assert_eq!(manifest.settings.log_level.as_deref(), Some("debug"));
    assert!(!manifest.settings.check);
}

#[test]
fn invalid_manifest_reports_field_types() {
    let _guard = test_lock().lock().expect("lock");
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("modlayer.toml"), "layers = \"nope\"\n").expect("write manifest");

    let err = ManifestDiscovery::new(dir.path()).load().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "manifest"));
}

#[test]
fn unsupported_extension() {
    let _guard = test_lock().lock().expect("lock");
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("modlayer.yaml");
    fs::write(&path, "layers: []\n").expect("write manifest");

    let err = ResolutionManifest::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let _guard = test_lock().lock().expect("lock");
    let dir = TempDir::new().expect("tempdir");
    let err = ResolutionManifest::load(&dir.path().join("modlayer.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
