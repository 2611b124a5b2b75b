//! The resolution manifest: a declarative description of a stack of layers.
//!
//! Each layer names its root modules, its parents, and the module
//! descriptors its finders serve. Profiles patch settings and individual
//! layers by name. For file discovery, see the `discovery` module.

use std::collections::HashMap;
use std::path::Path;

use figment::{Figment, providers::{Env, Format as _, Json, Toml}};
use modlayer::descriptor::document::DescriptorDocument;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::settings::GlobalSettings;

/// Prefix of environment variables merged over a loaded manifest, e.g.
/// `MODLAYER_SETTINGS__LOG_LEVEL=debug`.
pub const ENV_PREFIX: &str = "MODLAYER_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionManifest {
    #[serde(default)]
    pub settings: GlobalSettings,

    #[serde(default)]
    pub layers: Vec<LayerConfig>,

    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

/// One configuration in the layer stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,

    /// Names of earlier layers. When omitted, the previous layer is the
    /// parent (the empty configuration for the first layer). An empty list
    /// also means the empty configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,

    #[serde(default)]
    pub roots: Vec<String>,

    /// Bind service providers after resolving the roots.
    #[serde(default)]
    pub bind: bool,

    /// Descriptors served ahead of the parent layers.
    #[serde(default)]
    pub modules: Vec<DescriptorDocument>,

    /// Descriptors served only when no parent layer has the module.
    #[serde(default)]
    pub fallback_modules: Vec<DescriptorDocument>,
}

impl LayerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: None,
            roots: Vec::new(),
            bind: false,
            modules: Vec::new(),
            fallback_modules: Vec::new(),
        }
    }
}

/// Overrides applied by [`ResolutionManifest::materialize_profile`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub settings: Value,

    /// Layer name to a partial layer, merged over the layer of that name.
    #[serde(default)]
    pub layers: HashMap<String, Value>,
}

impl ResolutionManifest {
    /// Create from serde_json::Value (for manifests built in code)
    ///
    /// # Example
    ///
    /// ```
    /// use modlayer_config::ResolutionManifest;
    /// use serde_json::json;
    ///
    /// let value = json!({
    ///     "layers": [{
    ///         "name": "app",
    ///         "roots": ["app"],
    ///         "modules": [{ "name": "app" }]
    ///     }]
    /// });
    ///
    /// let manifest = ResolutionManifest::from_value(value).unwrap();
    /// assert_eq!(manifest.layers[0].roots, ["app"]);
    /// ```
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "manifest".to_string(),
            hint: Some(e.to_string()),
        })
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "manifest".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Parses a TOML manifest. Environment variables are not consulted.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let toml_val: toml::Value = toml::from_str(content).map_err(|e| ConfigError::InvalidValue {
            field: "toml".to_string(),
            hint: Some(format!("Invalid TOML syntax: {e}")),
        })?;
        let value = serde_json::to_value(toml_val).map_err(|e| ConfigError::InvalidValue {
            field: "toml".to_string(),
            hint: Some(format!("TOML to JSON conversion failed: {e}")),
        })?;
        Self::from_value(value)
    }

    /// Loads a `.toml` or `.json` manifest and merges `MODLAYER_*`
    /// environment variables over it (`__` separates nested keys).
    ///
    /// # Errors
    ///
    /// Fails when the file is missing, has another extension, or does not
    /// describe a manifest.
    pub fn load(path: &Path) -> Result<Self> {
        // Figment's file providers silently yield nothing for a missing file.
        std::fs::metadata(path)?;

        let figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Figment::new().merge(Toml::file(path)),
            Some("json") => Figment::new().merge(Json::file(path)),
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::InvalidValue {
                field: "manifest".to_string(),
                hint: Some(format!("Check {} syntax and field types: {e}", path.display())),
            })
    }

    /// Applies the named profile's overrides.
    ///
    /// Objects merge key by key; arrays and scalars are replaced.
    pub fn materialize_profile(mut self, profile: Option<&str>) -> Result<Self> {
        let Some(name) = profile else {
            return Ok(self);
        };
        let profile_cfg = self
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;

        if !profile_cfg.settings.is_null() {
            self.settings = merged(&self.settings, &profile_cfg.settings)?;
        }

        for (layer_name, overrides) in &profile_cfg.layers {
            if overrides.is_null() {
                continue;
            }
            let layer = self
                .layers
                .iter_mut()
                .find(|layer| &layer.name == layer_name)
                .ok_or_else(|| ConfigError::InvalidProfileOverride {
                    message: format!("profile '{name}' overrides unknown layer '{layer_name}'"),
                })?;
            let renamed = overrides
                .get("name")
                .is_some_and(|n| n.as_str() != Some(layer_name.as_str()));
            if renamed {
                return Err(ConfigError::InvalidProfileOverride {
                    message: format!("profile '{name}' cannot rename layer '{layer_name}'"),
                });
            }
            *layer = merged(&*layer, overrides)?;
        }

        Ok(self)
    }
}

fn merged<T>(base: &T, update: &Value) -> Result<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let to_override_error = |err: serde_json::Error| ConfigError::InvalidProfileOverride {
        message: err.to_string(),
    };
    let mut value = serde_json::to_value(base).map_err(to_override_error)?;
    merge_values(&mut value, update);
    serde_json::from_value(value).map_err(to_override_error)
}

fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_creates_manifest() {
        let manifest = ResolutionManifest::from_value(json!({
            "layers": [{
                "name": "base",
                "roots": ["m1"],
                "modules": [{ "name": "m1", "version": "1.0" }]
            }]
        }))
        .unwrap();

        assert_eq!(manifest.layers.len(), 1);
        let layer = &manifest.layers[0];
        assert_eq!(layer.name, "base");
        assert!(layer.parents.is_none());
        assert!(!layer.bind);
        assert_eq!(layer.modules[0].version.as_deref(), Some("1.0"));
        assert!(manifest.settings.check);
    }

    #[test]
    fn unknown_descriptor_fields_are_rejected() {
        let err = ResolutionManifest::from_value(json!({
            "layers": [{
                "name": "base",
                "roots": ["m1"],
                "modules": [{ "name": "m1", "colour": "red" }]
            }]
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "manifest"));
    }

    #[test]
    fn to_value_round_trips_layers() {
        let mut layer = LayerConfig::new("app");
        layer.roots = vec!["app".to_string()];
        let manifest = ResolutionManifest {
            layers: vec![layer],
            ..ResolutionManifest::default()
        };

        let value = manifest.to_value().unwrap();
        assert_eq!(value["layers"][0]["roots"], json!(["app"]));
        assert!(value["layers"][0].get("parents").is_none());
        assert_eq!(ResolutionManifest::from_value(value).unwrap(), manifest);
    }

    #[test]
    fn profile_merges_settings_and_layers() {
        let manifest = ResolutionManifest::from_value(json!({
            "settings": { "log_level": "info" },
            "layers": [
                { "name": "base", "roots": ["m1"] },
                { "name": "app", "roots": ["m2"], "bind": false }
            ],
            "profiles": {
                "debug": {
                    "settings": { "log_level": "debug", "check": false },
                    "layers": { "app": { "bind": true, "roots": ["m2", "m3"] } }
                }
            }
        }))
        .unwrap()
        .materialize_profile(Some("debug"))
        .unwrap();

        assert_eq!(manifest.settings.log_level.as_deref(), Some("debug"));
        assert!(!manifest.settings.check);
        let app = &manifest.layers[1];
        assert!(app.bind);
        assert_eq!(app.roots, ["m2", "m3"]);
        assert_eq!(manifest.layers[0].roots, ["m1"]);
    }

    #[test]
    fn no_profile_leaves_manifest_untouched() {
        let manifest = ResolutionManifest::from_value(json!({
            "layers": [{ "name": "base", "roots": ["m1"] }],
            "profiles": { "ci": { "settings": { "trace": true } } }
        }))
        .unwrap();
        let same = manifest.clone().materialize_profile(None).unwrap();
        assert_eq!(same, manifest);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let err = ResolutionManifest::default()
            .materialize_profile(Some("missing"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile(ref name) if name == "missing"));
    }

    #[test]
    fn profile_for_unknown_layer_is_an_error() {
        let err = ResolutionManifest::from_value(json!({
            "layers": [{ "name": "base", "roots": ["m1"] }],
            "profiles": { "ci": { "layers": { "other": { "bind": true } } } }
        }))
        .unwrap()
        .materialize_profile(Some("ci"))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProfileOverride { .. }));
    }

    #[test]
    fn profile_cannot_rename_a_layer() {
        let err = ResolutionManifest::from_value(json!({
            "layers": [{ "name": "base", "roots": ["m1"] }],
            "profiles": { "ci": { "layers": { "base": { "name": "renamed" } } } }
        }))
        .unwrap()
        .materialize_profile(Some("ci"))
        .unwrap_err();
        assert!(err.to_string().contains("cannot rename layer 'base'"));
    }

    #[test]
    fn merge_replaces_arrays_and_merges_objects() {
        let mut target = json!({ "a": [1, 2], "b": { "x": 1, "y": 2 } });
        merge_values(&mut target, &json!({ "a": [3], "b": { "y": 5 } }));
        assert_eq!(target, json!({ "a": [3], "b": { "x": 1, "y": 5 } }));
    }

    #[test]
    fn from_toml_str_parses_layers() {
        let manifest = ResolutionManifest::from_toml_str(
            r#"
[settings]
check = false

[[layers]]
name = "base"
roots = ["m1"]

[[layers.modules]]
name = "m1"
exports = [{ package = "p" }]
"#,
        )
        .unwrap();

        assert!(!manifest.settings.check);
        assert_eq!(manifest.layers[0].modules[0].exports[0].package, "p");
    }

    #[test]
    fn invalid_toml_reports_syntax() {
        let err = ResolutionManifest::from_toml_str("layers = [").unwrap_err();
        assert!(err.hint().is_some_and(|hint| hint.starts_with("Invalid TOML syntax")));
    }
}
