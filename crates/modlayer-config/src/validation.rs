//! Pluggable manifest validation strategies
//!
//! Validation is purely structural: it never decodes descriptors or touches
//! the resolver. Descriptor and resolution errors surface from
//! [`ResolutionManifest::resolve`](crate::ResolutionManifest::resolve).

use std::collections::HashSet;

use crate::error::{ConfigError, Result};
use crate::manifest::ResolutionManifest;

/// Trait for pluggable manifest validation strategies
pub trait ManifestValidator {
    fn validate(&self, manifest: &ResolutionManifest) -> Result<()>;
}

/// Checks the layer stack is well formed.
///
/// # Example
///
/// ```
/// use modlayer_config::{LayerConfig, ManifestValidator, ResolutionManifest, SchemaValidator};
///
/// let mut layer = LayerConfig::new("app");
/// layer.roots = vec!["app".into()];
/// let manifest = ResolutionManifest {
///     layers: vec![layer],
///     ..Default::default()
/// };
///
/// SchemaValidator.validate(&manifest).unwrap();
/// ```
pub struct SchemaValidator;

impl ManifestValidator for SchemaValidator {
    fn validate(&self, manifest: &ResolutionManifest) -> Result<()> {
        if manifest.layers.is_empty() {
            return Err(ConfigError::NoLayers);
        }

        let mut seen: HashSet<&str> = HashSet::with_capacity(manifest.layers.len());
        for layer in &manifest.layers {
            let name = layer.name.as_str();
            if name.trim().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: "layer names cannot be empty".to_string(),
                    hint: Some("Give every entry in 'layers' a unique name".to_string()),
                });
            }

            if let Some(parents) = &layer.parents {
                let mut listed: HashSet<&str> = HashSet::with_capacity(parents.len());
                for parent in parents {
                    if !seen.contains(parent.as_str()) {
                        return Err(ConfigError::SchemaValidation {
                            message: format!("layer '{name}' names unknown parent '{parent}'"),
                            hint: Some(
                                "Parents must name layers declared earlier in the manifest"
                                    .to_string(),
                            ),
                        });
                    }
                    if !listed.insert(parent.as_str()) {
                        return Err(ConfigError::SchemaValidation {
                            message: format!("layer '{name}' lists parent '{parent}' twice"),
                            hint: None,
                        });
                    }
                }
            }

            if layer.roots.is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("layer '{name}' has no roots"),
                    hint: Some("List the modules to resolve in 'roots'".to_string()),
                });
            }
            if layer.roots.iter().any(|root| root.trim().is_empty()) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("layer '{name}' has an empty root name"),
                    hint: Some("Remove empty strings from the 'roots' array".to_string()),
                });
            }

            // Checked last so a layer cannot name itself as a parent.
            if !seen.insert(name) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("duplicate layer name '{name}'"),
                    hint: None,
                });
            }
        }

        Ok(())
    }
}

/// Validate with [`SchemaValidator`] (convenience function)
pub fn validate_schema(manifest: &ResolutionManifest) -> Result<()> {
    SchemaValidator.validate(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::LayerConfig;

    fn layer(name: &str, roots: &[&str]) -> LayerConfig {
        let mut layer = LayerConfig::new(name);
        layer.roots = roots.iter().map(|root| root.to_string()).collect();
        layer
    }

    fn manifest(layers: Vec<LayerConfig>) -> ResolutionManifest {
        ResolutionManifest {
            layers,
            ..ResolutionManifest::default()
        }
    }

    fn message(result: Result<()>) -> String {
        match result.unwrap_err() {
            ConfigError::SchemaValidation { message, .. } => message,
            other => panic!("expected a schema error, got {other:?}"),
        }
    }

    #[test]
    fn valid_layer_stack() {
        let mut app = layer("app", &["m2"]);
        app.parents = Some(vec!["base".to_string()]);
        let mut isolated = layer("isolated", &["m3"]);
        isolated.parents = Some(Vec::new());
        assert!(validate_schema(&manifest(vec![layer("base", &["m1"]), app, isolated])).is_ok());
    }

    #[test]
    fn manifest_without_layers() {
        assert!(matches!(
            validate_schema(&ResolutionManifest::default()),
            Err(ConfigError::NoLayers)
        ));
    }

    #[test]
    fn empty_layer_name() {
        assert_eq!(
            message(validate_schema(&manifest(vec![layer("  ", &["m1"])]))),
            "layer names cannot be empty"
        );
    }

    #[test]
    fn duplicate_layer_name() {
        let layers = vec![layer("base", &["m1"]), layer("base", &["m2"])];
        let result = validate_schema(&manifest(layers));
        assert_eq!(message(result), "duplicate layer name 'base'");
    }

    #[test]
    fn parent_must_be_declared_earlier() {
        let mut first = layer("first", &["m1"]);
        first.parents = Some(vec!["second".to_string()]);
        let result = validate_schema(&manifest(vec![first, layer("second", &["m2"])]));
        assert_eq!(message(result), "layer 'first' names unknown parent 'second'");
    }

    #[test]
    fn layer_cannot_be_its_own_parent() {
        let mut base = layer("base", &["m1"]);
        base.parents = Some(vec!["base".to_string()]);
        let result = validate_schema(&manifest(vec![base]));
        assert_eq!(message(result), "layer 'base' names unknown parent 'base'");
    }

    #[test]
    fn parent_listed_twice() {
        let mut app = layer("app", &["m2"]);
        app.parents = Some(vec!["base".to_string(), "base".to_string()]);
        let result = validate_schema(&manifest(vec![layer("base", &["m1"]), app]));
        assert_eq!(message(result), "layer 'app' lists parent 'base' twice");
    }

    #[test]
    fn layer_without_roots() {
        let result = validate_schema(&manifest(vec![layer("base", &[])]));
        assert_eq!(message(result), "layer 'base' has no roots");
    }

    #[test]
    fn empty_root_name() {
        let result = validate_schema(&manifest(vec![layer("base", &["m1", ""])]));
        assert_eq!(message(result), "layer 'base' has an empty root name");
    }
}
