//! Turning a manifest into a stack of resolved configurations.

use std::sync::Arc;

use indexmap::IndexMap;
use modlayer::descriptor::document::{DecodeOptions, DescriptorDocument};
use modlayer::{Configuration, InMemoryFinder, Resolver};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::manifest::{LayerConfig, ResolutionManifest};
use crate::validation::{ManifestValidator, SchemaValidator};

/// The configurations built from a manifest, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ResolvedLayers {
    layers: IndexMap<String, Arc<Configuration>>,
}

impl ResolvedLayers {
    pub fn get(&self, name: &str) -> Option<&Arc<Configuration>> {
        self.layers.get(name)
    }

    /// The last declared layer.
    pub fn last(&self) -> Option<&Arc<Configuration>> {
        self.layers.last().map(|(_, configuration)| configuration)
    }

    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.layers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &Arc<Configuration>)> + '_ {
        self.layers.iter().map(|(name, configuration)| (name.as_str(), configuration))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl ResolutionManifest {
    /// Validates the manifest, then resolves every layer in order.
    ///
    /// Each layer's `modules` are searched before its parents and its
    /// `fallback_modules` after them.
    ///
    /// # Errors
    ///
    /// Fails on the first schema, descriptor, or resolution error; the
    /// latter two name the layer they occurred in.
    pub fn resolve(&self) -> Result<ResolvedLayers> {
        SchemaValidator.validate(self)?;

        let options = self.settings.decode_options();
        let mut layers: IndexMap<String, Arc<Configuration>> =
            IndexMap::with_capacity(self.layers.len());
        for layer in &self.layers {
            let parents = layer.parent_configurations(&layers)?;
            let configuration = layer.resolve(parents, &options, self.settings.check)?;
            debug!(
                layer = %layer.name,
                modules = configuration.len(),
                bind = layer.bind,
                "resolved layer"
            );
            layers.insert(layer.name.clone(), configuration);
        }

        Ok(ResolvedLayers { layers })
    }
}

impl LayerConfig {
    fn parent_configurations(
        &self,
        resolved: &IndexMap<String, Arc<Configuration>>,
    ) -> Result<Vec<Arc<Configuration>>> {
        let Some(names) = &self.parents else {
            let previous = resolved
                .last()
                .map(|(_, configuration)| Arc::clone(configuration))
                .unwrap_or_else(Configuration::empty);
            return Ok(vec![previous]);
        };
        if names.is_empty() {
            return Ok(vec![Configuration::empty()]);
        }
        names
            .iter()
            .map(|name| {
                resolved.get(name).cloned().ok_or_else(|| ConfigError::SchemaValidation {
                    message: format!("layer '{}' names unknown parent '{name}'", self.name),
                    hint: None,
                })
            })
            .collect()
    }

    fn finder(
        &self,
        documents: &[DescriptorDocument],
        options: &DecodeOptions,
    ) -> Result<InMemoryFinder> {
        let descriptors = documents
            .iter()
            .map(|document| document.to_descriptor(options))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|source| ConfigError::Descriptor {
                layer: self.name.clone(),
                source,
            })?;
        Ok(InMemoryFinder::of(descriptors))
    }

    fn resolve(
        &self,
        parents: Vec<Arc<Configuration>>,
        options: &DecodeOptions,
        check: bool,
    ) -> Result<Arc<Configuration>> {
        let before = self.finder(&self.modules, options)?;
        let after = self.finder(&self.fallback_modules, options)?;
        let in_layer = |source: modlayer::Error| ConfigError::Resolution {
            layer: self.name.clone(),
            source,
        };

        let mut resolver = Resolver::new(parents, &before, &after).map_err(in_layer)?;
        resolver.resolve(&self.roots).map_err(in_layer)?;
        if self.bind {
            resolver.bind().map_err(in_layer)?;
        }
        resolver.finish(check).map_err(in_layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(value: serde_json::Value) -> ResolutionManifest {
        ResolutionManifest::from_value(value).unwrap()
    }

    #[test]
    fn layers_default_to_the_previous_layer() {
        let layers = manifest(json!({
            "layers": [
                { "name": "base", "roots": ["m1"], "modules": [{ "name": "m1" }] },
                {
                    "name": "app",
                    "roots": ["m2"],
                    "modules": [{ "name": "m2", "requires": [{ "name": "m1" }] }]
                }
            ]
        }))
        .resolve()
        .unwrap();

        assert_eq!(layers.names().collect::<Vec<_>>(), ["base", "app"]);
        let base = layers.get("base").unwrap();
        let app = layers.get("app").unwrap();
        assert!(Arc::ptr_eq(&app.parents()[0], base));
        assert!(Arc::ptr_eq(&base.parents()[0], &Configuration::empty()));
        assert!(Arc::ptr_eq(layers.last().unwrap(), app));

        let reads = app.find_module("m2").unwrap().reads();
        assert_eq!(reads.len(), 1);
        assert!(std::ptr::eq(reads[0].configuration(), base.as_ref()));
    }

    #[test]
    fn empty_parent_list_starts_from_the_empty_configuration() {
        let layers = manifest(json!({
            "layers": [
                { "name": "a", "roots": ["m1"], "modules": [{ "name": "m1" }] },
                {
                    "name": "b",
                    "parents": [],
                    "roots": ["m1"],
                    "modules": [{ "name": "m1", "version": "2" }]
                }
            ]
        }))
        .resolve()
        .unwrap();

        let b = layers.get("b").unwrap();
        assert!(Arc::ptr_eq(&b.parents()[0], &Configuration::empty()));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn descriptor_errors_name_the_layer() {
        let err = manifest(json!({
            "layers": [{
                "name": "base",
                "roots": ["m1"],
                "modules": [{ "name": "m1", "requires": [{ "name": "m1" }] }]
            }]
        }))
        .resolve()
        .unwrap_err();
        assert!(matches!(err, ConfigError::Descriptor { ref layer, .. } if layer == "base"));
    }

    #[test]
    fn base_module_must_be_required() {
        let value = json!({
            "settings": { "base_module": "base" },
            "layers": [{
                "name": "boot",
                "roots": ["app"],
                "modules": [{ "name": "base" }, { "name": "app" }]
            }]
        });
        let err = manifest(value).resolve().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Descriptor {
                source: modlayer::DescriptorError::MissingBaseDependence { .. },
                ..
            }
        ));
    }

    #[test]
    fn disabling_checks_allows_cycles() {
        let value = json!({
            "settings": { "check": false },
            "layers": [{
                "name": "base",
                "roots": ["a"],
                "modules": [
                    { "name": "a", "requires": [{ "name": "b" }] },
                    { "name": "b", "requires": [{ "name": "a" }] }
                ]
            }]
        });
        let layers = manifest(value.clone()).resolve().unwrap();
        assert_eq!(layers.get("base").unwrap().len(), 2);

        let mut checked = manifest(value);
        checked.settings.check = true;
        let err = checked.resolve().unwrap_err();
        assert_eq!(err.to_string(), "failed to resolve layer 'base': Cycle detected: a -> b -> a");
    }
}
