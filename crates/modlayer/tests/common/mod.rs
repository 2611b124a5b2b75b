//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use modlayer::{
    Configuration, EmptyFinder, Error, InMemoryFinder, ModuleDescriptor, ModuleDescriptorBuilder,
    ResolutionError,
};

pub fn module(name: &str) -> ModuleDescriptorBuilder {
    ModuleDescriptor::builder(name).expect("valid module name")
}

pub fn automatic(name: &str) -> ModuleDescriptorBuilder {
    ModuleDescriptor::automatic(name).expect("valid module name")
}

pub fn finder(descriptors: impl IntoIterator<Item = ModuleDescriptor>) -> InMemoryFinder {
    InMemoryFinder::of(descriptors)
}

/// Resolves `roots` against the empty configuration.
pub fn resolve(finder: &InMemoryFinder, roots: &[&str]) -> modlayer::Result<Arc<Configuration>> {
    Configuration::empty().resolve_requires(finder, &EmptyFinder, roots)
}

/// Resolves `roots` against `parent`.
pub fn resolve_in(
    parent: &Arc<Configuration>,
    finder: &InMemoryFinder,
    roots: &[&str],
) -> modlayer::Result<Arc<Configuration>> {
    parent.resolve_requires(finder, &EmptyFinder, roots)
}

pub fn resolve_and_bind(
    finder: &InMemoryFinder,
    roots: &[&str],
) -> modlayer::Result<Arc<Configuration>> {
    Configuration::empty().resolve_requires_and_uses(finder, &EmptyFinder, roots)
}

/// Sorted names of the modules read by `name`.
pub fn reads(cf: &Configuration, name: &str) -> Vec<String> {
    let module = cf
        .find_module(name)
        .unwrap_or_else(|| panic!("{name} not in configuration"));
    let mut names: Vec<String> = module.reads().iter().map(|m| m.name().to_string()).collect();
    names.sort();
    names
}

/// Sorted names of the modules resolved in `cf` itself.
pub fn module_names(cf: &Configuration) -> Vec<String> {
    let mut names: Vec<String> = cf.modules().map(|m| m.name().to_string()).collect();
    names.sort();
    names
}

pub fn resolution_error(result: modlayer::Result<Arc<Configuration>>) -> ResolutionError {
    match result {
        Err(Error::Resolution(err)) => err,
        Err(other) => panic!("expected a resolution error, got {other}"),
        Ok(cf) => panic!("expected a resolution error, resolved {cf}"),
    }
}
