//! Resolved configurations.
//!
//! A [`Configuration`] is the immutable outcome of resolution: the set of
//! resolved modules, the modules each one reads, and the parent
//! configurations it was resolved against. Configurations form a DAG through
//! their parents; the [empty configuration](Configuration::empty) is the root
//! of every chain.
//!
//! Modules are stored in an arena and read edges are `(configuration, index)`
//! keys, so an edge can point into this configuration or into any ancestor
//! but never into a descendant.
//!
//! ```
//! use modlayer::{Configuration, EmptyFinder, InMemoryFinder, ModuleDescriptor};
//!
//! let m1 = ModuleDescriptor::builder("m1")?.requires("m2")?.build();
//! let m2 = ModuleDescriptor::builder("m2")?.build();
//! let finder = InMemoryFinder::of([m1, m2]);
//!
//! let cf = Configuration::empty().resolve_requires(&finder, &EmptyFinder, ["m1"])?;
//! let m1 = cf.find_module("m1").unwrap();
//! assert_eq!(m1.reads().len(), 1);
//! # Ok::<(), modlayer::Error>(())
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

use crate::descriptor::ModuleDescriptor;
use crate::error::{ResolutionError, Result};
use crate::finder::ModuleFinder;
use crate::reference::ModuleReference;
use crate::resolver::Resolver;
use crate::target::TargetPlatform;

static NEXT_CONFIGURATION_ID: AtomicU64 = AtomicU64::new(1);

static EMPTY: Lazy<Arc<Configuration>> = Lazy::new(|| {
    Arc::new(Configuration {
        id: ConfigId(0),
        parents: Vec::new(),
        modules: Vec::new(),
        reads: Vec::new(),
        name_index: HashMap::default(),
        target: TargetPlatform::default(),
    })
});

/// Process-unique configuration identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ConfigId(u64);

impl ConfigId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONFIGURATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cf{}", self.0)
    }
}

/// Address of a module in some configuration's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ModuleKey {
    pub(crate) config: ConfigId,
    pub(crate) index: usize,
}

/// Output of the resolver, turned into a configuration by
/// [`Configuration::from_graph`].
pub(crate) struct ResolvedGraph {
    pub(crate) id: ConfigId,
    pub(crate) modules: Vec<ModuleReference>,
    pub(crate) reads: Vec<Vec<ModuleKey>>,
    pub(crate) target: TargetPlatform,
}

/// The result of resolution: resolved modules and their readability graph.
pub struct Configuration {
    id: ConfigId,
    parents: Vec<Arc<Configuration>>,
    modules: Vec<ModuleReference>,
    reads: Vec<Vec<ModuleKey>>,
    name_index: HashMap<String, usize>,
    target: TargetPlatform,
}

/// Collects `roots` and their ancestors depth-first, each configuration once.
pub(crate) fn ancestors_of(roots: &[Arc<Configuration>]) -> Vec<&Configuration> {
    let mut seen = HashSet::default();
    let mut result = Vec::new();
    let mut stack: Vec<&Configuration> = roots.iter().rev().map(Arc::as_ref).collect();
    while let Some(configuration) = stack.pop() {
        if !seen.insert(configuration.id) {
            continue;
        }
        result.push(configuration);
        stack.extend(configuration.parents.iter().rev().map(Arc::as_ref));
    }
    result
}

impl Configuration {
    /// The configuration with no parents and no modules.
    pub fn empty() -> Arc<Configuration> {
        Arc::clone(&EMPTY)
    }

    pub(crate) fn from_graph(parents: Vec<Arc<Configuration>>, graph: ResolvedGraph) -> Arc<Self> {
        let name_index = graph
            .modules
            .iter()
            .enumerate()
            .map(|(index, reference)| (reference.name().to_string(), index))
            .collect();
        Arc::new(Self {
            id: graph.id,
            parents,
            modules: graph.modules,
            reads: graph.reads,
            name_index,
            target: graph.target,
        })
    }

    /// Resolves `roots` with this configuration as the only parent.
    ///
    /// Each root and dependence is looked up in `before`, then in this
    /// configuration and its ancestors, then in `after`.
    pub fn resolve_requires<I, S>(
        self: &Arc<Self>,
        before: &dyn ModuleFinder,
        after: &dyn ModuleFinder,
        roots: I,
    ) -> Result<Arc<Configuration>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::resolve(before, std::slice::from_ref(self), after, roots)
    }

    /// Like [`resolve_requires`](Self::resolve_requires), then binds service
    /// providers.
    pub fn resolve_requires_and_uses<I, S>(
        self: &Arc<Self>,
        before: &dyn ModuleFinder,
        after: &dyn ModuleFinder,
        roots: I,
    ) -> Result<Arc<Configuration>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::resolve_and_bind(before, std::slice::from_ref(self), after, roots)
    }

    /// Resolves `roots` against any number of parent configurations.
    ///
    /// # Errors
    ///
    /// Fails with [`ResolutionError::NoParents`] when `parents` is empty.
    pub fn resolve<I, S>(
        before: &dyn ModuleFinder,
        parents: &[Arc<Configuration>],
        after: &dyn ModuleFinder,
        roots: I,
    ) -> Result<Arc<Configuration>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::run_resolver(before, parents, after, roots, false)
    }

    /// Like [`resolve`](Self::resolve), then binds service providers.
    pub fn resolve_and_bind<I, S>(
        before: &dyn ModuleFinder,
        parents: &[Arc<Configuration>],
        after: &dyn ModuleFinder,
        roots: I,
    ) -> Result<Arc<Configuration>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::run_resolver(before, parents, after, roots, true)
    }

    fn run_resolver<I, S>(
        before: &dyn ModuleFinder,
        parents: &[Arc<Configuration>],
        after: &dyn ModuleFinder,
        roots: I,
        bind: bool,
    ) -> Result<Arc<Configuration>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if parents.is_empty() {
            return Err(ResolutionError::NoParents.into());
        }
        let mut resolver = Resolver::new(parents.iter().cloned(), before, after)?;
        resolver.resolve(roots)?;
        if bind {
            resolver.bind()?;
        }
        resolver.finish(true)
    }

    pub(crate) fn id(&self) -> ConfigId {
        self.id
    }

    pub fn parents(&self) -> &[Arc<Configuration>] {
        &self.parents
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// The modules resolved in this configuration, excluding ancestors.
    pub fn modules(&self) -> impl ExactSizeIterator<Item = ResolvedModule<'_>> + '_ {
        (0..self.modules.len()).map(move |index| ResolvedModule {
            configuration: self,
            index,
        })
    }

    pub fn descriptors(&self) -> impl ExactSizeIterator<Item = &ModuleDescriptor> + '_ {
        self.modules.iter().map(ModuleReference::descriptor)
    }

    /// Finds a module by name in this configuration, then in its ancestors
    /// depth-first.
    pub fn find_module(&self, name: &str) -> Option<ResolvedModule<'_>> {
        self.configurations()
            .into_iter()
            .find_map(|configuration| configuration.find_own(name))
    }

    fn find_own(&self, name: &str) -> Option<ResolvedModule<'_>> {
        self.name_index.get(name).map(|&index| ResolvedModule {
            configuration: self,
            index,
        })
    }

    /// The modules read by `module`, which must belong to this
    /// configuration; empty otherwise.
    pub fn reads<'a>(&'a self, module: &ResolvedModule<'a>) -> Vec<ResolvedModule<'a>> {
        if module.configuration.id != self.id {
            return Vec::new();
        }
        module.reads()
    }

    /// This configuration followed by its ancestors, depth-first, each once.
    pub fn configurations(&self) -> Vec<&Configuration> {
        let mut result = vec![self];
        result.extend(ancestors_of(&self.parents).into_iter().filter(|c| c.id != self.id));
        result
    }

    pub fn target_platform(&self) -> &TargetPlatform {
        &self.target
    }

    pub(crate) fn reference_at(&self, index: usize) -> Option<&ModuleReference> {
        self.modules.get(index)
    }

    fn resolve_key(&self, key: ModuleKey) -> Option<ResolvedModule<'_>> {
        let configuration = self.configurations().into_iter().find(|c| c.id == key.config)?;
        configuration.reference_at(key.index)?;
        Some(ResolvedModule {
            configuration,
            index: key.index,
        })
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modules: Vec<&str> = self.modules.iter().map(ModuleReference::name).collect();
        let parents: Vec<ConfigId> = self.parents.iter().map(|p| p.id).collect();
        f.debug_struct("Configuration")
            .field("id", &self.id)
            .field("modules", &modules)
            .field("parents", &parents)
            .finish()
    }
}

/// Lists module names with the modules each one reads.
impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, module) in self.modules().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let reads: Vec<String> = module.reads().iter().map(|m| m.name().to_string()).collect();
            write!(f, "{} -> [{}]", module.name(), reads.join(", "))?;
        }
        Ok(())
    }
}

/// A module within a configuration.
///
/// Equal only to handles for the same module of the same configuration.
#[derive(Clone, Copy)]
pub struct ResolvedModule<'a> {
    configuration: &'a Configuration,
    index: usize,
}

impl<'a> ResolvedModule<'a> {
    pub fn configuration(&self) -> &'a Configuration {
        self.configuration
    }

    pub fn reference(&self) -> &'a ModuleReference {
        &self.configuration.modules[self.index]
    }

    pub fn descriptor(&self) -> &'a ModuleDescriptor {
        self.reference().descriptor()
    }

    pub fn name(&self) -> &'a str {
        self.reference().name()
    }

    /// The modules this module reads, in this configuration or its ancestors.
    pub fn reads(&self) -> Vec<ResolvedModule<'a>> {
        self.configuration.reads[self.index]
            .iter()
            .filter_map(|key| self.configuration.resolve_key(*key))
            .collect()
    }

    /// Whether this module reads the module named `name`.
    pub fn reads_module(&self, name: &str) -> bool {
        self.reads().iter().any(|m| m.name() == name)
    }

    pub(crate) fn key(&self) -> ModuleKey {
        ModuleKey {
            config: self.configuration.id,
            index: self.index,
        }
    }
}

impl PartialEq for ResolvedModule<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ResolvedModule<'_> {}

impl Hash for ResolvedModule<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for ResolvedModule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.configuration.id, self.name())
    }
}

impl fmt::Display for ResolvedModule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.configuration.id, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_a_singleton() {
        let a = Configuration::empty();
        let b = Configuration::empty();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_empty());
        assert!(a.parents().is_empty());
        assert!(a.find_module("anything").is_none());
        assert_eq!(a.configurations().len(), 1);
    }

    #[test]
    fn configuration_ids_are_unique() {
        let a = ConfigId::next();
        let b = ConfigId::next();
        assert_ne!(a, b);
        assert_ne!(a, Configuration::empty().id());
    }

    #[test]
    fn resolve_requires_a_parent() {
        let finder = crate::finder::EmptyFinder;
        let err = Configuration::resolve(&finder, &[], &finder, ["m1"]).unwrap_err();
        assert!(err.is_resolution());
        assert_eq!(err.to_string(), "No parent configurations specified");
    }
}
