//! Module finders.
//!
//! A [`ModuleFinder`] locates modules by name. The resolver consults a
//! "before" finder, then the parent configurations, then an "after" finder,
//! so a finder only has to answer for the modules it can see.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::descriptor::ModuleDescriptor;
use crate::error::{Error, Result};
use crate::reference::ModuleReference;

/// Locates modules.
///
/// Implementations must be deterministic for the duration of a resolution:
/// repeated calls to `find` with the same name return equal references.
pub trait ModuleFinder {
    /// Finds the module with the given name.
    fn find(&self, name: &str) -> Result<Option<ModuleReference>>;

    /// Every module this finder can locate, one per name.
    fn find_all(&self) -> Result<Vec<ModuleReference>>;
}

impl<F: ModuleFinder + ?Sized> ModuleFinder for &F {
    fn find(&self, name: &str) -> Result<Option<ModuleReference>> {
        (**self).find(name)
    }

    fn find_all(&self) -> Result<Vec<ModuleReference>> {
        (**self).find_all()
    }
}

impl<F: ModuleFinder + ?Sized> ModuleFinder for Box<F> {
    fn find(&self, name: &str) -> Result<Option<ModuleReference>> {
        (**self).find(name)
    }

    fn find_all(&self) -> Result<Vec<ModuleReference>> {
        (**self).find_all()
    }
}

impl<F: ModuleFinder + ?Sized> ModuleFinder for Arc<F> {
    fn find(&self, name: &str) -> Result<Option<ModuleReference>> {
        (**self).find(name)
    }

    fn find_all(&self) -> Result<Vec<ModuleReference>> {
        (**self).find_all()
    }
}

/// Finds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFinder;

impl ModuleFinder for EmptyFinder {
    fn find(&self, _name: &str) -> Result<Option<ModuleReference>> {
        Ok(None)
    }

    fn find_all(&self) -> Result<Vec<ModuleReference>> {
        Ok(Vec::new())
    }
}

/// Finder over a fixed set of modules.
///
/// When two modules share a name, the first one wins.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFinder {
    modules: IndexMap<String, ModuleReference>,
}

impl InMemoryFinder {
    /// Wraps each descriptor in a reference with no location or content.
    pub fn of<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = ModuleDescriptor>,
    {
        Self::from_references(descriptors.into_iter().map(ModuleReference::new))
    }

    pub fn from_references<I>(references: I) -> Self
    where
        I: IntoIterator<Item = ModuleReference>,
    {
        let mut modules = IndexMap::new();
        for reference in references {
            modules
                .entry(reference.name().to_string())
                .or_insert(reference);
        }
        Self { modules }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleFinder for InMemoryFinder {
    fn find(&self, name: &str) -> Result<Option<ModuleReference>> {
        Ok(self.modules.get(name).cloned())
    }

    fn find_all(&self) -> Result<Vec<ModuleReference>> {
        Ok(self.modules.values().cloned().collect())
    }
}

/// Chains finders: `find` asks each in order and returns the first hit.
pub struct ComposedFinder {
    finders: Vec<Box<dyn ModuleFinder + Send + Sync>>,
}

impl ComposedFinder {
    pub fn new(finders: Vec<Box<dyn ModuleFinder + Send + Sync>>) -> Self {
        Self { finders }
    }

    /// Shorthand for composing two finders.
    pub fn compose<A, B>(first: A, second: B) -> Self
    where
        A: ModuleFinder + Send + Sync + 'static,
        B: ModuleFinder + Send + Sync + 'static,
    {
        Self::new(vec![Box::new(first), Box::new(second)])
    }
}

impl ModuleFinder for ComposedFinder {
    fn find(&self, name: &str) -> Result<Option<ModuleReference>> {
        for finder in &self.finders {
            if let Some(reference) = finder.find(name)? {
                return Ok(Some(reference));
            }
        }
        Ok(None)
    }

    fn find_all(&self) -> Result<Vec<ModuleReference>> {
        let mut all: IndexMap<String, ModuleReference> = IndexMap::new();
        for finder in &self.finders {
            for reference in finder.find_all()? {
                all.entry(reference.name().to_string()).or_insert(reference);
            }
        }
        Ok(all.into_values().collect())
    }
}

impl std::fmt::Debug for ComposedFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedFinder")
            .field("finders", &self.finders.len())
            .finish()
    }
}

struct ScanState<S> {
    source: S,
    exhausted: bool,
    /// First error the source produced. The cursor never moves past it.
    failure: Option<Error>,
    scanned: usize,
    cache: IndexMap<String, ModuleReference>,
}

impl<S> ScanState<S>
where
    S: Iterator<Item = Result<ModuleReference>>,
{
    /// Advances the cursor by one entry, caching it unless its name is
    /// already taken. Returns the name of the entry that was read.
    fn advance(&mut self) -> Result<Option<String>> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        if self.exhausted {
            return Ok(None);
        }
        match self.source.next() {
            None => {
                self.exhausted = true;
                Ok(None)
            }
            Some(Err(err)) => {
                self.failure = Some(err.clone());
                Err(err)
            }
            Some(Ok(reference)) => {
                self.scanned += 1;
                let name = reference.name().to_string();
                trace!(module = %name, position = self.scanned, "Scanned module");
                self.cache.entry(name.clone()).or_insert(reference);
                Ok(Some(name))
            }
        }
    }
}

/// Finder over a lazily consumed source of modules.
///
/// The source is read only as far as needed to answer a query; everything
/// read is cached so later queries never rescan. The cursor only moves
/// forward. When two entries share a name, the first one wins.
///
/// A source error is sticky: every later query that needs to read past it
/// fails with the same error.
pub struct ScanningFinder<S> {
    state: Mutex<ScanState<S>>,
}

impl<S> ScanningFinder<S>
where
    S: Iterator<Item = Result<ModuleReference>>,
{
    pub fn new<I>(source: I) -> Self
    where
        I: IntoIterator<IntoIter = S>,
    {
        Self {
            state: Mutex::new(ScanState {
                source: source.into_iter(),
                exhausted: false,
                failure: None,
                scanned: 0,
                cache: IndexMap::new(),
            }),
        }
    }

    /// Number of source entries consumed so far.
    pub fn scanned(&self) -> usize {
        self.state.lock().scanned
    }
}

impl<S> ModuleFinder for ScanningFinder<S>
where
    S: Iterator<Item = Result<ModuleReference>>,
{
    fn find(&self, name: &str) -> Result<Option<ModuleReference>> {
        let mut state = self.state.lock();
        if let Some(reference) = state.cache.get(name) {
            return Ok(Some(reference.clone()));
        }
        while let Some(scanned) = state.advance()? {
            if scanned == name {
                return Ok(state.cache.get(name).cloned());
            }
        }
        Ok(None)
    }

    fn find_all(&self) -> Result<Vec<ModuleReference>> {
        let mut state = self.state.lock();
        while state.advance()?.is_some() {}
        Ok(state.cache.values().cloned().collect())
    }
}

impl<S> std::fmt::Debug for ScanningFinder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ScanningFinder")
            .field("scanned", &state.scanned)
            .field("exhausted", &state.exhausted)
            .finish()
    }
}
