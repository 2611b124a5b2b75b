//! Module references and readers.
//!
//! A [`ModuleReference`] ties a descriptor to where its content lives and how
//! to read it. Finders produce references; configurations keep them.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;
use std::sync::Arc;

use crate::descriptor::ModuleDescriptor;
use crate::hashing::{self, HashFn};

/// Access to the resources of a module's content.
///
/// A reader is acquired with [`ModuleReference::open`] and released when it is
/// dropped.
pub trait ModuleReader: Send {
    /// Reads the named resource, `None` when the module has no such resource.
    fn read(&mut self, name: &str) -> io::Result<Option<Vec<u8>>>;

    /// Names of every resource in the module.
    fn list(&self) -> io::Result<Vec<String>>;
}

/// Opens a fresh [`ModuleReader`] over a module's content.
pub type ReaderFactory = Arc<dyn Fn() -> io::Result<Box<dyn ModuleReader>> + Send + Sync>;

/// Reader over resources held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReader {
    resources: Arc<BTreeMap<String, Arc<[u8]>>>,
}

impl InMemoryReader {
    pub fn new(resources: Arc<BTreeMap<String, Arc<[u8]>>>) -> Self {
        Self { resources }
    }
}

impl ModuleReader for InMemoryReader {
    fn read(&mut self, name: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.resources.get(name).map(|bytes| bytes.to_vec()))
    }

    fn list(&self) -> io::Result<Vec<String>> {
        Ok(self.resources.keys().cloned().collect())
    }
}

fn empty_reader_factory() -> ReaderFactory {
    Arc::new(|| Ok(Box::new(InMemoryReader::default()) as Box<dyn ModuleReader>))
}

/// A located module: descriptor, location, content access, and hashing.
///
/// Two references are equal when they have equal descriptors and locations,
/// share the same reader factory and hash function, and agree on the patched
/// flag.
#[derive(Clone)]
pub struct ModuleReference {
    descriptor: Arc<ModuleDescriptor>,
    location: Option<String>,
    reader: ReaderFactory,
    hasher: Option<HashFn>,
    patched: bool,
}

impl ModuleReference {
    /// Creates a reference with no location, no content, and no hasher.
    pub fn new(descriptor: ModuleDescriptor) -> Self {
        Self::from_arc(Arc::new(descriptor))
    }

    pub fn from_arc(descriptor: Arc<ModuleDescriptor>) -> Self {
        Self {
            descriptor,
            location: None,
            reader: empty_reader_factory(),
            hasher: None,
            patched: false,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_reader<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> io::Result<Box<dyn ModuleReader>> + Send + Sync + 'static,
    {
        self.reader = Arc::new(factory);
        self
    }

    pub fn with_hasher(mut self, hasher: HashFn) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Backs the reference with in-memory resources.
    ///
    /// Installs both a reader over the resources and a hash function over
    /// their names and bytes.
    pub fn with_resources<I, N, B>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: Into<Arc<[u8]>>,
    {
        let resources: Arc<BTreeMap<String, Arc<[u8]>>> = Arc::new(
            resources
                .into_iter()
                .map(|(name, bytes)| (name.into(), bytes.into()))
                .collect(),
        );
        self.hasher = Some(hashing::resources_hasher(Arc::clone(&resources)));
        self.reader = Arc::new(move || {
            Ok(Box::new(InMemoryReader::new(Arc::clone(&resources))) as Box<dyn ModuleReader>)
        });
        self
    }

    /// Marks the module as patched; recorded hashes are not checked against
    /// patched modules.
    pub fn patched(mut self) -> Self {
        self.patched = true;
        self
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub(crate) fn descriptor_arc(&self) -> &Arc<ModuleDescriptor> {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn is_patched(&self) -> bool {
        self.patched
    }

    /// Opens a reader over the module content.
    pub fn open(&self) -> io::Result<Box<dyn ModuleReader>> {
        (self.reader)()
    }

    /// Hash of the module content, `None` when it cannot be computed.
    pub fn compute_hash(&self, algorithm: &str) -> Option<Vec<u8>> {
        self.hasher.as_ref().and_then(|hasher| hasher(algorithm))
    }
}

fn same_hasher(a: &Option<HashFn>, b: &Option<HashFn>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
        (None, None) => true,
        _ => false,
    }
}

impl PartialEq for ModuleReference {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor
            && self.location == other.location
            && std::ptr::addr_eq(Arc::as_ptr(&self.reader), Arc::as_ptr(&other.reader))
            && same_hasher(&self.hasher, &other.hasher)
            && self.patched == other.patched
    }
}

impl Eq for ModuleReference {}

impl Hash for ModuleReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.descriptor.hash(state);
        self.location.hash(state);
        (Arc::as_ptr(&self.reader) as *const () as usize).hash(state);
        self.patched.hash(state);
    }
}

impl fmt::Debug for ModuleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleReference")
            .field("name", &self.name())
            .field("location", &self.location)
            .field("hasher", &self.hasher.is_some())
            .field("patched", &self.patched)
            .finish()
    }
}

impl fmt::Display for ModuleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "[module {}, location={}]", self.name(), location),
            None => write!(f, "[module {}]", self.name()),
        }
    }
}
