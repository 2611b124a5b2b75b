//! Content hashing and recorded dependence hashes.
//!
//! A module can record the hash of each module it was built against. When a
//! configuration is checked, the resolver recomputes those hashes through the
//! dependences' [`ModuleReference`]s and fails on a mismatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::reference::ModuleReference;

/// Name of the only digest algorithm understood by the built-in hashers.
pub const SHA_256: &str = "SHA-256";

/// Computes the hash of a module's content for an algorithm name, or `None`
/// when the algorithm is unsupported or the content is unavailable.
pub type HashFn = Arc<dyn Fn(&str) -> Option<Vec<u8>> + Send + Sync>;

/// Hashes `bytes` with `algorithm`; `None` for unsupported algorithms.
pub fn digest(algorithm: &str, bytes: &[u8]) -> Option<Vec<u8>> {
    if algorithm.eq_ignore_ascii_case(SHA_256) {
        Some(Sha256::digest(bytes).to_vec())
    } else {
        None
    }
}

/// Builds a hash function over a fixed blob of module content.
pub fn content_hasher(content: impl Into<Arc<[u8]>>) -> HashFn {
    let content: Arc<[u8]> = content.into();
    Arc::new(move |algorithm| digest(algorithm, &content))
}

/// Hash function over a set of named resources.
///
/// Resources are fed in name order with length prefixes, so two modules hash
/// equal only when they hold the same resources with the same bytes.
pub(crate) fn resources_hasher(resources: Arc<BTreeMap<String, Arc<[u8]>>>) -> HashFn {
    Arc::new(move |algorithm| {
        if !algorithm.eq_ignore_ascii_case(SHA_256) {
            return None;
        }
        let mut hasher = Sha256::new();
        for (name, bytes) in resources.iter() {
            hasher.update((name.len() as u64).to_be_bytes());
            hasher.update(name.as_bytes());
            hasher.update((bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        }
        Some(hasher.finalize().to_vec())
    })
}

/// Hashes recorded in a module for the modules it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleHashes {
    algorithm: String,
    hashes: BTreeMap<String, Vec<u8>>,
}

impl ModuleHashes {
    pub fn new<I>(algorithm: impl Into<String>, hashes: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        Self {
            algorithm: algorithm.into(),
            hashes: hashes.into_iter().collect(),
        }
    }

    /// Computes the hashes of `references` with `algorithm`.
    ///
    /// Returns `None` if any reference cannot produce a hash.
    pub fn generate<'r, I>(algorithm: &str, references: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'r ModuleReference>,
    {
        let mut hashes = BTreeMap::new();
        for reference in references {
            let hash = reference.compute_hash(algorithm)?;
            hashes.insert(reference.name().to_string(), hash);
        }
        Some(Self {
            algorithm: algorithm.to_string(),
            hashes,
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Names of the modules with a recorded hash, in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hashes.keys().map(String::as_str)
    }

    pub fn hash_for(&self, name: &str) -> Option<&[u8]> {
        self.hashes.get(name).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.hashes
            .iter()
            .map(|(name, hash)| (name.as_str(), hash.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
