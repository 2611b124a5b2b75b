//! File-based manifest discovery
//!
//! Handles finding and loading resolution manifests from the filesystem.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::manifest::ResolutionManifest;

/// Manifest file names, in lookup order.
pub const MANIFEST_FILES: [&str; 2] = ["modlayer.toml", "modlayer.json"];

/// File-based manifest discovery
///
/// Library users building manifests in code should use
/// [`ResolutionManifest::from_value`] directly.
///
/// # Example
///
/// ```no_run
/// use modlayer_config::ManifestDiscovery;
///
/// let manifest = ManifestDiscovery::new(".").load().unwrap();
/// let layers = manifest.resolve().unwrap();
/// ```
pub struct ManifestDiscovery {
    root: PathBuf,
}

impl ManifestDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a manifest in the root directory
    ///
    /// Searches in this order:
    /// 1. modlayer.toml
    /// 2. modlayer.json
    pub fn find(&self) -> Option<PathBuf> {
        MANIFEST_FILES
            .iter()
            .map(|file| self.root.join(file))
            .find(|path| path.is_file())
    }

    /// Load the discovered manifest
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no manifest is found.
    pub fn load(&self) -> Result<ResolutionManifest> {
        let path = self.find().ok_or_else(|| ConfigError::NotFound {
            root: self.root.clone(),
        })?;
        debug!(path = %path.display(), "loading manifest");
        ResolutionManifest::load(&path)
    }

    /// Load the discovered manifest with profile merging
    pub fn load_with_profile(&self, profile: &str) -> Result<ResolutionManifest> {
        self.load()?.materialize_profile(Some(profile))
    }
}

/// Discover and load a manifest from the current directory (convenience function)
pub fn discover() -> Result<ResolutionManifest> {
    let root = std::env::current_dir()?;
    ManifestDiscovery::new(&root).load()
}

/// Discover and load a manifest with profile (convenience function)
pub fn discover_with_profile(profile: &str) -> Result<ResolutionManifest> {
    let root = std::env::current_dir()?;
    ManifestDiscovery::new(&root).load_with_profile(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn find_returns_none_when_no_manifest() {
        let dir = TempDir::new().unwrap();
        assert!(ManifestDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    fn toml_is_preferred_over_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("modlayer.json"), "{}").unwrap();
        fs::write(dir.path().join("modlayer.toml"), "").unwrap();

        let found = ManifestDiscovery::new(dir.path()).find().unwrap();
        assert_eq!(found, dir.path().join("modlayer.toml"));
    }

    #[test]
    fn load_returns_not_found_when_no_manifest() {
        let dir = TempDir::new().unwrap();
        let result = ManifestDiscovery::new(dir.path()).load();
        assert!(matches!(result.unwrap_err(), ConfigError::NotFound { .. }));
    }

    #[test]
    fn directory_named_like_a_manifest_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("modlayer.toml")).unwrap();
        assert!(ManifestDiscovery::new(dir.path()).find().is_none());
    }
}
