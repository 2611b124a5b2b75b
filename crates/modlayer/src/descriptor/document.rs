//! Serialized descriptor documents.
//!
//! A [`DescriptorDocument`] is the on-disk form of a [`ModuleDescriptor`]. It
//! is plain serde data, so it can be embedded in larger TOML or JSON files,
//! and converting it back into a descriptor runs every builder check.
//!
//! ```
//! use modlayer::descriptor::document::{DecodeOptions, decode};
//!
//! let bytes = br#"{
//!     "format": "modlayer-descriptor",
//!     "format_version": 1,
//!     "name": "m1",
//!     "requires": [{ "name": "m2", "modifiers": ["transitive"] }],
//!     "exports": [{ "package": "p" }]
//! }"#;
//! let descriptor = decode(bytes, &DecodeOptions::default())?;
//! assert_eq!(descriptor.name(), "m1");
//! # Ok::<(), modlayer::DescriptorError>(())
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ModuleDescriptor, Requires, RequiresModifier};
use crate::error::DescriptorError;
use crate::hashing::ModuleHashes;
use crate::version::Version;

/// Value of the `format` field in every encoded document.
pub const DOCUMENT_FORMAT: &str = "modlayer-descriptor";

/// The only document format version this crate reads and writes.
pub const DOCUMENT_FORMAT_VERSION: u32 = 1;

/// Options applied when turning a document into a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// When set, every explicit module other than the base module must
    /// declare a dependence on it.
    pub base_module: Option<String>,
}

impl DecodeOptions {
    pub fn with_base_module(base: impl Into<String>) -> Self {
        Self {
            base_module: Some(base.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequiresDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<RequiresModifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiled_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportsDocument {
    pub package: String,
    /// Empty for an unqualified export.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpensDocument {
    pub package: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidesDocument {
    pub service: String,
    pub providers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HashesDocument {
    pub algorithm: String,
    /// Module name to lowercase hex digest.
    pub modules: BTreeMap<String, String>,
}

/// Serialized form of a [`ModuleDescriptor`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<u32>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub open: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub automatic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub synthetic: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<RequiresDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<ExportsDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opens: Vec<OpensDocument>,
    /// Full package list; when absent it is derived from the exports and
    /// opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<ProvidesDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashes: Option<HashesDocument>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Decodes a JSON descriptor document.
///
/// The document must carry the format marker and a supported format version.
pub fn decode(
    bytes: &[u8],
    options: &DecodeOptions,
) -> Result<ModuleDescriptor, DescriptorError> {
    let document: DescriptorDocument =
        serde_json::from_slice(bytes).map_err(|e| DescriptorError::Malformed(e.to_string()))?;
    match document.format.as_deref() {
        Some(DOCUMENT_FORMAT) => {}
        other => {
            return Err(DescriptorError::BadFormat {
                expected: DOCUMENT_FORMAT,
                found: other.unwrap_or("<missing>").to_string(),
            });
        }
    }
    match document.format_version {
        Some(DOCUMENT_FORMAT_VERSION) => {}
        other => {
            return Err(DescriptorError::UnsupportedFormatVersion {
                version: other.unwrap_or(0),
            });
        }
    }
    document.to_descriptor(options)
}

impl DescriptorDocument {
    /// Converts the document into a descriptor, applying every builder check.
    ///
    /// Unlike [`decode`], the format marker and version are optional here so
    /// documents embedded in manifests can omit them; when present they are
    /// still checked.
    pub fn to_descriptor(
        &self,
        options: &DecodeOptions,
    ) -> Result<ModuleDescriptor, DescriptorError> {
        if let Some(format) = self.format.as_deref() {
            if format != DOCUMENT_FORMAT {
                return Err(DescriptorError::BadFormat {
                    expected: DOCUMENT_FORMAT,
                    found: format.to_string(),
                });
            }
        }
        if let Some(version) = self.format_version {
            if version != DOCUMENT_FORMAT_VERSION {
                return Err(DescriptorError::UnsupportedFormatVersion { version });
            }
        }

        let name = self.name.as_str();
        let mut builder = match (self.open, self.automatic) {
            (true, true) => {
                return Err(DescriptorError::OpenAutomaticModule {
                    module: self.name.clone(),
                });
            }
            (true, false) => ModuleDescriptor::open_module(name)?,
            (false, true) => ModuleDescriptor::automatic(name)?,
            (false, false) => ModuleDescriptor::builder(name)?,
        };
        if self.synthetic {
            builder = builder.synthetic();
        }

        for requires in &self.requires {
            let modifiers = requires.modifiers.iter().copied();
            let mut spec = Requires::new(modifiers, requires.name.as_str());
            if let Some(version) = &requires.compiled_version {
                spec = spec.with_compiled_version(Version::parse(version)?);
            }
            builder = builder.requires_spec(spec)?;
        }

        if let Some(base) = &options.base_module {
            let requires_base = self.requires.iter().any(|r| &r.name == base);
            if !self.automatic && &self.name != base && !requires_base {
                return Err(DescriptorError::MissingBaseDependence {
                    module: self.name.clone(),
                    base: base.clone(),
                });
            }
        }

        for export in &self.exports {
            builder = if export.targets.is_empty() {
                builder.exports(export.package.as_str())?
            } else {
                let targets = export.targets.iter().map(String::as_str);
                builder.exports_to(export.package.as_str(), targets)?
            };
        }
        for opens in &self.opens {
            builder = if opens.targets.is_empty() {
                builder.opens(opens.package.as_str())?
            } else {
                let targets = opens.targets.iter().map(String::as_str);
                builder.opens_to(opens.package.as_str(), targets)?
            };
        }

        if let Some(packages) = &self.packages {
            if let Some(missing) = self.exports.iter().find(|e| !packages.contains(&e.package)) {
                return Err(DescriptorError::PackagesMissingExport {
                    module: self.name.clone(),
                    package: missing.package.clone(),
                });
            }
            if let Some(missing) = self.opens.iter().find(|o| !packages.contains(&o.package)) {
                return Err(DescriptorError::PackagesMissingOpens {
                    module: self.name.clone(),
                    package: missing.package.clone(),
                });
            }
            builder = builder.packages(packages.iter().map(String::as_str))?;
        }

        for service in &self.uses {
            builder = builder.uses(service.as_str())?;
        }
        for provides in &self.provides {
            builder = builder.provides(
                provides.service.as_str(),
                provides.providers.iter().map(String::as_str),
            )?;
        }

        if let Some(version) = &self.version {
            builder = builder.version_str(version)?;
        }
        if let Some(main_class) = &self.main_class {
            builder = builder.main_class(main_class.as_str())?;
        }
        if let Some(os_name) = &self.os_name {
            builder = builder.os_name(os_name.as_str())?;
        }
        if let Some(os_arch) = &self.os_arch {
            builder = builder.os_arch(os_arch.as_str())?;
        }
        if let Some(os_version) = &self.os_version {
            builder = builder.os_version(os_version.as_str())?;
        }
        if let Some(hashes) = &self.hashes {
            builder = builder.hashes(decode_hashes(hashes)?)?;
        }

        Ok(builder.build())
    }

    /// Encodes the document as pretty-printed JSON, stamping the format
    /// marker and version.
    pub fn encode(&self) -> Result<Vec<u8>, DescriptorError> {
        let mut document = self.clone();
        document.format = Some(DOCUMENT_FORMAT.to_string());
        document.format_version = Some(DOCUMENT_FORMAT_VERSION);
        serde_json::to_vec_pretty(&document)
            .map_err(|e| DescriptorError::Malformed(e.to_string()))
    }
}

fn decode_hashes(document: &HashesDocument) -> Result<ModuleHashes, DescriptorError> {
    let mut hashes = Vec::with_capacity(document.modules.len());
    for (name, digest) in &document.modules {
        let bytes = hex::decode(digest).map_err(|e| DescriptorError::InvalidHash {
            dependence: name.clone(),
            reason: e.to_string(),
        })?;
        hashes.push((name.clone(), bytes));
    }
    Ok(ModuleHashes::new(document.algorithm.as_str(), hashes))
}

impl From<&ModuleDescriptor> for DescriptorDocument {
    fn from(descriptor: &ModuleDescriptor) -> Self {
        let requires = descriptor
            .requires()
            .map(|r| RequiresDocument {
                name: r.name().to_string(),
                modifiers: r.modifiers().iter().copied().collect(),
                compiled_version: r.compiled_version().map(ToString::to_string),
            })
            .collect();
        let exports = descriptor
            .exports()
            .map(|e| ExportsDocument {
                package: e.source().to_string(),
                targets: e.targets().iter().cloned().collect(),
            })
            .collect();
        let opens = descriptor
            .opens()
            .map(|o| OpensDocument {
                package: o.source().to_string(),
                targets: o.targets().iter().cloned().collect(),
            })
            .collect();
        let provides = descriptor
            .provides()
            .map(|p| ProvidesDocument {
                service: p.service().to_string(),
                providers: p.providers().to_vec(),
            })
            .collect();
        let hashes = descriptor.hashes().map(|h| HashesDocument {
            algorithm: h.algorithm().to_string(),
            modules: h
                .iter()
                .map(|(name, hash)| (name.to_string(), hex::encode(hash)))
                .collect(),
        });

        Self {
            format: Some(DOCUMENT_FORMAT.to_string()),
            format_version: Some(DOCUMENT_FORMAT_VERSION),
            name: descriptor.name().to_string(),
            version: descriptor.version().map(ToString::to_string),
            open: descriptor.is_open(),
            automatic: descriptor.is_automatic(),
            synthetic: descriptor.is_synthetic(),
            requires,
            exports,
            opens,
            packages: Some(descriptor.packages().iter().cloned().collect()),
            uses: descriptor.uses().iter().cloned().collect(),
            provides,
            main_class: descriptor.main_class().map(str::to_string),
            os_name: descriptor.os_name().map(str::to_string),
            os_arch: descriptor.os_arch().map(str::to_string),
            os_version: descriptor.os_version().map(str::to_string),
            hashes,
        }
    }
}

impl ModuleDescriptor {
    /// Decodes a JSON descriptor document with default options.
    pub fn read(bytes: &[u8]) -> Result<ModuleDescriptor, DescriptorError> {
        decode(bytes, &DecodeOptions::default())
    }
}
