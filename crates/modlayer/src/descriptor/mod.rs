//! Module descriptors.
//!
//! A [`ModuleDescriptor`] is the immutable declaration of one module: its
//! dependences, exported, opened and concealed packages, the services it uses
//! and provides, and a handful of optional attributes. Descriptors are built with
//! [`ModuleDescriptorBuilder`], which enforces every structural invariant, or
//! decoded from a [`DescriptorDocument`].

mod builder;
pub mod document;
pub(crate) mod names;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hashing::ModuleHashes;
use crate::version::Version;

pub use builder::ModuleDescriptorBuilder;
pub use document::{DecodeOptions, DescriptorDocument};

/// Modifier on a `requires` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiresModifier {
    /// Readers of the requiring module also read the dependence.
    Transitive,
    /// Mandatory at compile time, optional at run time.
    Static,
    Synthetic,
    Mandated,
}

impl RequiresModifier {
    pub fn as_str(self) -> &'static str {
        match self {
            RequiresModifier::Transitive => "transitive",
            RequiresModifier::Static => "static",
            RequiresModifier::Synthetic => "synthetic",
            RequiresModifier::Mandated => "mandated",
        }
    }
}

impl fmt::Display for RequiresModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dependence on another module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Requires {
    name: String,
    modifiers: BTreeSet<RequiresModifier>,
    compiled_version: Option<Version>,
}

impl Requires {
    pub fn new<I>(modifiers: I, name: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = RequiresModifier>,
    {
        Self {
            name: name.into(),
            modifiers: modifiers.into_iter().collect(),
            compiled_version: None,
        }
    }

    /// Records the version of the dependence the module was compiled against.
    pub fn with_compiled_version(mut self, version: Version) -> Self {
        self.compiled_version = Some(version);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modifiers(&self) -> &BTreeSet<RequiresModifier> {
        &self.modifiers
    }

    pub fn compiled_version(&self) -> Option<&Version> {
        self.compiled_version.as_ref()
    }

    pub fn is_transitive(&self) -> bool {
        self.modifiers.contains(&RequiresModifier::Transitive)
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.contains(&RequiresModifier::Static)
    }
}

impl fmt::Display for Requires {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{modifier} ")?;
        }
        f.write_str(&self.name)?;
        if let Some(version) = &self.compiled_version {
            write!(f, " (@{version})")?;
        }
        Ok(())
    }
}

/// An exported package, qualified when `targets` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Exports {
    source: String,
    targets: BTreeSet<String>,
}

impl Exports {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn targets(&self) -> &BTreeSet<String> {
        &self.targets
    }

    pub fn is_qualified(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Whether this export makes the package visible to `module`.
    pub fn is_exported_to(&self, module: &str) -> bool {
        self.targets.is_empty() || self.targets.contains(module)
    }
}

impl fmt::Display for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)?;
        if self.is_qualified() {
            write!(f, " to {}", join(&self.targets))?;
        }
        Ok(())
    }
}

/// A package opened for deep reflection, qualified when `targets` is
/// non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opens {
    source: String,
    targets: BTreeSet<String>,
}

impl Opens {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn targets(&self) -> &BTreeSet<String> {
        &self.targets
    }

    pub fn is_qualified(&self) -> bool {
        !self.targets.is_empty()
    }

    pub fn is_open_to(&self, module: &str) -> bool {
        self.targets.is_empty() || self.targets.contains(module)
    }
}

impl fmt::Display for Opens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)?;
        if self.is_qualified() {
            write!(f, " to {}", join(&self.targets))?;
        }
        Ok(())
    }
}

/// Implementations of a service offered by a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Provides {
    service: String,
    providers: Vec<String>,
}

impl Provides {
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Provider class names in declaration order.
    pub fn providers(&self) -> &[String] {
        &self.providers
    }
}

impl fmt::Display for Provides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} with {}", self.service, join(&self.providers))
    }
}

fn join<'a, I, T>(items: I) -> String
where
    I: IntoIterator<Item = &'a T>,
    T: fmt::Display + 'a + ?Sized,
{
    let parts: Vec<String> = items.into_iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

/// The immutable declaration of a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleDescriptor {
    name: String,
    version: Option<Version>,
    open: bool,
    automatic: bool,
    synthetic: bool,
    requires: BTreeMap<String, Requires>,
    exports: BTreeMap<String, Exports>,
    opens: BTreeMap<String, Opens>,
    uses: BTreeSet<String>,
    provides: BTreeMap<String, Provides>,
    packages: BTreeSet<String>,
    main_class: Option<String>,
    os_name: Option<String>,
    os_arch: Option<String>,
    os_version: Option<String>,
    hashes: Option<ModuleHashes>,
}

impl ModuleDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// An open module declares no `opens` but has every package open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_automatic(&self) -> bool {
        self.automatic
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Dependences in name order.
    pub fn requires(&self) -> impl ExactSizeIterator<Item = &Requires> + '_ {
        self.requires.values()
    }

    /// Exports in package order.
    pub fn exports(&self) -> impl ExactSizeIterator<Item = &Exports> + '_ {
        self.exports.values()
    }

    /// Opened packages in package order. Always empty for an open module.
    pub fn opens(&self) -> impl ExactSizeIterator<Item = &Opens> + '_ {
        self.opens.values()
    }

    pub fn uses(&self) -> &BTreeSet<String> {
        &self.uses
    }

    /// Provided services in service-name order.
    pub fn provides(&self) -> impl ExactSizeIterator<Item = &Provides> + '_ {
        self.provides.values()
    }

    /// Every package in the module: exported, opened and concealed.
    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }

    /// Packages that are neither exported nor opened.
    pub fn concealed_packages(&self) -> impl Iterator<Item = &str> + '_ {
        self.packages
            .iter()
            .filter(|p| !self.exports.contains_key(*p) && !self.opens.contains_key(*p))
            .map(String::as_str)
    }

    pub fn main_class(&self) -> Option<&str> {
        self.main_class.as_deref()
    }

    pub fn os_name(&self) -> Option<&str> {
        self.os_name.as_deref()
    }

    pub fn os_arch(&self) -> Option<&str> {
        self.os_arch.as_deref()
    }

    pub fn os_version(&self) -> Option<&str> {
        self.os_version.as_deref()
    }

    pub fn hashes(&self) -> Option<&ModuleHashes> {
        self.hashes.as_ref()
    }

    /// `name@version`, or just `name` when unversioned.
    pub fn to_name_and_version(&self) -> String {
        match &self.version {
            Some(version) => format!("{}@{}", self.name, version),
            None => self.name.clone(),
        }
    }

    /// Orders descriptors by name, then by version with unversioned first.
    pub fn cmp_by_name_and_version(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.open {
            f.write_str("open ")?;
        }
        write!(f, "module {{ name: {}", self.to_name_and_version())?;
        if !self.requires.is_empty() {
            write!(f, ", {}", join(self.requires.values()))?;
        }
        if !self.uses.is_empty() {
            write!(f, ", uses: {}", join(&self.uses))?;
        }
        if !self.exports.is_empty() {
            write!(f, ", exports: {}", join(self.exports.values()))?;
        }
        if !self.opens.is_empty() {
            write!(f, ", opens: {}", join(self.opens.values()))?;
        }
        if !self.provides.is_empty() {
            write!(f, ", provides: {}", join(self.provides.values()))?;
        }
        f.write_str(" }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_directives() {
        let descriptor = ModuleDescriptor::builder("m1")
            .unwrap()
            .requires_with([RequiresModifier::Transitive], "m2")
            .unwrap()
            .exports("p")
            .unwrap()
            .uses("q.S")
            .unwrap()
            .version_str("1.0")
            .unwrap()
            .build();
        assert_eq!(
            descriptor.to_string(),
            "module { name: m1@1.0, [transitive m2], uses: [q.S], exports: [p] }"
        );
        assert_eq!(descriptor.to_name_and_version(), "m1@1.0");
    }

    #[test]
    fn ordering_by_name_then_version() {
        let unversioned = ModuleDescriptor::builder("a").unwrap().build();
        let v1 = ModuleDescriptor::builder("a")
            .unwrap()
            .version_str("1")
            .unwrap()
            .build();
        let b = ModuleDescriptor::builder("b").unwrap().build();
        assert_eq!(unversioned.cmp_by_name_and_version(&v1), Ordering::Less);
        assert_eq!(v1.cmp_by_name_and_version(&b), Ordering::Less);
    }

    #[test]
    fn qualified_export_display() {
        let descriptor = ModuleDescriptor::builder("m1")
            .unwrap()
            .exports_to("p", ["m3", "m2"])
            .unwrap()
            .build();
        let export = descriptor.exports().next().unwrap();
        assert!(export.is_qualified());
        assert!(export.is_exported_to("m2"));
        assert!(!export.is_exported_to("m4"));
        assert_eq!(export.to_string(), "p to [m2, m3]");
    }

    #[test]
    fn display_marks_open_modules_and_lists_opens() {
        let open = ModuleDescriptor::open_module("m1")
            .unwrap()
            .exports("p")
            .unwrap()
            .build();
        assert!(open.is_open());
        assert_eq!(open.to_string(), "open module { name: m1, exports: [p] }");

        let descriptor = ModuleDescriptor::builder("m2")
            .unwrap()
            .opens_to("q", ["m3"])
            .unwrap()
            .opens("r")
            .unwrap()
            .build();
        assert!(!descriptor.is_open());
        assert_eq!(descriptor.to_string(), "module { name: m2, opens: [q to [m3], r] }");
        let opened: Vec<&Opens> = descriptor.opens().collect();
        assert!(opened[0].is_qualified());
        assert!(opened[0].is_open_to("m3"));
        assert!(!opened[0].is_open_to("m4"));
        assert!(opened[1].is_open_to("m4"));
    }
}
