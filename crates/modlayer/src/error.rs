//! Error types for descriptor construction, module lookup, and resolution.
//!
//! Three kinds are kept apart so callers can tell "a declaration is invalid"
//! from "a module could not be located" from "everything was located but the
//! graph is invalid". Messages name the offending modules and packages and are
//! stable: tests match on them.

use thiserror::Error;

/// Result type alias for modlayer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for every fallible modlayer operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A descriptor violated a builder invariant or could not be decoded.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// A module could not be located by any finder, or a finder failed.
    #[error(transparent)]
    Find(#[from] FindError),

    /// The module graph was fully populated but is invalid.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl Error {
    pub fn is_descriptor(&self) -> bool {
        matches!(self, Error::Descriptor(_))
    }

    pub fn is_find(&self) -> bool {
        matches!(self, Error::Find(_))
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, Error::Resolution(_))
    }
}

/// Errors raised while parsing a version string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Empty version string")]
    Empty,

    #[error("{0}: Version string does not start with a number")]
    NoLeadingDigit(String),

    #[error("{0}: Empty pre-release")]
    EmptyPreRelease(String),

    #[error("{0}: Empty build")]
    EmptyBuild(String),

    #[error("{0}: Numeric component too large")]
    NumberTooLarge(String),
}

/// Builder invariant violations and descriptor decode failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("{name}: Invalid {kind} name: {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    #[error("Module {module} declares a dependence on itself")]
    SelfDependence { module: String },

    #[error("Dependence upon {dependence} already declared by {module}")]
    DuplicateRequires { module: String, dependence: String },

    #[error("Exported package {package} already declared")]
    PackageAlreadyExported { package: String },

    #[error("Package {package} already declared as concealed")]
    PackageAlreadyConcealed { package: String },

    #[error("Open package {package} already declared")]
    PackageAlreadyOpened { package: String },

    #[error("Empty target set for qualified directive on package {package}")]
    EmptyTargets { package: String },

    #[error("Open module {module} cannot declare open packages")]
    OpenModuleDeclaresOpens { module: String },

    #[error("Dependence upon service {service} already declared")]
    DuplicateUses { service: String },

    #[error("Providers of service {service} already declared")]
    DuplicateProvides { service: String },

    #[error("Empty providers set for service {service}")]
    EmptyProviders { service: String },

    #[error("Provider {provider} of service {service} declared more than once")]
    DuplicateProvider { service: String, provider: String },

    #[error("{attribute} already set")]
    AttributeAlreadySet { attribute: &'static str },

    #[error("{attribute} is empty")]
    EmptyAttribute { attribute: &'static str },

    #[error("Automatic module {module} cannot declare {directive}")]
    AutomaticModuleDeclares {
        module: String,
        directive: &'static str,
    },

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] VersionError),

    #[error("Bad descriptor format marker: expected {expected}, found {found}")]
    BadFormat {
        expected: &'static str,
        found: String,
    },

    #[error("Unsupported descriptor format version {version}")]
    UnsupportedFormatVersion { version: u32 },

    #[error("Malformed descriptor document: {0}")]
    Malformed(String),

    #[error("Module {module} does not require the mandatory base module {base}")]
    MissingBaseDependence { module: String, base: String },

    #[error("Package {package} exported by {module} is missing from its package list")]
    PackagesMissingExport { module: String, package: String },

    #[error("Package {package} opened by {module} is missing from its package list")]
    PackagesMissingOpens { module: String, package: String },

    #[error("Module {module} cannot be both open and automatic")]
    OpenAutomaticModule { module: String },

    #[error("Invalid hash recorded for {dependence}: {reason}")]
    InvalidHash { dependence: String, reason: String },
}

/// A module could not be located.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FindError {
    #[error("Module {name} not found")]
    ModuleNotFound { name: String },

    #[error("Module {name} not found, required by {required_by}")]
    RequiredModuleNotFound { name: String, required_by: String },

    #[error("Module finder failed: {0}")]
    Finder(String),
}

/// The resolved graph violates a consistency rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Modules {first} and {second} export package {package} to module {reader}")]
    TwoSuppliers {
        reader: String,
        package: String,
        first: String,
        second: String,
    },

    #[error(
        "Module {reader} contains package {package}, module {exporter} exports package {package} to {reader}"
    )]
    ContainsAndReadsPackage {
        reader: String,
        package: String,
        exporter: String,
    },

    #[error("Module {module} reads another module named {module}")]
    ReadsModuleWithOwnName { module: String },

    #[error("Module {module} reads more than one module named {name}")]
    ReadsSameNameTwice { module: String, name: String },

    #[error("Module {module} does not read a module that exports {package}")]
    ServiceTypeNotReadable { module: String, package: String },

    #[error("Hash of {dependence} ({actual}) differs to expected hash ({expected}) recorded in {module}")]
    HashMismatch {
        module: String,
        dependence: String,
        expected: String,
        actual: String,
    },

    #[error("Unable to compute the hash of module {dependence}")]
    HashUnavailable {
        dependence: String,
        algorithm: String,
    },

    #[error(
        "Module {module} has constraints on target platform that conflict with other modules: {current}, {requested}"
    )]
    TargetConflict {
        module: String,
        current: String,
        requested: String,
    },

    #[error("Parents have conflicting constraints on target {attribute}: {first}, {second}")]
    ParentTargetConflict {
        attribute: &'static str,
        first: String,
        second: String,
    },

    #[error("No parent configurations specified")]
    NoParents,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_joins_path() {
        let err = ResolutionError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Cycle detected: a -> b -> a");
    }

    #[test]
    fn kinds_are_distinguishable() {
        let find: Error = FindError::ModuleNotFound { name: "m1".into() }.into();
        let resolution: Error = ResolutionError::NoParents.into();
        assert!(find.is_find() && !find.is_resolution());
        assert!(resolution.is_resolution() && !resolution.is_find());
        assert_eq!(find.to_string(), "Module m1 not found");
    }
}
