use std::collections::{BTreeMap, BTreeSet};

use super::names::{check_module_name, check_package_name, check_qualified_name};
use super::{Exports, ModuleDescriptor, Opens, Provides, Requires, RequiresModifier};
use crate::error::DescriptorError;
use crate::hashing::ModuleHashes;
use crate::version::Version;

impl ModuleDescriptor {
    /// Starts a builder for an explicit module.
    ///
    /// ```
    /// use modlayer::ModuleDescriptor;
    ///
    /// let m1 = ModuleDescriptor::builder("m1")?
    ///     .requires("m2")?
    ///     .exports("p")?
    ///     .build();
    /// assert_eq!(m1.packages().len(), 1);
    /// # Ok::<(), modlayer::DescriptorError>(())
    /// ```
    pub fn builder(name: impl Into<String>) -> Result<ModuleDescriptorBuilder, DescriptorError> {
        ModuleDescriptorBuilder::new(name.into(), false, false)
    }

    /// Starts a builder for an open module.
    ///
    /// Every package of an open module is open, so the builder rejects
    /// `opens` directives.
    pub fn open_module(
        name: impl Into<String>,
    ) -> Result<ModuleDescriptorBuilder, DescriptorError> {
        ModuleDescriptorBuilder::new(name.into(), true, false)
    }

    /// Starts a builder for an automatic module.
    ///
    /// Automatic modules read every other module and export all of their
    /// packages, so they cannot declare requires, exports, or uses.
    pub fn automatic(name: impl Into<String>) -> Result<ModuleDescriptorBuilder, DescriptorError> {
        ModuleDescriptorBuilder::new(name.into(), false, true)
    }
}

/// Validating builder for [`ModuleDescriptor`].
///
/// Every directive method consumes the builder and returns it again, so calls
/// chain with `?`.
#[derive(Debug, Clone)]
pub struct ModuleDescriptorBuilder {
    name: String,
    open: bool,
    automatic: bool,
    synthetic: bool,
    requires: BTreeMap<String, Requires>,
    exports: BTreeMap<String, Exports>,
    opens: BTreeMap<String, Opens>,
    concealed: BTreeSet<String>,
    uses: BTreeSet<String>,
    provides: BTreeMap<String, Provides>,
    version: Option<Version>,
    main_class: Option<String>,
    os_name: Option<String>,
    os_arch: Option<String>,
    os_version: Option<String>,
    hashes: Option<ModuleHashes>,
}

fn set_once<T>(
    slot: &mut Option<T>,
    attribute: &'static str,
    value: T,
) -> Result<(), DescriptorError> {
    if slot.is_some() {
        return Err(DescriptorError::AttributeAlreadySet { attribute });
    }
    *slot = Some(value);
    Ok(())
}

fn non_empty(attribute: &'static str, value: String) -> Result<String, DescriptorError> {
    if value.is_empty() {
        return Err(DescriptorError::EmptyAttribute { attribute });
    }
    Ok(value)
}

/// Validates the target set of a qualified `exports` or `opens`.
fn qualified_targets<I, S>(
    package: String,
    targets: I,
) -> Result<(String, BTreeSet<String>), DescriptorError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let targets: BTreeSet<String> = targets.into_iter().map(Into::into).collect();
    if targets.is_empty() {
        return Err(DescriptorError::EmptyTargets { package });
    }
    for target in &targets {
        check_module_name(target)?;
    }
    Ok((package, targets))
}

impl ModuleDescriptorBuilder {
    fn new(name: String, open: bool, automatic: bool) -> Result<Self, DescriptorError> {
        check_module_name(&name)?;
        Ok(Self {
            name,
            open,
            automatic,
            synthetic: false,
            requires: BTreeMap::new(),
            exports: BTreeMap::new(),
            opens: BTreeMap::new(),
            concealed: BTreeSet::new(),
            uses: BTreeSet::new(),
            provides: BTreeMap::new(),
            version: None,
            main_class: None,
            os_name: None,
            os_arch: None,
            os_version: None,
            hashes: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn ensure_explicit(&self, directive: &'static str) -> Result<(), DescriptorError> {
        if self.automatic {
            return Err(DescriptorError::AutomaticModuleDeclares {
                module: self.name.clone(),
                directive,
            });
        }
        Ok(())
    }

    /// Marks the descriptor as synthesized rather than declared.
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    /// Declares a plain dependence on `name`.
    pub fn requires(self, name: impl Into<String>) -> Result<Self, DescriptorError> {
        self.requires_spec(Requires::new([], name))
    }

    /// Declares a dependence with modifiers.
    pub fn requires_with<I>(
        self,
        modifiers: I,
        name: impl Into<String>,
    ) -> Result<Self, DescriptorError>
    where
        I: IntoIterator<Item = RequiresModifier>,
    {
        self.requires_spec(Requires::new(modifiers, name))
    }

    /// Declares a fully formed dependence.
    pub fn requires_spec(mut self, requires: Requires) -> Result<Self, DescriptorError> {
        self.ensure_explicit("requires")?;
        check_module_name(requires.name())?;
        if requires.name() == self.name {
            return Err(DescriptorError::SelfDependence {
                module: self.name.clone(),
            });
        }
        if self.requires.contains_key(requires.name()) {
            return Err(DescriptorError::DuplicateRequires {
                module: self.name.clone(),
                dependence: requires.name().to_string(),
            });
        }
        self.requires.insert(requires.name().to_string(), requires);
        Ok(self)
    }

    /// Exports `package` to every module.
    pub fn exports(self, package: impl Into<String>) -> Result<Self, DescriptorError> {
        self.add_export(package.into(), BTreeSet::new())
    }

    /// Exports `package` to the named modules only.
    pub fn exports_to<I, S>(
        self,
        package: impl Into<String>,
        targets: I,
    ) -> Result<Self, DescriptorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (package, targets) = qualified_targets(package.into(), targets)?;
        self.add_export(package, targets)
    }

    fn add_export(
        mut self,
        package: String,
        targets: BTreeSet<String>,
    ) -> Result<Self, DescriptorError> {
        self.ensure_explicit("exports")?;
        check_package_name(&package)?;
        if self.exports.contains_key(&package) {
            return Err(DescriptorError::PackageAlreadyExported { package });
        }
        if self.concealed.contains(&package) {
            return Err(DescriptorError::PackageAlreadyConcealed { package });
        }
        self.exports.insert(
            package.clone(),
            Exports {
                source: package,
                targets,
            },
        );
        Ok(self)
    }

    /// Opens `package` to every module.
    pub fn opens(self, package: impl Into<String>) -> Result<Self, DescriptorError> {
        self.add_opens(package.into(), BTreeSet::new())
    }

    /// Opens `package` to the named modules only.
    pub fn opens_to<I, S>(
        self,
        package: impl Into<String>,
        targets: I,
    ) -> Result<Self, DescriptorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (package, targets) = qualified_targets(package.into(), targets)?;
        self.add_opens(package, targets)
    }

    fn add_opens(
        mut self,
        package: String,
        targets: BTreeSet<String>,
    ) -> Result<Self, DescriptorError> {
        self.ensure_explicit("opens")?;
        if self.open {
            return Err(DescriptorError::OpenModuleDeclaresOpens {
                module: self.name.clone(),
            });
        }
        check_package_name(&package)?;
        if self.opens.contains_key(&package) {
            return Err(DescriptorError::PackageAlreadyOpened { package });
        }
        if self.concealed.contains(&package) {
            return Err(DescriptorError::PackageAlreadyConcealed { package });
        }
        self.opens.insert(
            package.clone(),
            Opens {
                source: package,
                targets,
            },
        );
        Ok(self)
    }

    /// Declares that the module uses `service`.
    pub fn uses(mut self, service: impl Into<String>) -> Result<Self, DescriptorError> {
        self.ensure_explicit("uses")?;
        let service = service.into();
        check_qualified_name("service type", &service)?;
        if !self.uses.insert(service.clone()) {
            return Err(DescriptorError::DuplicateUses { service });
        }
        Ok(self)
    }

    /// Declares providers of `service`, in preference order.
    pub fn provides<I, S>(
        mut self,
        service: impl Into<String>,
        providers: I,
    ) -> Result<Self, DescriptorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let service = service.into();
        check_qualified_name("service type", &service)?;
        if self.provides.contains_key(&service) {
            return Err(DescriptorError::DuplicateProvides { service });
        }
        let mut seen = BTreeSet::new();
        let mut list = Vec::new();
        for provider in providers {
            let provider = provider.into();
            check_qualified_name("provider class", &provider)?;
            if !seen.insert(provider.clone()) {
                return Err(DescriptorError::DuplicateProvider { service, provider });
            }
            list.push(provider);
        }
        if list.is_empty() {
            return Err(DescriptorError::EmptyProviders { service });
        }
        self.provides.insert(
            service.clone(),
            Provides {
                service,
                providers: list,
            },
        );
        Ok(self)
    }

    /// Declares a package that is not exported.
    pub fn conceals(mut self, package: impl Into<String>) -> Result<Self, DescriptorError> {
        let package = package.into();
        check_package_name(&package)?;
        if self.exports.contains_key(&package) {
            return Err(DescriptorError::PackageAlreadyExported { package });
        }
        if self.opens.contains_key(&package) {
            return Err(DescriptorError::PackageAlreadyOpened { package });
        }
        if !self.concealed.insert(package.clone()) {
            return Err(DescriptorError::PackageAlreadyConcealed { package });
        }
        Ok(self)
    }

    /// Declares the full package set of the module.
    ///
    /// Packages already exported, opened or concealed are accepted and kept
    /// as they are; the rest become concealed.
    pub fn packages<I, S>(mut self, packages: I) -> Result<Self, DescriptorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for package in packages {
            let package = package.into();
            check_package_name(&package)?;
            if !self.exports.contains_key(&package) && !self.opens.contains_key(&package) {
                self.concealed.insert(package);
            }
        }
        Ok(self)
    }

    pub fn version(mut self, version: Version) -> Result<Self, DescriptorError> {
        set_once(&mut self.version, "Version", version)?;
        Ok(self)
    }

    /// Parses and sets the module version.
    pub fn version_str(self, version: &str) -> Result<Self, DescriptorError> {
        let version = Version::parse(version)?;
        self.version(version)
    }

    pub fn main_class(mut self, main_class: impl Into<String>) -> Result<Self, DescriptorError> {
        let main_class = main_class.into();
        check_qualified_name("main class", &main_class)?;
        set_once(&mut self.main_class, "Main class", main_class)?;
        Ok(self)
    }

    pub fn os_name(mut self, name: impl Into<String>) -> Result<Self, DescriptorError> {
        let name = non_empty("OS name", name.into())?;
        set_once(&mut self.os_name, "OS name", name)?;
        Ok(self)
    }

    pub fn os_arch(mut self, arch: impl Into<String>) -> Result<Self, DescriptorError> {
        let arch = non_empty("OS arch", arch.into())?;
        set_once(&mut self.os_arch, "OS arch", arch)?;
        Ok(self)
    }

    pub fn os_version(mut self, version: impl Into<String>) -> Result<Self, DescriptorError> {
        let version = non_empty("OS version", version.into())?;
        set_once(&mut self.os_version, "OS version", version)?;
        Ok(self)
    }

    /// Records hashes of the modules this module depends on.
    pub fn hashes(mut self, hashes: ModuleHashes) -> Result<Self, DescriptorError> {
        set_once(&mut self.hashes, "Hashes", hashes)?;
        Ok(self)
    }

    pub fn build(self) -> ModuleDescriptor {
        let mut packages = self.concealed;
        packages.extend(self.exports.keys().cloned());
        packages.extend(self.opens.keys().cloned());
        ModuleDescriptor {
            name: self.name,
            version: self.version,
            open: self.open,
            automatic: self.automatic,
            synthetic: self.synthetic,
            requires: self.requires,
            exports: self.exports,
            opens: self.opens,
            uses: self.uses,
            provides: self.provides,
            packages,
            main_class: self.main_class,
            os_name: self.os_name,
            os_arch: self.os_arch,
            os_version: self.os_version,
            hashes: self.hashes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequiresModifier::{Static, Transitive};

    fn builder(name: &str) -> ModuleDescriptorBuilder {
        ModuleDescriptor::builder(name).unwrap()
    }

    #[test]
    fn rejects_invalid_module_name() {
        assert!(ModuleDescriptor::builder("").is_err());
        assert!(ModuleDescriptor::builder("a..b").is_err());
        assert!(builder("m1").requires("not a name").is_err());
    }

    #[test]
    fn rejects_self_dependence() {
        let err = builder("m1").requires("m1").unwrap_err();
        assert_eq!(
            err,
            DescriptorError::SelfDependence {
                module: "m1".into()
            }
        );
    }

    #[test]
    fn rejects_duplicate_requires() {
        let err = builder("m1")
            .requires("m2")
            .unwrap()
            .requires_with([Transitive], "m2")
            .unwrap_err();
        assert!(matches!(err, DescriptorError::DuplicateRequires { .. }));
    }

    #[test]
    fn requires_keeps_modifiers() {
        let descriptor = builder("m1")
            .requires_with([Transitive, Static], "m2")
            .unwrap()
            .build();
        let requires = descriptor.requires().next().unwrap();
        assert!(requires.is_transitive());
        assert!(requires.is_static());
        assert_eq!(requires.to_string(), "transitive static m2");
    }

    #[test]
    fn export_conflicts() {
        assert!(matches!(
            builder("m1").exports("p").unwrap().exports("p"),
            Err(DescriptorError::PackageAlreadyExported { .. })
        ));
        assert!(matches!(
            builder("m1").conceals("p").unwrap().exports("p"),
            Err(DescriptorError::PackageAlreadyConcealed { .. })
        ));
        assert!(matches!(
            builder("m1").exports("p").unwrap().conceals("p"),
            Err(DescriptorError::PackageAlreadyExported { .. })
        ));
        assert!(matches!(
            builder("m1").exports_to("p", Vec::<String>::new()),
            Err(DescriptorError::EmptyTargets { .. })
        ));
    }

    #[test]
    fn packages_is_a_superset_of_exports() {
        let descriptor = builder("m1")
            .exports("p")
            .unwrap()
            .conceals("q")
            .unwrap()
            .packages(["p", "r"])
            .unwrap()
            .build();
        let packages: Vec<&str> = descriptor.packages().iter().map(String::as_str).collect();
        assert_eq!(packages, ["p", "q", "r"]);
        assert_eq!(descriptor.concealed_packages().collect::<Vec<_>>(), ["q", "r"]);
    }

    #[test]
    fn opens_conflicts() {
        assert!(matches!(
            builder("m1").opens("p").unwrap().opens_to("p", ["m2"]),
            Err(DescriptorError::PackageAlreadyOpened { .. })
        ));
        assert!(matches!(
            builder("m1").conceals("p").unwrap().opens("p"),
            Err(DescriptorError::PackageAlreadyConcealed { .. })
        ));
        assert!(matches!(
            builder("m1").opens("p").unwrap().conceals("p"),
            Err(DescriptorError::PackageAlreadyOpened { .. })
        ));
        assert!(matches!(
            builder("m1").opens_to("p", Vec::<String>::new()),
            Err(DescriptorError::EmptyTargets { .. })
        ));
        assert!(builder("m1").opens_to("p", ["not a name"]).is_err());
    }

    #[test]
    fn open_modules_cannot_declare_opens() {
        let err = ModuleDescriptor::open_module("m1")
            .unwrap()
            .opens("p")
            .unwrap_err();
        assert_eq!(
            err,
            DescriptorError::OpenModuleDeclaresOpens {
                module: "m1".into()
            }
        );
        assert_eq!(err.to_string(), "Open module m1 cannot declare open packages");
    }

    #[test]
    fn exported_package_may_also_be_opened() {
        let descriptor = builder("m1")
            .exports("p")
            .unwrap()
            .opens_to("p", ["m2"])
            .unwrap()
            .opens("q")
            .unwrap()
            .packages(["q", "r"])
            .unwrap()
            .build();
        let packages: Vec<&str> = descriptor.packages().iter().map(String::as_str).collect();
        assert_eq!(packages, ["p", "q", "r"]);
        assert_eq!(descriptor.concealed_packages().collect::<Vec<_>>(), ["r"]);
        assert_eq!(descriptor.opens().len(), 2);
    }

    #[test]
    fn uses_and_provides_validation() {
        assert!(matches!(
            builder("m1").uses("p.S").unwrap().uses("p.S"),
            Err(DescriptorError::DuplicateUses { .. })
        ));
        assert!(builder("m1").uses("S").is_err());
        assert!(matches!(
            builder("m1").provides("p.S", Vec::<String>::new()),
            Err(DescriptorError::EmptyProviders { .. })
        ));
        assert!(matches!(
            builder("m1").provides("p.S", ["q.T", "q.T"]),
            Err(DescriptorError::DuplicateProvider { .. })
        ));
        assert!(matches!(
            builder("m1")
                .provides("p.S", ["q.T"])
                .unwrap()
                .provides("p.S", ["q.U"]),
            Err(DescriptorError::DuplicateProvides { .. })
        ));
    }

    #[test]
    fn attributes_set_once() {
        let err = builder("m1")
            .version_str("1.0")
            .unwrap()
            .version_str("2.0")
            .unwrap_err();
        assert_eq!(err.to_string(), "Version already set");
        assert!(builder("m1").os_name("").is_err());
        assert!(builder("m1")
            .main_class("p.Main")
            .unwrap()
            .main_class("p.Other")
            .is_err());
        assert!(builder("m1").version_str("x").is_err());
    }

    #[test]
    fn automatic_modules_cannot_declare_dependences() {
        let auto = || ModuleDescriptor::automatic("auto").unwrap();
        assert!(matches!(
            auto().requires("m1"),
            Err(DescriptorError::AutomaticModuleDeclares {
                directive: "requires",
                ..
            })
        ));
        assert!(auto().exports("p").is_err());
        assert!(auto().uses("p.S").is_err());
        assert!(matches!(
            auto().opens("p"),
            Err(DescriptorError::AutomaticModuleDeclares {
                directive: "opens",
                ..
            })
        ));

        let descriptor = auto()
            .packages(["p"])
            .unwrap()
            .provides("p.S", ["p.Impl"])
            .unwrap()
            .build();
        assert!(descriptor.is_automatic());
        assert_eq!(descriptor.provides().len(), 1);
    }
}
