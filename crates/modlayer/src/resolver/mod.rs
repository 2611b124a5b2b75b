//! The resolver.
//!
//! Resolution runs in three phases:
//!
//! 1. [`Resolver::resolve`] computes the closure of the root modules over
//!    their non-static `requires`.
//! 2. [`Resolver::bind`] (optional) repeatedly adds providers of the services
//!    used by resolved modules, resolving each provider's dependences, until
//!    a pass adds nothing.
//! 3. [`Resolver::finish`] checks the result and builds the readability graph
//!    into a [`Configuration`].
//!
//! Every lookup searches the "before" finder, then the parent
//! configurations, then the "after" finder.
//!
//! A resolver that is dropped before `finish` publishes nothing.

mod checks;
mod graph;

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap as HashMap;
use tracing::{debug, trace};

use crate::configuration::{ConfigId, Configuration, ResolvedGraph, ResolvedModule, ancestors_of};
use crate::descriptor::ModuleDescriptor;
use crate::error::{FindError, Result};
use crate::finder::ModuleFinder;
use crate::reference::ModuleReference;
use crate::target::TargetPlatform;

/// Builds one configuration from root module names.
pub struct Resolver<'a> {
    before: &'a dyn ModuleFinder,
    after: &'a dyn ModuleFinder,
    parents: Vec<Arc<Configuration>>,
    /// Modules resolved so far, in the order they were found.
    name_to_reference: IndexMap<String, ModuleReference>,
    target: TargetPlatform,
    /// Set once every observable automatic module has been resolved.
    have_all_automatic: bool,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver over `parents`.
    ///
    /// # Errors
    ///
    /// Fails when the parents have conflicting target platform constraints.
    pub fn new<P>(
        parents: P,
        before: &'a dyn ModuleFinder,
        after: &'a dyn ModuleFinder,
    ) -> Result<Self>
    where
        P: IntoIterator<Item = Arc<Configuration>>,
    {
        let parents: Vec<Arc<Configuration>> = parents.into_iter().collect();
        let mut target = TargetPlatform::default();
        for parent in &parents {
            target.merge_parent(parent.target_platform())?;
        }
        Ok(Self {
            before,
            after,
            parents,
            name_to_reference: IndexMap::new(),
            target,
            have_all_automatic: false,
        })
    }

    /// Resolves `roots` and everything they transitively require.
    ///
    /// A root found in a parent configuration is not resolved again.
    ///
    /// # Errors
    ///
    /// Fails with a find error when a root or dependence cannot be located,
    /// and with a resolution error on a target platform conflict.
    pub fn resolve<I, S>(&mut self, roots: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut queue = VecDeque::new();
        for root in roots {
            let root = root.as_ref();
            if self.name_to_reference.contains_key(root) {
                continue;
            }
            let reference = match self.before.find(root)? {
                Some(reference) => reference,
                None => {
                    if self.find_in_parent(root).is_some() {
                        debug!(module = root, "Root module found in parent configuration");
                        continue;
                    }
                    self.after
                        .find(root)?
                        .ok_or_else(|| FindError::ModuleNotFound {
                            name: root.to_string(),
                        })?
                }
            };
            debug!(module = root, location = ?reference.location(), "Root module located");
            queue.push_back(Arc::clone(reference.descriptor_arc()));
            self.add_found_module(reference)?;
        }
        self.resolve_queue(queue)?;
        Ok(self)
    }

    /// Drains `queue`, resolving the dependences of each descriptor. Returns
    /// every descriptor that passed through the queue.
    fn resolve_queue(
        &mut self,
        mut queue: VecDeque<Arc<ModuleDescriptor>>,
    ) -> Result<Vec<Arc<ModuleDescriptor>>> {
        let mut resolved = Vec::new();
        while let Some(descriptor) = queue.pop_front() {
            if descriptor.is_automatic() && !self.have_all_automatic {
                self.have_all_automatic = true;
                for reference in self.find_all()? {
                    if reference.descriptor().is_automatic()
                        && !self.name_to_reference.contains_key(reference.name())
                    {
                        trace!(module = reference.name(), "Automatic module resolved");
                        queue.push_back(Arc::clone(reference.descriptor_arc()));
                        self.add_found_module(reference)?;
                    }
                }
            }

            for requires in descriptor.requires() {
                // Static dependences are resolved only when something else
                // pulls them in.
                if requires.is_static() {
                    continue;
                }
                let name = requires.name();
                if self.name_to_reference.contains_key(name) {
                    continue;
                }
                let reference = match self.before.find(name)? {
                    Some(reference) => reference,
                    None => {
                        if self.find_in_parent(name).is_some() {
                            continue;
                        }
                        self.after
                            .find(name)?
                            .ok_or_else(|| FindError::RequiredModuleNotFound {
                                name: name.to_string(),
                                required_by: descriptor.name().to_string(),
                            })?
                    }
                };
                trace!(module = descriptor.name(), requires = name, "Dependence resolved");
                queue.push_back(Arc::clone(reference.descriptor_arc()));
                self.add_found_module(reference)?;
            }
            resolved.push(descriptor);
        }
        Ok(resolved)
    }

    fn add_found_module(&mut self, reference: ModuleReference) -> Result<()> {
        self.target.constrain(reference.descriptor())?;
        self.name_to_reference
            .insert(reference.name().to_string(), reference);
        Ok(())
    }

    /// Adds service providers until no pass finds a new one.
    ///
    /// The first pass considers the services used by every module of every
    /// ancestor configuration and by every module resolved so far; each later
    /// pass considers only the modules the previous pass added.
    pub fn bind(&mut self) -> Result<&mut Self> {
        let mut available: HashMap<String, Vec<ModuleReference>> = HashMap::default();
        for reference in self.find_all()? {
            for provides in reference.descriptor().provides() {
                available
                    .entry(provides.service().to_string())
                    .or_default()
                    .push(reference.clone());
            }
        }
        if available.is_empty() {
            return Ok(self);
        }

        let mut consumers: Vec<Arc<ModuleDescriptor>> = ancestors_of(&self.parents)
            .into_iter()
            .flat_map(|configuration| configuration.modules())
            .map(|module| Arc::clone(module.reference().descriptor_arc()))
            .collect();
        consumers.extend(
            self.name_to_reference
                .values()
                .map(|reference| Arc::clone(reference.descriptor_arc())),
        );

        while !consumers.is_empty() {
            let mut queue = VecDeque::new();
            for consumer in &consumers {
                for service in consumer.uses() {
                    let Some(providers) = available.get(service) else {
                        continue;
                    };
                    for provider in providers {
                        if provider.descriptor() == consumer.as_ref()
                            || self.name_to_reference.contains_key(provider.name())
                        {
                            continue;
                        }
                        debug!(
                            consumer = consumer.name(),
                            provider = provider.name(),
                            service = service.as_str(),
                            "Binding service provider"
                        );
                        queue.push_back(Arc::clone(provider.descriptor_arc()));
                        self.add_found_module(provider.clone())?;
                    }
                }
            }
            consumers = self.resolve_queue(queue)?;
        }
        Ok(self)
    }

    /// Checks the resolved modules and produces the configuration.
    ///
    /// With `check` set, fails on cycles, recorded hash mismatches, and
    /// inconsistent package suppliers or service uses.
    pub fn finish(self, check: bool) -> Result<Arc<Configuration>> {
        if check {
            self.detect_cycles()?;
            self.check_hashes()?;
        }

        let id = ConfigId::next();
        let reads = self.make_graph(id);
        if check {
            self.check_export_suppliers(id, &reads)?;
        }

        let graph = ResolvedGraph {
            id,
            modules: self.name_to_reference.into_values().collect(),
            reads: reads
                .into_iter()
                .map(|edges| edges.into_iter().collect())
                .collect(),
            target: self.target,
        };
        let configuration = Configuration::from_graph(self.parents, graph);
        debug!(
            configuration = %configuration.id(),
            modules = configuration.len(),
            parents = configuration.parents().len(),
            "Configuration created"
        );
        Ok(configuration)
    }

    /// Names of the modules resolved so far, in resolution order.
    pub fn resolved_names(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.name_to_reference.keys().map(String::as_str)
    }

    fn find_in_parent(&self, name: &str) -> Option<ResolvedModule<'_>> {
        self.parents.iter().find_map(|parent| parent.find_module(name))
    }

    /// Every observable module: those of the before finder, plus those of
    /// the after finder that neither the before finder nor a parent shadows.
    fn find_all(&self) -> Result<Vec<ModuleReference>> {
        let mut all = self.before.find_all()?;
        for reference in self.after.find_all()? {
            let name = reference.name();
            if self.before.find(name)?.is_none() && self.find_in_parent(name).is_none() {
                all.push(reference);
            }
        }
        Ok(all)
    }
}
