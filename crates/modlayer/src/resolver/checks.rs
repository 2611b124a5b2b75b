//! Consistency checks run by [`Resolver::finish`].

use indexmap::IndexSet;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::collections::hash_map::Entry;
use std::vec;

use super::Resolver;
use crate::configuration::{ConfigId, Configuration, ModuleKey, ancestors_of};
use crate::descriptor::ModuleDescriptor;
use crate::descriptor::names::package_of;
use crate::error::ResolutionError;

/// Looks up descriptors by key across this session and its ancestors.
struct Descriptors<'r> {
    id: ConfigId,
    session: &'r Resolver<'r>,
    ancestors: HashMap<ConfigId, &'r Configuration>,
}

impl<'r> Descriptors<'r> {
    fn get(&self, key: ModuleKey) -> Option<&'r ModuleDescriptor> {
        if key.config == self.id {
            self.session
                .name_to_reference
                .get_index(key.index)
                .map(|(_, reference)| reference.descriptor())
        } else {
            self.ancestors
                .get(&key.config)
                .and_then(|configuration| configuration.reference_at(key.index))
                .map(|reference| reference.descriptor())
        }
    }
}

impl<'a> Resolver<'a> {
    /// Fails if the `requires` edges among this session's modules form a
    /// cycle. Edges into parent configurations are not followed.
    ///
    /// The walk keeps its own stack so that long dependence chains cannot
    /// exhaust the thread stack.
    pub(super) fn detect_cycles(&self) -> Result<(), ResolutionError> {
        let mut visited: HashSet<usize> = HashSet::default();
        let mut path: IndexSet<usize> = IndexSet::new();
        // Unexplored edges of each module on the path, innermost last.
        let mut pending: Vec<vec::IntoIter<usize>> = Vec::new();

        for root in 0..self.name_to_reference.len() {
            if visited.contains(&root) {
                continue;
            }
            path.insert(root);
            pending.push(self.dependences_of(root));

            while let Some(edges) = pending.last_mut() {
                match edges.next() {
                    Some(next) if visited.contains(&next) => {}
                    Some(next) => {
                        if !path.insert(next) {
                            return Err(self.cycle_error(next, &path));
                        }
                        pending.push(self.dependences_of(next));
                    }
                    None => {
                        pending.pop();
                        if let Some(done) = path.pop() {
                            visited.insert(done);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Indices of the modules in this session that `index` requires.
    fn dependences_of(&self, index: usize) -> vec::IntoIter<usize> {
        let Some((_, reference)) = self.name_to_reference.get_index(index) else {
            return Vec::new().into_iter();
        };
        reference
            .descriptor()
            .requires()
            .filter_map(|requires| self.name_to_reference.get_index_of(requires.name()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn cycle_error(&self, index: usize, path: &IndexSet<usize>) -> ResolutionError {
        let start = path.get_index_of(&index).unwrap_or(0);
        let name_at = |i: usize| {
            self.name_to_reference
                .get_index(i)
                .map(|(name, _)| name.clone())
                .unwrap_or_default()
        };
        let mut cycle: Vec<String> = path.iter().skip(start).map(|&i| name_at(i)).collect();
        cycle.push(name_at(index));
        ResolutionError::Cycle { path: cycle }
    }

    /// Verifies the hashes each module recorded for its dependences.
    ///
    /// Dependences that are not resolved or that are patched are skipped.
    pub(super) fn check_hashes(&self) -> Result<(), ResolutionError> {
        for reference in self.name_to_reference.values() {
            let descriptor = reference.descriptor();
            let Some(hashes) = descriptor.hashes() else {
                continue;
            };
            for (dependence, recorded) in hashes.iter() {
                let other = match self.name_to_reference.get(dependence) {
                    Some(other) => Some(other),
                    None => self.find_in_parent(dependence).map(|module| module.reference()),
                };
                let Some(other) = other else {
                    continue;
                };
                if other.is_patched() {
                    continue;
                }
                let actual = other.compute_hash(hashes.algorithm()).ok_or_else(|| {
                    ResolutionError::HashUnavailable {
                        dependence: dependence.to_string(),
                        algorithm: hashes.algorithm().to_string(),
                    }
                })?;
                if actual != recorded {
                    return Err(ResolutionError::HashMismatch {
                        module: descriptor.name().to_string(),
                        dependence: dependence.to_string(),
                        expected: hex::encode(recorded),
                        actual: hex::encode(&actual),
                    });
                }
            }
        }
        Ok(())
    }

    /// Checks that each module has at most one supplier for every package it
    /// can see, reads at most one module of any name, and can see the
    /// package of every service it uses or provides.
    pub(super) fn check_export_suppliers(
        &self,
        id: ConfigId,
        reads: &[IndexSet<ModuleKey>],
    ) -> Result<(), ResolutionError> {
        let descriptors = Descriptors {
            id,
            session: self,
            ancestors: ancestors_of(&self.parents)
                .into_iter()
                .map(|configuration| (configuration.id(), configuration))
                .collect(),
        };

        for (index, module_reads) in reads.iter().enumerate() {
            let reader = ModuleKey { config: id, index };
            let Some(reader_descriptor) = descriptors.get(reader) else {
                continue;
            };
            let reader_name = reader_descriptor.name();

            // Own packages come first so that a package both contained and
            // imported is reported against the reader.
            let mut suppliers: HashMap<&str, ModuleKey> = reader_descriptor
                .packages()
                .iter()
                .map(|package| (package.as_str(), reader))
                .collect();
            let mut names: HashSet<&str> = HashSet::default();
            names.insert(reader_name);

            for &other in module_reads {
                let Some(other_descriptor) = descriptors.get(other) else {
                    continue;
                };
                let other_name = other_descriptor.name();
                if other != reader && !names.insert(other_name) {
                    return Err(if other_name == reader_name {
                        ResolutionError::ReadsModuleWithOwnName {
                            module: reader_name.to_string(),
                        }
                    } else {
                        ResolutionError::ReadsSameNameTwice {
                            module: reader_name.to_string(),
                            name: other_name.to_string(),
                        }
                    });
                }

                if other_descriptor.is_automatic() {
                    // Automatic modules export every package.
                    if other != reader {
                        for package in other_descriptor.packages() {
                            register_supplier(
                                &mut suppliers,
                                package,
                                other,
                                reader,
                                &descriptors,
                            )?;
                        }
                    }
                } else {
                    for export in other_descriptor.exports() {
                        if export.is_exported_to(reader_name) {
                            register_supplier(
                                &mut suppliers,
                                export.source(),
                                other,
                                reader,
                                &descriptors,
                            )?;
                        }
                    }
                }
            }

            if !reader_descriptor.is_automatic() {
                let services = reader_descriptor
                    .uses()
                    .iter()
                    .map(String::as_str)
                    .chain(reader_descriptor.provides().map(|p| p.service()));
                for service in services {
                    let package = package_of(service);
                    if !suppliers.contains_key(package) {
                        return Err(ResolutionError::ServiceTypeNotReadable {
                            module: reader_name.to_string(),
                            package: package.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn register_supplier<'r>(
    suppliers: &mut HashMap<&'r str, ModuleKey>,
    package: &'r str,
    supplier: ModuleKey,
    reader: ModuleKey,
    descriptors: &Descriptors<'r>,
) -> Result<(), ResolutionError> {
    match suppliers.entry(package) {
        Entry::Vacant(slot) => {
            slot.insert(supplier);
            Ok(())
        }
        Entry::Occupied(existing) => {
            let existing = *existing.get();
            if existing == supplier {
                return Ok(());
            }
            let name = |key: ModuleKey| {
                descriptors
                    .get(key)
                    .map(|d| d.name().to_string())
                    .unwrap_or_default()
            };
            let reader_name = name(reader);
            Err(if existing == reader {
                ResolutionError::ContainsAndReadsPackage {
                    reader: reader_name,
                    package: package.to_string(),
                    exporter: name(supplier),
                }
            } else {
                ResolutionError::TwoSuppliers {
                    reader: reader_name,
                    package: package.to_string(),
                    first: name(existing),
                    second: name(supplier),
                }
            })
        }
    }
}
