//! Readability graph construction.

use indexmap::IndexSet;
use rustc_hash::FxHashMap as HashMap;

use super::Resolver;
use crate::configuration::{ConfigId, ModuleKey, ancestors_of};

impl Resolver<'_> {
    /// Computes, for each module of this session in resolution order, the
    /// modules it reads.
    ///
    /// Direct reads come from `requires` (static ones only when the target is
    /// resolved). Reading a module also means reading everything that module
    /// requires transitively, applied until nothing changes. Automatic modules
    /// read every other module of this session and of every ancestor, and
    /// treat other automatic modules as transitive dependences.
    pub(super) fn make_graph(&self, id: ConfigId) -> Vec<IndexSet<ModuleKey>> {
        let key_of = |index: usize| ModuleKey { config: id, index };
        let ancestors = ancestors_of(&self.parents);

        // Transitive edges, seeded from the ancestors. Each ancestor resolved
        // its own dependences, so `find_module` on it sees the same modules
        // its graph was built from.
        let mut transitive: HashMap<ModuleKey, IndexSet<ModuleKey>> = HashMap::default();
        for configuration in &ancestors {
            for module in configuration.modules() {
                for requires in module.descriptor().requires() {
                    if !requires.is_transitive() {
                        continue;
                    }
                    if let Some(target) = configuration.find_module(requires.name()) {
                        transitive.entry(module.key()).or_default().insert(target.key());
                    }
                }
            }
        }

        let mut reads: Vec<IndexSet<ModuleKey>> = Vec::with_capacity(self.name_to_reference.len());
        for (index, (name, reference)) in self.name_to_reference.iter().enumerate() {
            let descriptor = reference.descriptor();
            let mut direct = IndexSet::new();
            let mut reexported = IndexSet::new();

            if descriptor.is_automatic() {
                let others = self.name_to_reference.iter().enumerate();
                for (other_index, (other_name, other)) in others {
                    if other_name == name {
                        continue;
                    }
                    direct.insert(key_of(other_index));
                    if other.descriptor().is_automatic() {
                        reexported.insert(key_of(other_index));
                    }
                }
                for configuration in &ancestors {
                    for module in configuration.modules() {
                        direct.insert(module.key());
                        if module.descriptor().is_automatic() {
                            reexported.insert(module.key());
                        }
                    }
                }
            } else {
                for requires in descriptor.requires() {
                    let target = match self.name_to_reference.get_index_of(requires.name()) {
                        Some(target_index) => key_of(target_index),
                        None => match self.find_in_parent(requires.name()) {
                            Some(module) => module.key(),
                            // An unresolved static dependence.
                            None => continue,
                        },
                    };
                    direct.insert(target);
                    if requires.is_transitive() {
                        reexported.insert(target);
                    }
                }
            }

            if !reexported.is_empty() {
                transitive.insert(key_of(index), reexported);
            }
            reads.push(direct);
        }

        // Propagate transitive edges to a fixpoint.
        loop {
            let mut changed = false;
            for (index, module_reads) in reads.iter_mut().enumerate() {
                let own = key_of(index);
                // A module never reads itself.
                let implied: Vec<ModuleKey> = module_reads
                    .iter()
                    .filter_map(|read| transitive.get(read))
                    .flatten()
                    .filter(|implied| **implied != own && !module_reads.contains(*implied))
                    .copied()
                    .collect();
                if !implied.is_empty() {
                    module_reads.extend(implied);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        reads
    }
}
