//! # modlayer
//!
//! A module resolution engine.
//!
//! Given the names of some root modules and finders that can locate module
//! descriptors, `modlayer` computes a closed, consistent dependency graph
//! called a [`Configuration`]: every module the roots need, and for each of
//! them the set of modules it *reads*. Resolution can also bind service
//! providers, pulling in every module that provides a service some resolved
//! module uses.
//!
//! The result is checked before it is published:
//!
//! - no cycles among `requires`
//! - no module sees two suppliers of the same package
//! - no module reads two modules with the same name
//! - every used or provided service type is in a readable package
//! - recorded dependence hashes match
//! - target platform constraints agree
//!
//! ## Architecture
//!
//! ```text
//!   roots ──► Resolver::resolve ──► Resolver::bind ──► Resolver::finish
//!                  │                     │                   │
//!          before finder           find_all() of        checks + graph
//!          parent configs          every finder               │
//!          after finder                                       ▼
//!                                                      Configuration
//!                                                   (arena + reads, parents)
//! ```
//!
//! Configurations stack: each one is resolved against one or more parents,
//! and modules found in a parent are read from there rather than resolved
//! again. [`Configuration::empty`] is the root of every stack.
//!
//! ## Quick start
//!
//! ```
//! use modlayer::{Configuration, EmptyFinder, InMemoryFinder, ModuleDescriptor};
//!
//! # fn main() -> modlayer::Result<()> {
//! let app = ModuleDescriptor::builder("app")?.requires("lib")?.uses("api.Plugin")?.build();
//! let lib = ModuleDescriptor::builder("lib")?
//!     .requires_with([modlayer::RequiresModifier::Transitive], "api")?
//!     .build();
//! let api = ModuleDescriptor::builder("api")?.exports("api")?.build();
//! let plugin = ModuleDescriptor::builder("plugin")?
//!     .requires("api")?
//!     .conceals("impls")?
//!     .provides("api.Plugin", ["impls.Fast"])?
//!     .build();
//!
//! let finder = InMemoryFinder::of([app, lib, api, plugin]);
//! let cf = Configuration::empty().resolve_requires_and_uses(&finder, &EmptyFinder, ["app"])?;
//!
//! let app = cf.find_module("app").unwrap();
//! assert!(app.reads_module("api"));
//! assert!(cf.find_module("plugin").is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The engine emits [`tracing`] events. Enable the `logging` feature for
//! [`logging::init_logging`], a ready-made subscriber for binaries.

pub mod configuration;
pub mod descriptor;
pub mod error;
pub mod finder;
pub mod hashing;
#[cfg(feature = "logging")]
pub mod logging;
pub mod reference;
pub mod resolver;
pub mod target;
pub mod version;


pub use configuration::{Configuration, ResolvedModule};
pub use descriptor::{
    DecodeOptions, DescriptorDocument, Exports, ModuleDescriptor, ModuleDescriptorBuilder, Opens,
    Provides, Requires, RequiresModifier,
};
pub use error::{DescriptorError, Error, FindError, ResolutionError, Result, VersionError};
pub use finder::{ComposedFinder, EmptyFinder, InMemoryFinder, ModuleFinder, ScanningFinder};
pub use hashing::ModuleHashes;
pub use reference::{InMemoryReader, ModuleReader, ModuleReference};
pub use resolver::Resolver;
pub use target::TargetPlatform;
pub use version::Version;
