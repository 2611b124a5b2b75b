//! Declarative resolution manifests for `modlayer`.
//!
//! A manifest describes a stack of layers. Each layer is resolved into a
//! [`modlayer::Configuration`] whose parents are earlier layers:
//!
//! ```toml
//! [settings]
//! log_level = "debug"
//!
//! [[layers]]
//! name = "platform"
//! roots = ["platform"]
//!
//! [[layers.modules]]
//! name = "platform"
//! exports = [{ package = "platform.api" }]
//!
//! [[layers]]
//! name = "app"
//! roots = ["app"]
//! bind = true
//!
//! [[layers.modules]]
//! name = "app"
//! requires = [{ name = "platform" }]
//!
//! [profiles.strict.settings]
//! check = true
//! ```
//!
//! Manifests are discovered as `modlayer.toml` or `modlayer.json`, and
//! `MODLAYER_*` environment variables are merged over them.

pub mod discovery;
pub mod error;
pub mod layers;
pub mod manifest;
pub mod settings;
pub mod validation;

pub use error::*;
pub use layers::ResolvedLayers;
pub use manifest::*;
pub use settings::*;

pub use discovery::{ManifestDiscovery, discover, discover_with_profile};
pub use validation::{ManifestValidator, SchemaValidator, validate_schema};
