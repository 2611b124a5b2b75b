//! Error types for manifest loading, validation, and layer resolution.

use std::path::PathBuf;

use modlayer::DescriptorError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Loading errors
    #[error("manifest not found in {}", root.display())]
    NotFound { root: PathBuf },

    #[error("unsupported manifest format: {0}")]
    UnsupportedFormat(String),

    #[error(
        "invalid manifest value for '{field}'{}",
        hint.as_ref().map(|h| format!(": {h}")).unwrap_or_default()
    )]
    InvalidValue { field: String, hint: Option<String> },

    #[error("invalid profile override: {message}")]
    InvalidProfileOverride { message: String },

    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    // Schema validation errors
    #[error("no layers specified")]
    NoLayers,

    #[error("schema validation failed: {message}")]
    SchemaValidation { message: String, hint: Option<String> },

    // Layer resolution errors
    #[error("invalid module descriptor in layer '{layer}': {source}")]
    Descriptor {
        layer: String,
        #[source]
        source: DescriptorError,
    },

    #[error("failed to resolve layer '{layer}': {source}")]
    Resolution {
        layer: String,
        #[source]
        source: modlayer::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// The hint attached to a schema or value error, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            ConfigError::InvalidValue { hint, .. } | ConfigError::SchemaValidation { hint, .. } => {
                hint.as_deref()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_message_includes_hint() {
        let err = ConfigError::InvalidValue {
            field: "toml".to_string(),
            hint: Some("Invalid TOML syntax".to_string()),
        };
        assert_eq!(err.to_string(), "invalid manifest value for 'toml': Invalid TOML syntax");
        assert_eq!(err.hint(), Some("Invalid TOML syntax"));

        let bare = ConfigError::InvalidValue {
            field: "layers".to_string(),
            hint: None,
        };
        assert_eq!(bare.to_string(), "invalid manifest value for 'layers'");
    }

    #[test]
    fn resolution_error_names_the_layer() {
        let err = ConfigError::Resolution {
            layer: "app".to_string(),
            source: modlayer::FindError::ModuleNotFound { name: "m1".into() }.into(),
        };
        assert_eq!(err.to_string(), "failed to resolve layer 'app': Module m1 not found");
        assert!(err.hint().is_none());
    }
}
