//! Global settings shared across layers and profiles.

use modlayer::descriptor::document::DecodeOptions;
use modlayer::logging::{LogLevel, init_logging};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default)]
    pub log_level: Option<String>,

    /// Shorthand for `log_level = "trace"`.
    #[serde(default)]
    pub trace: bool,

    /// Run the consistency checks (cycles, hashes, package suppliers) when
    /// finishing each layer.
    #[serde(default = "default_check")]
    pub check: bool,

    /// Module every other explicit module in the manifest must require.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_module: Option<String>,
}

fn default_check() -> bool {
    true
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_level: None,
            trace: false,
            check: default_check(),
            base_module: None,
        }
    }
}

impl GlobalSettings {
    /// The effective log level. `trace` wins over `log_level`.
    pub fn log_level(&self) -> Result<LogLevel> {
        if self.trace {
            return Ok(LogLevel::Trace);
        }
        match &self.log_level {
            Some(level) => level.parse().map_err(|hint| ConfigError::InvalidValue {
                field: "settings.log_level".to_string(),
                hint: Some(hint),
            }),
            None => Ok(LogLevel::default()),
        }
    }

    pub(crate) fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            base_module: self.base_module.clone(),
        }
    }

    /// Installs the global subscriber at the effective level.
    pub fn init_logging(&self) -> Result<()> {
        init_logging(self.log_level()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_are_on_by_default() {
        assert!(GlobalSettings::default().check);
        let parsed: GlobalSettings = serde_json::from_str("{}").unwrap();
        assert!(parsed.check);
        assert_eq!(parsed, GlobalSettings::default());
    }

    #[test]
    fn trace_overrides_log_level() {
        let settings = GlobalSettings {
            log_level: Some("warn".to_string()),
            trace: true,
            ..GlobalSettings::default()
        };
        assert_eq!(settings.log_level().unwrap(), LogLevel::Trace);
    }

    #[test]
    fn log_level_is_parsed() {
        let settings = GlobalSettings {
            log_level: Some("debug".to_string()),
            ..GlobalSettings::default()
        };
        assert_eq!(settings.log_level().unwrap(), LogLevel::Debug);
        assert_eq!(GlobalSettings::default().log_level().unwrap(), LogLevel::Info);
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let settings = GlobalSettings {
            log_level: Some("loud".to_string()),
            ..GlobalSettings::default()
        };
        let err = settings.log_level().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, .. } if field == "settings.log_level"
        ));
    }
}
