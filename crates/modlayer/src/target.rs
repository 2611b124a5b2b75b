//! Target platform constraints.

use std::fmt;

use crate::descriptor::ModuleDescriptor;
use crate::error::ResolutionError;

/// Operating system constraints accumulated from the modules of a
/// configuration. An unset attribute is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TargetPlatform {
    os_name: Option<String>,
    os_arch: Option<String>,
    os_version: Option<String>,
}

impl TargetPlatform {
    pub fn os_name(&self) -> Option<&str> {
        self.os_name.as_deref()
    }

    pub fn os_arch(&self) -> Option<&str> {
        self.os_arch.as_deref()
    }

    pub fn os_version(&self) -> Option<&str> {
        self.os_version.as_deref()
    }

    pub fn is_unconstrained(&self) -> bool {
        self.os_name.is_none() && self.os_arch.is_none() && self.os_version.is_none()
    }

    fn of(descriptor: &ModuleDescriptor) -> Self {
        Self {
            os_name: descriptor.os_name().map(str::to_string),
            os_arch: descriptor.os_arch().map(str::to_string),
            os_version: descriptor.os_version().map(str::to_string),
        }
    }

    fn attributes(&self) -> [(&'static str, &Option<String>); 3] {
        [
            ("os name", &self.os_name),
            ("os arch", &self.os_arch),
            ("os version", &self.os_version),
        ]
    }

    /// Merges a parent's constraints into these.
    pub(crate) fn merge_parent(&mut self, parent: &TargetPlatform) -> Result<(), ResolutionError> {
        let pairs = self.attributes().into_iter().zip(parent.attributes());
        for ((attribute, mine), (_, theirs)) in pairs {
            if let (Some(mine), Some(theirs)) = (mine, theirs) {
                if mine != theirs {
                    return Err(ResolutionError::ParentTargetConflict {
                        attribute,
                        first: mine.clone(),
                        second: theirs.clone(),
                    });
                }
            }
        }
        self.adopt(parent);
        Ok(())
    }

    /// Tightens the constraints with those of a newly recorded module.
    pub(crate) fn constrain(
        &mut self,
        descriptor: &ModuleDescriptor,
    ) -> Result<(), ResolutionError> {
        let requested = Self::of(descriptor);
        let conflicts = self
            .attributes()
            .into_iter()
            .zip(requested.attributes())
            .any(|((_, mine), (_, theirs))| matches!((mine, theirs), (Some(a), Some(b)) if a != b));
        if conflicts {
            return Err(ResolutionError::TargetConflict {
                module: descriptor.name().to_string(),
                current: self.to_string(),
                requested: requested.to_string(),
            });
        }
        self.adopt(&requested);
        Ok(())
    }

    fn adopt(&mut self, other: &TargetPlatform) {
        if self.os_name.is_none() {
            self.os_name.clone_from(&other.os_name);
        }
        if self.os_arch.is_none() {
            self.os_arch.clone_from(&other.os_arch);
        }
        if self.os_version.is_none() {
            self.os_version.clone_from(&other.os_version);
        }
    }
}

/// Formats as `name-arch-version`, with `*` for unconstrained parts.
impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |value: &Option<String>| value.clone().unwrap_or_else(|| "*".to_string());
        write!(
            f,
            "{}-{}-{}",
            part(&self.os_name),
            part(&self.os_arch),
            part(&self.os_version)
        )
    }
}
