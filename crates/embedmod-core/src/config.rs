//! # Loader Configuration
//!
//! Everything a host may tune about loading, staging, and resolution.
//!
//! Sources, lowest to highest precedence:
//! 1. `LoaderConfig::default()`
//! 2. A config file (the CLI reads TOML; any serde format works)
//! 3. Environment (`EMBEDMOD_STAGING_DIR`, `EMBEDMOD_NAMESPACE`)
//! 4. Explicit overrides by the host

use crate::primitives::{DEFAULT_MAX_RESOURCE_SIZE, DEFAULT_MODULE_EXTENSION};
use crate::stager::{ContentStager, validate_path_component};
use crate::{DuplicatePolicy, LoaderError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the staging root.
pub const ENV_STAGING_DIR: &str = "EMBEDMOD_STAGING_DIR";

/// Environment variable overriding the staging namespace.
pub const ENV_NAMESPACE: &str = "EMBEDMOD_NAMESPACE";

/// Namespace used when the host executable name cannot be determined.
const FALLBACK_NAMESPACE: &str = "embedmod";

/// Where staged files go relative to the staging root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingLayout {
    /// `<staging_dir>/<file_name>`. Shared by every program using the same
    /// directory.
    Flat,
    /// `<staging_dir>/<namespace>/<file_name>`.
    #[default]
    Namespaced,
}

/// Loader settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Staging root. Defaults to the system temp directory.
    pub staging_dir: PathBuf,
    /// Per-host subdirectory used by `StagingLayout::Namespaced`.
    /// Defaults to the current executable's file stem.
    pub namespace: Option<String>,
    /// Staging directory layout.
    pub layout: StagingLayout,
    /// Extension appended to requested short names by the resolution hook.
    pub module_extension: String,
    /// What `load` does when an identity is already registered.
    pub duplicate_policy: DuplicatePolicy,
    /// Let the resolution hook stage modules the runtime rejects from memory.
    pub stage_on_resolve: bool,
    /// Maximum size of a directory-bundle resource, in bytes.
    pub max_resource_size: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir(),
            namespace: host_namespace(),
            layout: StagingLayout::default(),
            module_extension: DEFAULT_MODULE_EXTENSION.to_string(),
            duplicate_policy: DuplicatePolicy::default(),
            stage_on_resolve: false,
            max_resource_size: DEFAULT_MAX_RESOURCE_SIZE,
        }
    }
}

impl LoaderConfig {
    /// Apply `EMBEDMOD_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_STAGING_DIR).filter(|v| !v.is_empty()) {
            self.staging_dir = PathBuf::from(dir);
        }
        if let Some(ns) = lookup(ENV_NAMESPACE).filter(|v| !v.is_empty()) {
            self.namespace = Some(ns);
        }
    }

    /// Check the settings are usable.
    pub fn validate(&self) -> Result<(), LoaderError> {
        let extension = self.module_extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\', ',']) {
            return Err(LoaderError::Config(format!(
                "invalid module extension: {:?}",
                self.module_extension
            )));
        }

        if self.layout == StagingLayout::Namespaced {
            let ns = self.namespace.as_deref().ok_or_else(|| {
                LoaderError::Config("namespaced layout requires a namespace".to_string())
            })?;
            validate_path_component(ns)
                .map_err(|_| LoaderError::Config(format!("invalid namespace: {:?}", ns)))?;
        }

        if self.max_resource_size == 0 {
            return Err(LoaderError::Config(
                "max_resource_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the stager these settings describe.
    pub fn stager(&self) -> Result<ContentStager, LoaderError> {
        self.validate()?;
        match (self.layout, self.namespace.as_deref()) {
            (StagingLayout::Namespaced, Some(ns)) => {
                ContentStager::with_namespace(&self.staging_dir, ns)
            }
            _ => Ok(ContentStager::new(&self.staging_dir)),
        }
    }
}

/// The current executable's file stem, used as the default namespace.
fn host_namespace() -> Option<String> {
    let stem = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .filter(|stem| validate_path_component(stem).is_ok());

    Some(stem.unwrap_or_else(|| FALLBACK_NAMESPACE.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = LoaderConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.module_extension, "dll");
        assert_eq!(config.layout, StagingLayout::Namespaced);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Fail);
        assert!(config.namespace.is_some());
    }

    #[test]
    fn env_overrides() {
        let mut config = LoaderConfig::default();
        config.apply_env_with(|key| match key {
            ENV_STAGING_DIR => Some("/var/tmp/staging".to_string()),
            ENV_NAMESPACE => Some("my-host".to_string()),
            _ => None,
        });

        assert_eq!(config.staging_dir, PathBuf::from("/var/tmp/staging"));
        assert_eq!(config.namespace.as_deref(), Some("my-host"));
    }

    #[test]
    fn empty_env_values_ignored() {
        let mut config = LoaderConfig::default();
        let before = config.clone();
        config.apply_env_with(|_| Some(String::new()));
        assert_eq!(config, before);
    }

    #[test]
    fn invalid_extension_rejected() {
        let config = LoaderConfig {
            module_extension: ".".to_string(),
            ..LoaderConfig::default()
        };
        assert!(matches!(config.validate(), Err(LoaderError::Config(_))));
    }

    #[test]
    fn namespaced_layout_needs_valid_namespace() {
        let config = LoaderConfig {
            namespace: Some("../escape".to_string()),
            ..LoaderConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LoaderConfig {
            namespace: None,
            ..LoaderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn flat_layout_ignores_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoaderConfig {
            staging_dir: dir.path().to_path_buf(),
            layout: StagingLayout::Flat,
            namespace: None,
            ..LoaderConfig::default()
        };

        let stager = config.stager().unwrap();
        assert_eq!(stager.staging_dir(), dir.path());
    }

    #[test]
    fn namespaced_stager_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoaderConfig {
            staging_dir: dir.path().to_path_buf(),
            namespace: Some("host".to_string()),
            ..LoaderConfig::default()
        };

        let stager = config.stager().unwrap();
        assert_eq!(stager.staging_dir(), dir.path().join("host"));
    }
}
