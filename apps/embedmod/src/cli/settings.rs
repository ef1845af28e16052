//! # CLI Settings
//!
//! Layered settings for the CLI: defaults, then an optional TOML file, then
//! `EMBEDMOD_*` environment variables. Command-line flags are applied last by
//! the commands themselves.
//!
//! ```toml
//! [loader]
//! staging_dir = "/var/tmp"
//! namespace = "my-host"
//! layout = "namespaced"
//! module_extension = "dll"
//! duplicate_policy = "fail"
//! stage_on_resolve = true
//!
//! [bundle]
//! dir = "resources"
//! namespace = "App"
//! ```

use embedmod_core::{LoaderConfig, LoaderError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum accepted size of a settings file (1 MB).
const MAX_SETTINGS_FILE_SIZE: u64 = 1024 * 1024;

/// Where the CLI finds a bundle directory by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleSettings {
    /// Directory exposed as a `DirectoryBundle`.
    pub dir: Option<PathBuf>,
    /// Namespace prefixed to resource names.
    pub namespace: Option<String>,
}

/// Everything read from the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub loader: LoaderConfig,
    pub bundle: BundleSettings,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, LoaderError> {
        toml::from_str(text).map_err(|e| LoaderError::Config(format!("invalid settings: {}", e)))
    }

    /// Load settings: defaults, then `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, LoaderError> {
        let mut settings = match path {
            Some(path) => Self::from_toml(&read_settings_file(path)?)?,
            None => Self::default(),
        };
        settings.loader.apply_env();
        settings.loader.validate()?;
        Ok(settings)
    }
}

fn read_settings_file(path: &Path) -> Result<String, LoaderError> {
    let config_error =
        |reason: String| LoaderError::Config(format!("{}: {}", path.display(), reason));

    let metadata = std::fs::metadata(path).map_err(|e| config_error(e.to_string()))?;
    if metadata.len() > MAX_SETTINGS_FILE_SIZE {
        return Err(config_error(format!(
            "size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_SETTINGS_FILE_SIZE
        )));
    }

    std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))
}
