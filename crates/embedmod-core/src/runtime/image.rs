//! Runtime for module images.

use super::ModuleRuntime;
use crate::{LoadOrigin, LoaderError, ModuleHandle, ModuleImage};
use std::path::Path;

/// Loads [`ModuleImage`]s.
///
/// - Bytes without the image magic are rejected as a foreign format.
/// - Images whose manifest is `file_backed` are rejected from memory and
///   accepted from a file.
///
/// The handle payload is the decoded `ModuleImage`; its identity is
/// `"<name>, Version=<version>"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRuntime;

impl ImageRuntime {
    /// Create the runtime.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ModuleRuntime for ImageRuntime {
    fn name(&self) -> &str {
        "image"
    }

    fn load_from_bytes(&self, bytes: &[u8]) -> Result<ModuleHandle, LoaderError> {
        if !ModuleImage::has_magic(bytes) {
            return Err(LoaderError::FormatRejected(
                "not a module image".to_string(),
            ));
        }

        let image = ModuleImage::from_bytes(bytes)?;
        if image.manifest.file_backed {
            return Err(LoaderError::FormatRejected(format!(
                "{} must be loaded from a file",
                image.identity()
            )));
        }

        Ok(ModuleHandle::new(image.identity(), LoadOrigin::Memory, image))
    }

    fn load_from_path(&self, path: &Path) -> Result<ModuleHandle, LoaderError> {
        let bytes = std::fs::read(path).map_err(|e| {
            LoaderError::ModuleLoad(format!("cannot read {}: {}", path.display(), e))
        })?;

        if !ModuleImage::has_magic(&bytes) {
            return Err(LoaderError::FormatRejected(
                "not a module image".to_string(),
            ));
        }

        let image = ModuleImage::from_bytes(&bytes)?;
        Ok(ModuleHandle::new(
            image.identity(),
            LoadOrigin::File(path.to_path_buf()),
            image,
        ))
    }
}
