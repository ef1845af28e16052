//! # Module Runtimes
//!
//! The runtime is the part of the host that actually instantiates a module.
//! The loader only needs two operations from it:
//!
//! - `load_from_bytes`: instantiate straight from memory
//! - `load_from_path`: instantiate from a file on disk
//!
//! A runtime that cannot use a given source for a given module answers with
//! `LoaderError::FormatRejected`. The loader treats that as "try the other
//! way", never as a failure.
//!
//! ## Shipped Runtimes
//!
//! - `ImageRuntime`: module images (see [`formats::image`](crate::formats::image))
//! - `NativeRuntime`: platform shared libraries (feature `native`)
//! - `LayeredRuntime`: tries several runtimes in order

mod image;
#[cfg(feature = "native")]
mod native;

pub use image::ImageRuntime;
#[cfg(feature = "native")]
pub use native::{NativeLibrary, NativeRuntime};

use crate::{LoaderError, ModuleHandle};
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// RUNTIME TRAIT
// =============================================================================

/// Instantiates modules for the host.
///
/// Runtimes must be `Send + Sync`: the resolution hook may call them from
/// several threads at once.
pub trait ModuleRuntime: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Instantiate a module from an in-memory buffer.
    ///
    /// Returns `LoaderError::FormatRejected` if these bytes cannot be loaded
    /// from memory by this runtime.
    fn load_from_bytes(&self, bytes: &[u8]) -> Result<ModuleHandle, LoaderError>;

    /// Instantiate a module from a file.
    ///
    /// Returns `LoaderError::FormatRejected` if the file is not a module this
    /// runtime understands.
    fn load_from_path(&self, path: &Path) -> Result<ModuleHandle, LoaderError>;
}

// =============================================================================
// LAYERED RUNTIME
// =============================================================================

/// Tries a list of runtimes in order.
///
/// The first runtime that does not reject the format decides the outcome,
/// success or failure. If every runtime rejects it, the combined rejection
/// is returned.
#[derive(Clone, Default)]
pub struct LayeredRuntime {
    layers: Vec<Arc<dyn ModuleRuntime>>,
}

impl LayeredRuntime {
    /// Create an empty runtime (rejects everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a runtime.
    #[must_use]
    pub fn with(mut self, runtime: Arc<dyn ModuleRuntime>) -> Self {
        self.layers.push(runtime);
        self
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if no runtime is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn first_accepting<F>(&self, mut load: F) -> Result<ModuleHandle, LoaderError>
    where
        F: FnMut(&dyn ModuleRuntime) -> Result<ModuleHandle, LoaderError>,
    {
        let mut rejections = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            match load(layer.as_ref()) {
                Err(LoaderError::FormatRejected(reason)) => {
                    rejections.push(format!("{}: {}", layer.name(), reason));
                }
                outcome => return outcome,
            }
        }

        if rejections.is_empty() {
            return Err(LoaderError::FormatRejected(
                "no runtime configured".to_string(),
            ));
        }
        Err(LoaderError::FormatRejected(rejections.join("; ")))
    }
}

impl std::fmt::Debug for LayeredRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.layers.iter().map(|l| l.name()).collect();
        f.debug_struct("LayeredRuntime")
            .field("layers", &names)
            .finish()
    }
}

impl ModuleRuntime for LayeredRuntime {
    fn name(&self) -> &str {
        "layered"
    }

    fn load_from_bytes(&self, bytes: &[u8]) -> Result<ModuleHandle, LoaderError> {
        self.first_accepting(|runtime| runtime.load_from_bytes(bytes))
    }

    fn load_from_path(&self, path: &Path) -> Result<ModuleHandle, LoaderError> {
        self.first_accepting(|runtime| runtime.load_from_path(path))
    }
}

// =============================================================================
// TESTS
// =============================================================================
