//! # Embedded Loader
//!
//! Startup entry point: load named bundle resources into the process and
//! register them.
//!
//! ## Load Sequence
//!
//! 1. Locate the resource (missing resource is fatal)
//! 2. Try to instantiate it from memory
//! 3. If the runtime rejects the format, stage it to disk and load the file
//! 4. Register the handle under the identity the runtime reported
//!
//! A missing resource is a packaging error, not a runtime condition: the host
//! shipped without a module it depends on, so `load` fails loudly.

use crate::locator::ResourceLocator;
use crate::resolve::ResolutionHook;
use crate::stager::ContentStager;
use crate::{
    DuplicatePolicy, LoaderConfig, LoaderError, ModuleHandle, ModuleRegistry, ModuleRuntime,
    ResourceBundle,
};
use std::sync::Arc;

/// Loads bundle resources and registers them.
///
/// Shares its bundle, runtime, and registry by `Arc`, so one loader can hand
/// out any number of [`ResolutionHook`]s bound to the same state.
#[derive(Clone)]
pub struct EmbeddedLoader {
    bundle: Arc<dyn ResourceBundle>,
    runtime: Arc<dyn ModuleRuntime>,
    registry: Arc<ModuleRegistry>,
    stager: ContentStager,
    config: LoaderConfig,
}

impl EmbeddedLoader {
    /// Create a loader. Fails if `config` is invalid.
    pub fn new(
        bundle: Arc<dyn ResourceBundle>,
        runtime: Arc<dyn ModuleRuntime>,
        registry: Arc<ModuleRegistry>,
        config: LoaderConfig,
    ) -> Result<Self, LoaderError> {
        let stager = config.stager()?;
        Ok(Self {
            bundle,
            runtime,
            registry,
            stager,
            config,
        })
    }

    /// Load `resource_id` from the bundle and register it.
    ///
    /// `file_name` is the name used if the module has to be staged to disk.
    /// Returns the registered handle. With `DuplicatePolicy::Ignore` that may
    /// be a handle registered earlier under the same identity.
    pub fn load(&self, resource_id: &str, file_name: &str) -> Result<ModuleHandle, LoaderError> {
        self.load_with_policy(resource_id, file_name, self.config.duplicate_policy)
    }

    /// Like [`load`](Self::load) with an explicit duplicate policy.
    pub fn load_with_policy(
        &self,
        resource_id: &str,
        file_name: &str,
        policy: DuplicatePolicy,
    ) -> Result<ModuleHandle, LoaderError> {
        let locator = ResourceLocator::new(self.bundle.as_ref());
        let bytes = locator.locate(resource_id)?;

        let handle = match self.runtime.load_from_bytes(&bytes) {
            Ok(handle) => handle,
            Err(LoaderError::FormatRejected(reason)) => {
                tracing::debug!(resource_id, %reason, "in-memory load rejected, staging to disk");
                let staged = self.stager.stage(&bytes, file_name)?;
                self.runtime.load_from_path(&staged.path)?
            }
            Err(e) => return Err(e),
        };

        let identity = handle.identity().to_string();
        let registration = self.registry.register(&identity, handle, policy)?;
        Ok(registration.into_handle())
    }

    /// Load a startup manifest of `(resource_id, file_name)` pairs in order.
    ///
    /// Stops at the first failure; modules loaded before it stay registered.
    pub fn load_all(&self, manifest: &[(&str, &str)]) -> Result<Vec<ModuleHandle>, LoaderError> {
        manifest
            .iter()
            .map(|(resource_id, file_name)| self.load(resource_id, file_name))
            .collect()
    }

    /// The module registered under `identity`. Never fails.
    #[must_use]
    pub fn get(&self, identity: &str) -> Option<ModuleHandle> {
        self.registry.lookup(identity)
    }

    /// A resolution hook sharing this loader's bundle, runtime, and registry.
    #[must_use]
    pub fn resolution_hook(&self) -> ResolutionHook {
        ResolutionHook::new(
            Arc::clone(&self.bundle),
            Arc::clone(&self.runtime),
            Arc::clone(&self.registry),
            self.stager.clone(),
            &self.config,
        )
    }

    /// The registry this loader populates.
    #[must_use]
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// The stager used for file-backed modules.
    #[must_use]
    pub fn stager(&self) -> &ContentStager {
        &self.stager
    }

    /// The loader's configuration.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

impl std::fmt::Debug for EmbeddedLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedLoader")
            .field("runtime", &self.runtime.name())
            .field("registered", &self.registry.len())
            .field("staging_dir", &self.stager.staging_dir())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
