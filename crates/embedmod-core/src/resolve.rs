//! # Resolution Hook
//!
//! Answers the host's "module not found" callback from the bundle.
//!
//! The host calls resolvers whenever code references a module it cannot find
//! through normal means. Most requests are not ours (images, satellite
//! resources, modules provided elsewhere), so a miss or a failure here is an
//! expected outcome: the hook reports it as [`Resolution::Unhandled`] or
//! [`Resolution::Failed`] and the host moves on to its next strategy. Only
//! [`Resolution::Handled`] ever hands a module back.
//!
//! ## Resolution Sequence
//!
//! 1. Parse the request into a short name (`Helper, Version=1.0` → `Helper`)
//! 2. Return the registered handle if the full request is already loaded
//! 3. Find the first bundle resource ending with `<short name>.<extension>`
//! 4. Locate it and instantiate it from memory (optionally via staging)
//! 5. Register it, converging with any concurrent resolution of the same
//!    module, and return it
//!
//! ## Host Side
//!
//! [`ResolverChain`] models the host's resolution event: an ordered list of
//! [`ModuleResolver`]s tried until one handles the request. Registration is
//! idempotent per resolver name.

use crate::locator::ResourceLocator;
use crate::stager::ContentStager;
use crate::{
    DuplicatePolicy, LoaderConfig, LoaderError, ModuleHandle, ModuleRegistry, ModuleRequest,
    ModuleRuntime, ResourceBundle,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

// =============================================================================
// RESOLUTION RESULT
// =============================================================================

/// Outcome of one resolution attempt.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The module was found and loaded.
    Handled(ModuleHandle),
    /// The request is not one this resolver owns.
    Unhandled,
    /// A candidate was found but could not be loaded. Kept for diagnostics;
    /// the host sees it as "no result".
    Failed(String),
}

impl Resolution {
    /// The handle to give back to the host, if any.
    #[must_use]
    pub fn into_handle(self) -> Option<ModuleHandle> {
        match self {
            Self::Handled(handle) => Some(handle),
            Self::Unhandled | Self::Failed(_) => None,
        }
    }

    /// Returns `true` for `Handled`.
    #[must_use]
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }
}

// =============================================================================
// RESOLVER TRAIT
// =============================================================================

/// One strategy in the host's module resolution chain.
pub trait ModuleResolver: Send + Sync {
    /// Name used to deduplicate registrations.
    fn name(&self) -> &str;

    /// Try to satisfy `request`. Must not panic.
    fn resolve(&self, request: &ModuleRequest) -> Resolution;
}

// =============================================================================
// RESOLUTION HOOK
// =============================================================================

/// Resolves module requests from an embedded bundle.
#[derive(Clone)]
pub struct ResolutionHook {
    bundle: Arc<dyn ResourceBundle>,
    runtime: Arc<dyn ModuleRuntime>,
    registry: Arc<ModuleRegistry>,
    stager: ContentStager,
    extension: String,
    stage_on_resolve: bool,
}

impl ResolutionHook {
    /// Name under which the hook registers in a [`ResolverChain`].
    pub const NAME: &'static str = "embedded-bundle";

    /// Create a hook. Usually obtained from
    /// [`EmbeddedLoader::resolution_hook`](crate::EmbeddedLoader::resolution_hook).
    #[must_use]
    pub fn new(
        bundle: Arc<dyn ResourceBundle>,
        runtime: Arc<dyn ModuleRuntime>,
        registry: Arc<ModuleRegistry>,
        stager: ContentStager,
        config: &LoaderConfig,
    ) -> Self {
        Self {
            bundle,
            runtime,
            registry,
            stager,
            extension: config.module_extension.trim_start_matches('.').to_string(),
            stage_on_resolve: config.stage_on_resolve,
        }
    }

    /// Resolve a raw request string such as `"Helper, Version=1.0.0"`.
    #[must_use]
    pub fn resolve_name(&self, requested: &str) -> Resolution {
        self.resolve(&ModuleRequest::parse(requested))
    }

    fn try_resolve(&self, request: &ModuleRequest) -> Result<Option<ModuleHandle>, LoaderError> {
        if request.short_name().is_empty() {
            return Ok(None);
        }
        if let Some(handle) = self.registry.lookup(request.full_name()) {
            return Ok(Some(handle));
        }

        let locator = ResourceLocator::new(self.bundle.as_ref());
        let suffix = request.file_suffix(&self.extension);
        let Some(resource_id) = locator.find_by_suffix(&suffix) else {
            return Ok(None);
        };

        let bytes = locator.locate(&resource_id)?;
        let handle = match self.runtime.load_from_bytes(&bytes) {
            Err(LoaderError::FormatRejected(_)) if self.stage_on_resolve => {
                let staged = self.stager.stage(&bytes, &suffix)?;
                self.runtime.load_from_path(&staged.path)?
            }
            outcome => outcome?,
        };

        let identity = handle.identity().to_string();
        let registration = self
            .registry
            .register(&identity, handle, DuplicatePolicy::Ignore)?;
        Ok(Some(registration.into_handle()))
    }
}

impl ModuleResolver for ResolutionHook {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn resolve(&self, request: &ModuleRequest) -> Resolution {
        // Bundles and runtimes are host-supplied; a panic in one must not
        // unwind into the host's resolution chain. Registry state survives
        // an unwind since its lock recovers from poisoning.
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.try_resolve(request))) {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(request = request.full_name(), "bundle resolution panicked");
                return Resolution::Failed("resolver panicked".to_string());
            }
        };

        match outcome {
            Ok(Some(handle)) => {
                tracing::debug!(
                    request = request.full_name(),
                    identity = handle.identity(),
                    "module resolved from bundle"
                );
                Resolution::Handled(handle)
            }
            Ok(None) => Resolution::Unhandled,
            Err(e) => {
                tracing::warn!(request = request.full_name(), error = %e, "bundle resolution failed");
                Resolution::Failed(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ResolutionHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionHook")
            .field("runtime", &self.runtime.name())
            .field("extension", &self.extension)
            .field("stage_on_resolve", &self.stage_on_resolve)
            .finish()
    }
}

// =============================================================================
// RESOLVER CHAIN
// =============================================================================

/// The host's ordered list of resolution strategies.
#[derive(Default)]
pub struct ResolverChain {
    resolvers: RwLock<Vec<Arc<dyn ModuleResolver>>>,
}

impl ResolverChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `resolver` unless one with the same name is registered.
    ///
    /// Returns `true` if it was added.
    pub fn register(&self, resolver: Arc<dyn ModuleResolver>) -> bool {
        let mut resolvers = self
            .resolvers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if resolvers.iter().any(|r| r.name() == resolver.name()) {
            return false;
        }
        resolvers.push(resolver);
        true
    }

    /// Number of registered resolvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no resolver is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ask each resolver in order; the first `Handled` wins.
    #[must_use]
    pub fn resolve(&self, requested: &str) -> Option<ModuleHandle> {
        let request = ModuleRequest::parse(requested);
        // Snapshot so resolvers can re-enter the chain without deadlocking
        let resolvers: Vec<_> = self
            .resolvers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(&request).into_handle())
    }
}

impl std::fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resolvers = self
            .resolvers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let names: Vec<&str> = resolvers.iter().map(|r| r.name()).collect();
        f.debug_struct("ResolverChain")
            .field("resolvers", &names)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
