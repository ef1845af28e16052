//! # Module Registry
//!
//! Maps a module's fully-qualified identity to its loaded handle.
//!
//! This is the only shared mutable state in the loader. It is an explicit
//! service object: hosts construct one (or take the lazily created
//! [`ModuleRegistry::shared`] instance) and hand an `Arc` of it to the loader
//! and the resolution hook.
//!
//! ## Concurrency
//!
//! One `RwLock` guards the whole map. Loads are rare and short, so a coarse
//! lock is enough. Readers never observe a half-inserted entry. A poisoned
//! lock is recovered, since every write is a single map operation.
//!
//! ## Lookups Never Fail
//!
//! The host probes the registry for many identities this loader does not own
//! (images, satellite resources). `lookup` answers those with `None`.

use crate::{LoaderError, ModuleHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// What `register` does when the identity is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Return `LoaderError::DuplicateRegistration`.
    #[default]
    Fail,
    /// Keep the existing handle and return it.
    Ignore,
    /// Swap in the new handle.
    Replace,
}

/// Outcome of a successful `register` call.
#[derive(Debug, Clone)]
pub enum Registration {
    /// The identity was new.
    Inserted(ModuleHandle),
    /// The identity existed; the returned handle is the one kept.
    Kept(ModuleHandle),
    /// The identity existed and was overwritten with the returned handle.
    Replaced(ModuleHandle),
}

impl Registration {
    /// The handle now stored under the identity.
    #[must_use]
    pub fn into_handle(self) -> ModuleHandle {
        match self {
            Self::Inserted(h) | Self::Kept(h) | Self::Replaced(h) => h,
        }
    }
}

static SHARED: OnceLock<Arc<ModuleRegistry>> = OnceLock::new();

/// Process-wide identity → handle map.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: RwLock<BTreeMap<String, ModuleHandle>>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The lazily created process-wide registry.
    ///
    /// Initialized exactly once, even under concurrent first use. Never torn
    /// down.
    pub fn shared() -> Arc<Self> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new())))
    }

    /// Register `handle` under `identity` following `policy`.
    pub fn register(
        &self,
        identity: &str,
        handle: ModuleHandle,
        policy: DuplicatePolicy,
    ) -> Result<Registration, LoaderError> {
        let mut modules = self.write();

        if let Some(existing) = modules.get(identity) {
            match policy {
                DuplicatePolicy::Fail => {
                    return Err(LoaderError::DuplicateRegistration(identity.to_string()));
                }
                DuplicatePolicy::Ignore => {
                    tracing::debug!(identity, "module already registered, keeping existing");
                    return Ok(Registration::Kept(existing.clone()));
                }
                DuplicatePolicy::Replace => {}
            }
        }

        let replaced = modules
            .insert(identity.to_string(), handle.clone())
            .is_some();

        if replaced {
            tracing::info!(identity, origin = %handle.origin(), "module registration replaced");
            Ok(Registration::Replaced(handle))
        } else {
            tracing::info!(identity, origin = %handle.origin(), "module registered");
            Ok(Registration::Inserted(handle))
        }
    }

    /// The handle registered under `identity`, if any.
    #[must_use]
    pub fn lookup(&self, identity: &str) -> Option<ModuleHandle> {
        self.read().get(identity).cloned()
    }

    /// Returns `true` if `identity` is registered.
    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.read().contains_key(identity)
    }

    /// All registered identities, sorted.
    #[must_use]
    pub fn identities(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, ModuleHandle>> {
        self.modules.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ModuleHandle>> {
        self.modules.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// TESTS
// =============================================================================
