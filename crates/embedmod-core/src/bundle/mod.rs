//! # Resource Bundles
//!
//! A bundle is the host program's set of embedded binary blobs, addressed by
//! manifest-style names such as `App.Helper.dll`.
//!
//! Three implementations ship with the crate:
//! - `StaticBundle`: blobs compiled into the binary with `include_bytes!`
//!   (see [`embedded_bundle!`](crate::embedded_bundle))
//! - `MemoryBundle`: owned blobs assembled at runtime
//! - `DirectoryBundle`: files under a directory, exposed under manifest names
//!
//! All of them enumerate names in sorted order.

mod directory;

pub use directory::DirectoryBundle;

use crate::LoaderError;
use std::borrow::Cow;
use std::collections::BTreeMap;

// =============================================================================
// BUNDLE TRAIT
// =============================================================================

/// Read-only access to a host's embedded resources.
///
/// Bundles must be `Send + Sync`: the resolution hook reads them from
/// whatever thread the host resolves modules on.
pub trait ResourceBundle: Send + Sync {
    /// All resource names in the bundle, in enumeration order.
    fn resource_names(&self) -> Vec<String>;

    /// Read a resource by its exact name.
    ///
    /// Returns `Ok(None)` if no resource has that name. An `Err` means the
    /// resource exists but could not be read.
    fn read(&self, resource_id: &str) -> Result<Option<Cow<'_, [u8]>>, LoaderError>;
}

// =============================================================================
// STATIC BUNDLE
// =============================================================================

/// Resources compiled into the host binary.
///
/// Usually built with [`embedded_bundle!`](crate::embedded_bundle).
#[derive(Debug, Clone, Copy)]
pub struct StaticBundle {
    entries: &'static [(&'static str, &'static [u8])],
}

impl StaticBundle {
    /// Wrap a static table of `(name, bytes)` pairs.
    #[must_use]
    pub const fn new(entries: &'static [(&'static str, &'static [u8])]) -> Self {
        Self { entries }
    }

    /// Number of resources in the bundle.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the bundle holds no resources.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResourceBundle for StaticBundle {
    fn resource_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .map(|(name, _)| (*name).to_string())
            .collect();
        names.sort();
        names
    }

    fn read(&self, resource_id: &str) -> Result<Option<Cow<'_, [u8]>>, LoaderError> {
        Ok(self
            .entries
            .iter()
            .find(|(name, _)| *name == resource_id)
            .map(|(_, bytes)| Cow::Borrowed(*bytes)))
    }
}

/// Build a [`StaticBundle`] from files embedded at compile time.
///
/// Paths are resolved relative to the file containing the invocation, as
/// with `include_bytes!`.
///
/// ```ignore
/// static BUNDLE: StaticBundle = embedmod_core::embedded_bundle! {
///     "App.Helper.dll" => "../modules/Helper.dll",
///     "App.Codec.dll" => "../modules/Codec.dll",
/// };
/// ```
#[macro_export]
macro_rules! embedded_bundle {
    ($($name:literal => $path:literal),* $(,)?) => {{
        static ENTRIES: &[(&str, &[u8])] = &[$(($name, include_bytes!($path) as &[u8])),*];
        $crate::StaticBundle::new(ENTRIES)
    }};
}

// =============================================================================
// MEMORY BUNDLE
// =============================================================================

/// Owned resources held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBundle {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryBundle {
    /// Create an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    /// Add or replace a resource.
    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), bytes.into());
    }

    /// Number of resources in the bundle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the bundle holds no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResourceBundle for MemoryBundle {
    fn resource_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn read(&self, resource_id: &str) -> Result<Option<Cow<'_, [u8]>>, LoaderError> {
        Ok(self
            .entries
            .get(resource_id)
            .map(|bytes| Cow::Borrowed(bytes.as_slice())))
    }
}

// =============================================================================
// TESTS
// =============================================================================
