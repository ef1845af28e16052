//! # Core Type Definitions
//!
//! This module contains the types shared by every loader component:
//! - Loaded module handles (`ModuleHandle`, `LoadOrigin`)
//! - Resolution requests coming from the host (`ModuleRequest`)
//! - Error types (`LoaderError`)

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// LOAD ORIGIN
// =============================================================================

/// Where a module was instantiated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Loaded straight from an in-memory buffer.
    Memory,
    /// Loaded from a file on disk (usually a staged file).
    File(PathBuf),
}

impl LoadOrigin {
    /// The backing file, if the module was loaded from disk.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Memory => None,
            Self::File(path) => Some(path),
        }
    }
}

impl fmt::Display for LoadOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

// =============================================================================
// MODULE HANDLE
// =============================================================================

struct HandleInner {
    identity: String,
    origin: LoadOrigin,
    payload: Box<dyn Any + Send + Sync>,
}

/// Opaque reference to a module loaded by a [`ModuleRuntime`](crate::ModuleRuntime).
///
/// Handles are cheap to clone and share the same loaded module. The identity
/// is assigned by the runtime at load time and is the registry key. The
/// runtime-specific payload (a parsed image, a native library) is reachable
/// through [`ModuleHandle::payload`].
#[derive(Clone)]
pub struct ModuleHandle {
    inner: Arc<HandleInner>,
}

impl ModuleHandle {
    /// Wrap a freshly loaded module.
    pub fn new<T>(identity: impl Into<String>, origin: LoadOrigin, payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            inner: Arc::new(HandleInner {
                identity: identity.into(),
                origin,
                payload: Box::new(payload),
            }),
        }
    }

    /// The fully-qualified identity reported at load time.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    /// Where the module was loaded from.
    #[must_use]
    pub fn origin(&self) -> &LoadOrigin {
        &self.inner.origin
    }

    /// Borrow the runtime-specific payload if it has type `T`.
    #[must_use]
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.inner.payload.downcast_ref::<T>()
    }

    /// Returns `true` if both handles refer to the same loaded module.
    #[must_use]
    pub fn same_module(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("identity", &self.inner.identity)
            .field("origin", &self.inner.origin)
            .finish()
    }
}

// =============================================================================
// MODULE REQUEST
// =============================================================================

/// A module name as handed to the resolution hook by the host.
///
/// Requests look like `Helper` or `Helper, Version=1.2.0`. The short name is
/// the text before the first comma; everything after it is kept only for
/// display and registry lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    full_name: String,
    short_name: String,
}

impl ModuleRequest {
    /// Parse a requested module name.
    #[must_use]
    pub fn parse(requested: &str) -> Self {
        let full_name = requested.trim();
        let short_name = full_name
            .split(',')
            .next()
            .map(str::trim)
            .unwrap_or_default();

        Self {
            full_name: full_name.to_string(),
            short_name: short_name.to_string(),
        }
    }

    /// The full request string (trimmed).
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The bare module name, without qualifiers.
    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// The resource-name suffix to search for: `<short_name>.<extension>`.
    #[must_use]
    pub fn file_suffix(&self, extension: &str) -> String {
        format!("{}.{}", self.short_name, extension.trim_start_matches('.'))
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while loading embedded modules.
///
/// Only `ResourceNotFound` and the staging failures are expected to escape a
/// host's startup `load` calls; the resolution hook never returns any of
/// these to the host.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The requested resource is not part of the bundle.
    #[error("Resource not found in bundle: {0}")]
    ResourceNotFound(String),

    /// The bundle holds the resource but it could not be read.
    #[error("Failed to read resource {id}: {reason}")]
    ResourceRead { id: String, reason: String },

    /// The runtime cannot instantiate these bytes from this source.
    #[error("Module format rejected: {0}")]
    FormatRejected(String),

    /// The runtime recognised the module but failed to instantiate it.
    #[error("Module load failed: {0}")]
    ModuleLoad(String),

    /// Writing or reading a staged file failed.
    #[error("Staging I/O error at {}: {reason}", path.display())]
    StagingIo { path: PathBuf, reason: String },

    /// A file outside the staging cache could not be read or written.
    #[error("I/O error at {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    /// The staging file name is not a single plain path component.
    #[error("Invalid staging file name: {0:?}")]
    InvalidFileName(String),

    /// An identity was registered twice under the `Fail` policy.
    #[error("Module already registered: {0}")]
    DuplicateRegistration(String),

    /// A module image could not be encoded or decoded.
    #[error("Image format error: {0}")]
    ImageFormat(String),

    /// The loader configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LoaderError {
    /// Returns `true` for rejections the loader recovers from by staging.
    #[must_use]
    pub fn is_format_rejection(&self) -> bool {
        matches!(self, Self::FormatRejected(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_short_name_strips_qualifiers() {
        let request = ModuleRequest::parse("Helper, Version=1.2.0, Culture=neutral");
        assert_eq!(request.short_name(), "Helper");
        assert_eq!(request.full_name(), "Helper, Version=1.2.0, Culture=neutral");
        assert_eq!(request.file_suffix("dll"), "Helper.dll");
    }

    #[test]
    fn request_bare_name() {
        let request = ModuleRequest::parse("  Helper ");
        assert_eq!(request.short_name(), "Helper");
        assert_eq!(request.file_suffix(".so"), "Helper.so");
    }

    #[test]
    fn request_empty_name() {
        let request = ModuleRequest::parse("");
        assert!(request.short_name().is_empty());
    }

    #[test]
    fn handle_payload_downcast() {
        let handle = ModuleHandle::new("Mod, Version=1.0.0", LoadOrigin::Memory, 42u32);

        assert_eq!(handle.identity(), "Mod, Version=1.0.0");
        assert_eq!(handle.payload::<u32>(), Some(&42));
        assert!(handle.payload::<String>().is_none());
        assert!(handle.origin().path().is_none());
    }

    #[test]
    fn handle_clones_share_module() {
        let a = ModuleHandle::new("A", LoadOrigin::Memory, ());
        let b = a.clone();
        let c = ModuleHandle::new("A", LoadOrigin::Memory, ());

        assert!(a.same_module(&b));
        assert!(!a.same_module(&c));
    }

    #[test]
    fn staging_error_mentions_path() {
        let err = LoaderError::StagingIo {
            path: PathBuf::from("/tmp/x/Mod.bin"),
            reason: "disk full".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/x/Mod.bin"));
        assert!(message.contains("disk full"));
    }
}
