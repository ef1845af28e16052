//! # Resource Locator
//!
//! Stateless reads out of a [`ResourceBundle`].
//!
//! - `locate`: exact-name lookup, whole resource read into memory
//! - `find_by_suffix`: first resource whose name ends with a suffix
//!
//! The locator never caches: bytes are handed to the caller and dropped once
//! the module is loaded or staged.

use crate::{LoaderError, ResourceBundle};
use std::borrow::Cow;

/// Reads resources out of a bundle.
#[derive(Clone, Copy)]
pub struct ResourceLocator<'a> {
    bundle: &'a dyn ResourceBundle,
}

impl<'a> ResourceLocator<'a> {
    /// Create a locator over `bundle`.
    #[must_use]
    pub fn new(bundle: &'a dyn ResourceBundle) -> Self {
        Self { bundle }
    }

    /// Read the resource named exactly `resource_id`.
    ///
    /// Returns `LoaderError::ResourceNotFound` if the bundle has no such
    /// resource.
    pub fn locate(&self, resource_id: &str) -> Result<Cow<'a, [u8]>, LoaderError> {
        self.bundle
            .read(resource_id)?
            .ok_or_else(|| LoaderError::ResourceNotFound(resource_id.to_string()))
    }

    /// Find the first resource whose name ends with `suffix`.
    ///
    /// Matching is case-sensitive. If several resources share the suffix the
    /// first in the bundle's enumeration order wins.
    #[must_use]
    pub fn find_by_suffix(&self, suffix: &str) -> Option<String> {
        if suffix.is_empty() {
            return None;
        }
        self.bundle
            .resource_names()
            .into_iter()
            .find(|name| name.ends_with(suffix))
    }
}
