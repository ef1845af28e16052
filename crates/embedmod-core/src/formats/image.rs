//! # Module Image Format
//!
//! Self-describing container for modules loaded by the
//! [`ImageRuntime`](crate::runtime::ImageRuntime).
//!
//! Format: Header (5 bytes) + postcard-serialized `ModuleImage`.
//! - 4 bytes: Magic ("EMOD")
//! - 1 byte: Version
//!
//! The manifest names the module and says whether it may be instantiated
//! straight from memory (`file_backed == false`) or must be loaded from a
//! file on disk.
//!
//! ## Validation
//!
//! Size limits and the header are checked BEFORE the payload is
//! deserialized, so corrupted or hostile input fails fast without large
//! allocations.

use crate::LoaderError;
use crate::primitives::{IMAGE_FORMAT_VERSION, IMAGE_HEADER_LEN, IMAGE_MAGIC, MAX_IMAGE_SIZE};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEADER
// =============================================================================

/// The fixed prefix of every image: the `EMOD` magic, then the format
/// version. Only the version varies, so it is all the header stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub version: u8,
}

impl ImageHeader {
    /// The header this build writes.
    pub const CURRENT: Self = Self {
        version: IMAGE_FORMAT_VERSION,
    };

    /// Read the header at the front of `bytes`.
    ///
    /// Rejects data that is not an image at all, is cut off inside the
    /// header, or was written by another format version.
    pub fn parse(bytes: &[u8]) -> Result<Self, LoaderError> {
        if !ModuleImage::has_magic(bytes) {
            return Err(LoaderError::ImageFormat(
                "not a module image: missing EMOD magic".to_string(),
            ));
        }
        let Some(&version) = bytes.get(IMAGE_HEADER_LEN - 1) else {
            return Err(LoaderError::ImageFormat(
                "image ends before its format version".to_string(),
            ));
        };
        if version != IMAGE_FORMAT_VERSION {
            return Err(LoaderError::ImageFormat(format!(
                "image format version {} cannot be read (this build reads {})",
                version, IMAGE_FORMAT_VERSION
            )));
        }
        Ok(Self { version })
    }

    /// The header bytes as they appear at the start of an image.
    #[must_use]
    pub fn encode(self) -> [u8; IMAGE_HEADER_LEN] {
        let mut bytes = [self.version; IMAGE_HEADER_LEN];
        bytes[..IMAGE_MAGIC.len()].copy_from_slice(IMAGE_MAGIC);
        bytes
    }
}

// =============================================================================
// MANIFEST
// =============================================================================

/// Metadata describing a module image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageManifest {
    /// Module name, the first part of its identity.
    pub name: String,
    /// Module version, reported in its identity.
    pub version: String,
    /// The module can only be loaded from a file on disk.
    pub file_backed: bool,
    /// Symbols the module provides.
    pub exports: Vec<String>,
}

impl ImageManifest {
    /// Manifest for an in-memory loadable module with no exports.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            file_backed: false,
            exports: Vec::new(),
        }
    }

    /// Mark the module as loadable from a file only.
    #[must_use]
    pub fn file_backed(mut self) -> Self {
        self.file_backed = true;
        self
    }

    /// Builder-style export list.
    #[must_use]
    pub fn with_exports(mut self, exports: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exports = exports.into_iter().map(Into::into).collect();
        self
    }

    /// The identity a runtime reports for this module.
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{}, Version={}", self.name, self.version)
    }

    /// Reject names and versions that would produce an ambiguous identity.
    pub fn validate(&self) -> Result<(), LoaderError> {
        if self.name.trim().is_empty() || self.name.contains(',') {
            return Err(LoaderError::ImageFormat(format!(
                "Invalid module name: {:?}",
                self.name
            )));
        }
        if self.version.trim().is_empty() || self.version.contains(',') {
            return Err(LoaderError::ImageFormat(format!(
                "Invalid module version: {:?}",
                self.version
            )));
        }
        Ok(())
    }
}

// =============================================================================
// IMAGE
// =============================================================================

/// A decoded module image: manifest plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleImage {
    pub manifest: ImageManifest,
    pub payload: Vec<u8>,
}

impl ModuleImage {
    /// Create an image.
    #[must_use]
    pub fn new(manifest: ImageManifest, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            manifest,
            payload: payload.into(),
        }
    }

    /// The identity a runtime reports for this module.
    #[must_use]
    pub fn identity(&self) -> String {
        self.manifest.identity()
    }

    /// Returns `true` if `bytes` start with the image magic.
    #[must_use]
    pub fn has_magic(bytes: &[u8]) -> bool {
        bytes.starts_with(IMAGE_MAGIC)
    }

    /// Serialize to bytes (header + payload).
    pub fn to_bytes(&self) -> Result<Vec<u8>, LoaderError> {
        self.manifest.validate()?;

        let body =
            postcard::to_stdvec(self).map_err(|e| LoaderError::ImageFormat(e.to_string()))?;

        let mut result = Vec::with_capacity(IMAGE_HEADER_LEN + body.len());
        result.extend_from_slice(&ImageHeader::CURRENT.encode());
        result.extend_from_slice(&body);

        if result.len() > MAX_IMAGE_SIZE {
            return Err(LoaderError::ImageFormat(format!(
                "Image size {} bytes exceeds maximum allowed {} bytes",
                result.len(),
                MAX_IMAGE_SIZE
            )));
        }
        Ok(result)
    }

    /// Deserialize from bytes.
    ///
    /// Checks the size cap and the header before touching the postcard
    /// body, then validates the decoded manifest.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoaderError> {
        if bytes.len() > MAX_IMAGE_SIZE {
            return Err(LoaderError::ImageFormat(format!(
                "image of {} bytes is over the {} byte limit",
                bytes.len(),
                MAX_IMAGE_SIZE
            )));
        }
        ImageHeader::parse(bytes)?;

        let image: Self = postcard::from_bytes(&bytes[IMAGE_HEADER_LEN..]).map_err(|e| {
            LoaderError::ImageFormat(format!("Failed to decode image body: {}", e))
        })?;
        image.manifest.validate()?;

        Ok(image)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn sample() -> ModuleImage {
        ModuleImage::new(
            ImageManifest::new("Helper", "1.2.0").with_exports(["run", "version"]),
            b"payload".to_vec(),
        )
    }

    #[test]
    fn header_layout() {
        let bytes = ImageHeader::CURRENT.encode();

        assert_eq!(&bytes[..4], IMAGE_MAGIC);
        assert_eq!(bytes[4], IMAGE_FORMAT_VERSION);
        assert_eq!(ImageHeader::parse(&bytes).unwrap(), ImageHeader::CURRENT);
    }

    #[test]
    fn header_cut_off_before_version() {
        let err = ImageHeader::parse(IMAGE_MAGIC).unwrap_err();
        assert!(err.to_string().contains("before its format version"));
        assert!(ImageHeader::parse(b"EM").is_err());
    }

    #[test]
    fn image_bytes_start_with_header() {
        let bytes = sample().to_bytes().unwrap();

        assert!(ModuleImage::has_magic(&bytes));
        assert_eq!(bytes[4], IMAGE_FORMAT_VERSION);
        assert_eq!(ModuleImage::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn identity_format() {
        assert_eq!(sample().identity(), "Helper, Version=1.2.0");
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[0..4].copy_from_slice(b"XXXX");

        assert!(matches!(
            ModuleImage::from_bytes(&bytes),
            Err(LoaderError::ImageFormat(_))
        ));
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[4] = IMAGE_FORMAT_VERSION + 1;

        let err = ModuleImage::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("format version 2 cannot be read"));
    }

    #[test]
    fn truncated_body_rejected() {
        let bytes = sample().to_bytes().unwrap();
        assert!(ModuleImage::from_bytes(&bytes[..bytes.len() - 3]).is_err());
        assert!(ModuleImage::from_bytes(&bytes[..3]).is_err());
    }

    #[test]
    fn ambiguous_manifest_rejected() {
        let image = ModuleImage::new(ImageManifest::new("Bad, Name", "1.0"), Vec::new());
        assert!(image.to_bytes().is_err());

        let image = ModuleImage::new(ImageManifest::new("Good", ""), Vec::new());
        assert!(image.to_bytes().is_err());
    }
}
