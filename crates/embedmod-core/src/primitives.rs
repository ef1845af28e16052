//! # Loader Primitives
//!
//! Fixed constants for the embedmod loader.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Anything a host may reasonably want to change lives in
//! [`LoaderConfig`](crate::LoaderConfig) instead.

/// Magic bytes for the module image header.
///
/// - Image = Magic Bytes ("EMOD") + Version (u8) before the postcard payload.
pub const IMAGE_MAGIC: &[u8; 4] = b"EMOD";

/// Current module image format version.
///
/// Increment this when making breaking changes to the image layout.
pub const IMAGE_FORMAT_VERSION: u8 = 1;

/// Size of the image header (magic + version).
pub const IMAGE_HEADER_LEN: usize = 5;

/// Maximum size of a single module image (256 MB).
///
/// Validated BEFORE deserialization so a corrupted length prefix cannot
/// trigger a huge allocation.
pub const MAX_IMAGE_SIZE: usize = 256 * 1024 * 1024;

/// Default upper bound for a single bundle resource read from disk (256 MB).
pub const DEFAULT_MAX_RESOURCE_SIZE: u64 = 256 * 1024 * 1024;

/// Extension appended to a requested short name when searching the bundle.
pub const DEFAULT_MODULE_EXTENSION: &str = "dll";

/// Separator used in manifest-style resource names (`App.Helper.dll`).
pub const RESOURCE_NAME_SEPARATOR: char = '.';

/// Number of hex characters of the content hash used in native identities.
pub const DIGEST_PREFIX_LEN: usize = 16;

/// Maximum length of a staging file name or namespace component.
pub const MAX_FILE_NAME_LENGTH: usize = 255;
