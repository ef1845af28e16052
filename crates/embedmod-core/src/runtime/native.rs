//! Runtime for platform shared libraries (feature `native`).
//!
//! Native code cannot be mapped from an arbitrary buffer portably, so
//! `load_from_bytes` always rejects and the loader stages the library to
//! disk first.

use super::ModuleRuntime;
use crate::primitives::DIGEST_PREFIX_LEN;
use crate::stager::content_hash;
use crate::{LoadOrigin, LoaderError, ModuleHandle};
use std::path::{Path, PathBuf};

const ELF_MAGIC: &[u8] = b"\x7fELF";
const PE_MAGIC: &[u8] = b"MZ";
const MACHO_MAGICS: [[u8; 4]; 4] = [
    [0xfe, 0xed, 0xfa, 0xce],
    [0xce, 0xfa, 0xed, 0xfe],
    [0xfe, 0xed, 0xfa, 0xcf],
    [0xcf, 0xfa, 0xed, 0xfe],
];
const MACHO_FAT_MAGIC: [u8; 4] = [0xca, 0xfe, 0xba, 0xbe];

/// Returns `true` if `bytes` look like an ELF, PE, or Mach-O binary.
fn is_native_binary(bytes: &[u8]) -> bool {
    bytes.starts_with(ELF_MAGIC)
        || bytes.starts_with(PE_MAGIC)
        || bytes.starts_with(&MACHO_FAT_MAGIC)
        || MACHO_MAGICS.iter().any(|m| bytes.starts_with(m))
}

/// A shared library kept open for the life of the process.
///
/// The underlying `libloading::Library` is leaked on load: dropping the last
/// `ModuleHandle` (after a `Replace`, or a lost `Ignore` race) never unloads
/// code that may still be referenced.
#[derive(Debug)]
pub struct NativeLibrary {
    library: &'static libloading::Library,
    path: PathBuf,
}

impl NativeLibrary {
    /// The open library. Valid until the process exits.
    #[must_use]
    pub fn library(&self) -> &'static libloading::Library {
        self.library
    }

    /// The file the library was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up an exported symbol.
    ///
    /// # Safety
    ///
    /// `T` must match the actual type of the exported symbol.
    pub unsafe fn symbol<T>(
        &self,
        name: &[u8],
    ) -> Result<libloading::Symbol<'static, T>, LoaderError> {
        // SAFETY: forwarded to the caller, see above
        unsafe { self.library.get::<T>(name) }
            .map_err(|e| LoaderError::ModuleLoad(format!("symbol lookup failed: {}", e)))
    }
}

/// Loads platform shared libraries through `libloading`.
///
/// Identity: `"<file stem>, Digest=<first 16 hex chars of BLAKE3>"`, since
/// native libraries carry no self-describing name.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    /// Create the runtime.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ModuleRuntime for NativeRuntime {
    fn name(&self) -> &str {
        "native"
    }

    fn load_from_bytes(&self, _bytes: &[u8]) -> Result<ModuleHandle, LoaderError> {
        Err(LoaderError::FormatRejected(
            "native libraries must be loaded from a file".to_string(),
        ))
    }

    fn load_from_path(&self, path: &Path) -> Result<ModuleHandle, LoaderError> {
        let bytes = std::fs::read(path).map_err(|e| {
            LoaderError::ModuleLoad(format!("cannot read {}: {}", path.display(), e))
        })?;
        if !is_native_binary(&bytes) {
            return Err(LoaderError::FormatRejected(
                "not a native shared library".to_string(),
            ));
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("native");
        let hash = content_hash(&bytes);
        let identity = format!("{}, Digest={}", stem, &hash[..DIGEST_PREFIX_LEN]);

        // SAFETY: loading a library runs its initializers. The bytes come from
        // the host's own bundle, which is trusted like the host binary itself.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
            LoaderError::ModuleLoad(format!("cannot open {}: {}", path.display(), e))
        })?;

        Ok(ModuleHandle::new(
            identity,
            LoadOrigin::File(path.to_path_buf()),
            NativeLibrary {
                library: Box::leak(Box::new(library)),
                path: path.to_path_buf(),
            },
        ))
    }
}
