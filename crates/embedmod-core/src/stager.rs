//! # Content Stager
//!
//! Persists module bytes to a deterministic path so runtimes that can only
//! load from a file have something to load.
//!
//! Layout: `<root>/<namespace>/<file_name>`, or `<root>/<file_name>` when no
//! namespace is set. The path depends on the file name only; the BLAKE3 hash
//! of the content decides whether an existing file can be reused.
//!
//! ## Write Protocol
//!
//! 1. Hash the incoming bytes
//! 2. If the target exists and hashes the same, reuse it (no write)
//! 3. Otherwise write a temporary file in the same directory and rename it
//!    over the target
//!
//! The rename makes a half-written file unobservable under the final name,
//! so a later hash comparison only ever sees complete content.
//!
//! ## Collisions
//!
//! The staging root is usually the shared system temp directory. Two
//! programs staging different bytes under the same name overwrite each
//! other; the namespace subdirectory keeps unrelated hosts apart. Staging
//! is not synchronized across threads or processes. Concurrent staging of
//! identical bytes converges on the same file.

use crate::LoaderError;
use crate::primitives::MAX_FILE_NAME_LENGTH;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

// =============================================================================
// HASHING
// =============================================================================

/// BLAKE3 hash of `bytes` as lowercase hex.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

// =============================================================================
// STAGED FILE
// =============================================================================

/// A file on disk whose content hash is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Location of the staged file.
    pub path: PathBuf,
    /// BLAKE3 hex digest of its content.
    pub hash: String,
}

// =============================================================================
// STAGER
// =============================================================================

/// Writes module bytes under a staging root, skipping unchanged files.
#[derive(Debug, Clone)]
pub struct ContentStager {
    root: PathBuf,
    namespace: Option<String>,
}

impl ContentStager {
    /// Stage directly under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            namespace: None,
        }
    }

    /// Stage under `root/<namespace>`.
    pub fn with_namespace(
        root: impl Into<PathBuf>,
        namespace: impl Into<String>,
    ) -> Result<Self, LoaderError> {
        let namespace = namespace.into();
        validate_path_component(&namespace)?;
        Ok(Self {
            root: root.into(),
            namespace: Some(namespace),
        })
    }

    /// The staging root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory staged files land in.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        match &self.namespace {
            Some(ns) => self.root.join(ns),
            None => self.root.clone(),
        }
    }

    /// The path `file_name` would be staged at.
    pub fn staging_path(&self, file_name: &str) -> Result<PathBuf, LoaderError> {
        validate_path_component(file_name)?;
        Ok(self.staging_dir().join(file_name))
    }

    /// Make `bytes` available on disk as `file_name`.
    ///
    /// Reuses the existing file when its hash matches; otherwise writes
    /// (overwriting). Any I/O failure is returned as
    /// `LoaderError::StagingIo` and is not retried.
    pub fn stage(&self, bytes: &[u8], file_name: &str) -> Result<StagedFile, LoaderError> {
        let path = self.staging_path(file_name)?;
        let dir = self.staging_dir();
        let hash = content_hash(bytes);

        if let Some(existing) = existing_hash(&path)? {
            if existing == hash {
                tracing::debug!(path = %path.display(), %hash, "staged file up to date");
                return Ok(StagedFile { path, hash });
            }
            tracing::debug!(path = %path.display(), "staged file is stale, rewriting");
        }

        std::fs::create_dir_all(&dir).map_err(|e| io_error(&dir, &e))?;
        write_atomic(&dir, &path, bytes)?;

        tracing::debug!(path = %path.display(), %hash, size = bytes.len(), "staged file written");
        Ok(StagedFile { path, hash })
    }
}

/// Hash of the file at `path`, or `None` if there is no such file.
fn existing_hash(path: &Path) -> Result<Option<String>, LoaderError> {
    match std::fs::read(path) {
        Ok(existing) => Ok(Some(content_hash(&existing))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, &e)),
    }
}

/// Write `bytes` to a temp file in `dir`, then rename it to `path`.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), LoaderError> {
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(dir, &e))?;
    temp.write_all(bytes).map_err(|e| io_error(temp.path(), &e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| io_error(temp.path(), &e))?;
    temp.persist(path).map_err(|e| io_error(path, &e.error))?;
    Ok(())
}

fn io_error(path: &Path, err: &std::io::Error) -> LoaderError {
    LoaderError::StagingIo {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Check that `name` is a single, plain path component.
///
/// Rejects empty names, `.`/`..`, separators, and NUL bytes so a caller
/// supplied name can never escape the staging directory.
pub fn validate_path_component(name: &str) -> Result<(), LoaderError> {
    let invalid = || LoaderError::InvalidFileName(name.to_string());

    if name.is_empty() || name.len() > MAX_FILE_NAME_LENGTH {
        return Err(invalid());
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(invalid());
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
