//! Directory-backed bundle.
//!
//! Exposes every regular file below a root directory under a manifest-style
//! name: the relative path with separators replaced by `.`, optionally
//! prefixed by a namespace. `modules/Helper.dll` under namespace `App`
//! becomes `App.modules.Helper.dll`.

use super::ResourceBundle;
use crate::primitives::{DEFAULT_MAX_RESOURCE_SIZE, RESOURCE_NAME_SEPARATOR};
use crate::LoaderError;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Resources read from files under a directory.
///
/// The directory is indexed once at [`DirectoryBundle::open`]; files added
/// later are not visible. Contents are read on every `read` call and are not
/// cached.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
    index: BTreeMap<String, PathBuf>,
    max_resource_size: u64,
}

impl DirectoryBundle {
    /// Index `root`, naming resources `<namespace>.<relative.path>`.
    pub fn open(root: impl AsRef<Path>, namespace: Option<&str>) -> Result<Self, LoaderError> {
        let root = root.as_ref().to_path_buf();
        let mut index = BTreeMap::new();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let entries = std::fs::read_dir(&dir).map_err(|e| LoaderError::ResourceRead {
                id: dir.display().to_string(),
                reason: format!("cannot list directory: {}", e),
            })?;

            for entry in entries {
                let entry = entry.map_err(|e| LoaderError::ResourceRead {
                    id: dir.display().to_string(),
                    reason: e.to_string(),
                })?;
                let file_type = entry.file_type().map_err(|e| LoaderError::ResourceRead {
                    id: entry.path().display().to_string(),
                    reason: e.to_string(),
                })?;
                let path = entry.path();

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Some(name) = manifest_name(&root, &path, namespace) {
                        index.insert(name, path);
                    }
                }
                // Symlinks and special files are skipped
            }
        }

        Ok(Self {
            root,
            index,
            max_resource_size: DEFAULT_MAX_RESOURCE_SIZE,
        })
    }

    /// Refuse to read resources larger than `bytes`.
    #[must_use]
    pub fn with_max_resource_size(mut self, bytes: u64) -> Self {
        self.max_resource_size = bytes;
        self
    }

    /// The indexed root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file backing a resource name.
    #[must_use]
    pub fn path_of(&self, resource_id: &str) -> Option<&Path> {
        self.index.get(resource_id).map(PathBuf::as_path)
    }
}

impl ResourceBundle for DirectoryBundle {
    fn resource_names(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }

    fn read(&self, resource_id: &str) -> Result<Option<Cow<'_, [u8]>>, LoaderError> {
        let Some(path) = self.index.get(resource_id) else {
            return Ok(None);
        };

        let read_error = |reason: String| LoaderError::ResourceRead {
            id: resource_id.to_string(),
            reason,
        };

        let metadata = std::fs::metadata(path).map_err(|e| read_error(e.to_string()))?;
        if metadata.len() > self.max_resource_size {
            return Err(read_error(format!(
                "size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                self.max_resource_size
            )));
        }

        let bytes = std::fs::read(path).map_err(|e| read_error(e.to_string()))?;
        Ok(Some(Cow::Owned(bytes)))
    }
}

/// Build the manifest name for `path` relative to `root`.
fn manifest_name(root: &Path, path: &Path, namespace: Option<&str>) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts: Vec<String> = Vec::new();

    if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
        parts.push(ns.to_string());
    }
    for component in relative.components() {
        parts.push(component.as_os_str().to_str()?.to_string());
    }

    Some(parts.join(&RESOURCE_NAME_SEPARATOR.to_string()))
}
