//! On-disk store for raw uploaded documents.
//!
//! Documents are kept verbatim under a flat directory so a full rebuild can
//! re-derive the corpus at a different chunk size. Names are restricted to
//! plain file names; anything containing a path separator is rejected before
//! touching the filesystem.

use super::types::StoreError;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Flat directory of uploaded documents, addressed by file name.
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Open the store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Persist raw document bytes, replacing any previous upload of the same name.
    pub fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.resolve(name)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Read a document's raw bytes, or `None` when it was never uploaded.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.resolve(name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove a document; missing files are tolerated so deletion stays idempotent.
    pub fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Enumerate stored document names in sorted order.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| {
                StoreError::Io(err.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walkdir loop")
                }))
            })?;
            if entry.file_type().is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_name(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    // One path component only; separators would escape the store root.
    !name.contains(['/', '\\']) && !Path::new(name).has_root()
}
