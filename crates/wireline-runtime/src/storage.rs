//! File-backed blob store
//!
//! Implements the abstract load/save contract over a directory. Writes go
//! to a sibling temp file first and are renamed into place, so a concurrent
//! reader observes either the old blob or the new one, never a mixture.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use wireline_core::{BlobStore, ClientError, PersistenceError, Result};

// ----------------------------------------------------------------------------
// File Blob Store
// ----------------------------------------------------------------------------

/// Blob store rooted at a directory; blob paths become relative file paths
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn read_failed(path: &Path, err: &std::io::Error) -> ClientError {
        PersistenceError::ReadFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
        .into()
    }

    fn write_failed(path: &Path, err: &std::io::Error) -> ClientError {
        PersistenceError::WriteFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
        .into()
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let file = self.blob_path(path);
        match fs::read(&file) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::read_failed(&file, &err)),
        }
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let file = self.blob_path(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(|err| Self::write_failed(&file, &err))?;
        }

        // Temp file + rename gives the atomic-replace the contract requires
        let tmp = file.with_extension("tmp");
        fs::write(&tmp, data).map_err(|err| Self::write_failed(&tmp, &err))?;
        fs::rename(&tmp, &file).map_err(|err| Self::write_failed(&file, &err))
    }

    fn remove(&self, path: &str) -> Result<()> {
        let file = self.blob_path(path);
        match fs::remove_file(&file) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Self::write_failed(&file, &err)),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir()
            .join("wireline-tests")
            .join(uuid::Uuid::new_v4().to_string());
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn read_of_absent_blob_is_none() {
        let store = FileBlobStore::new(scratch_dir());
        assert!(store.read("missing").unwrap().is_none());
    }

    #[test]
    fn write_read_remove_round_trip() {
        let store = FileBlobStore::new(scratch_dir());
        store.write("auth/creds", b"payload").unwrap();
        assert_eq!(store.read("auth/creds").unwrap().unwrap(), b"payload");

        store.remove("auth/creds").unwrap();
        assert!(store.read("auth/creds").unwrap().is_none());
        // Removing again is not an error
        store.remove("auth/creds").unwrap();
    }

    #[test]
    fn overwrite_leaves_no_temp_file_behind() {
        let dir = scratch_dir();
        let store = FileBlobStore::new(dir.clone());
        store.write("mirror", b"one").unwrap();
        store.write("mirror", b"two").unwrap();

        assert_eq!(store.read("mirror").unwrap().unwrap(), b"two");
        assert!(!dir.join("mirror.tmp").exists());
    }
}
