// Local Filesystem Object Store
//
// One file per key under a root directory. Objects are staged in a
// synced temp file and published with a no-clobber rename, so a key is
// either absent or complete. Put-if-absent comes from the rename.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;
use tracing::debug;

use super::{matches_prefix, ObjectStore, StorageError};

/// Staging files carry this prefix and are never listed.
const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Clone)]
pub struct FileObjectStore {
    dir: PathBuf,
}

impl FileObjectStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(dir.display().to_string(), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    #[cfg(unix)]
    fn sync_dir(&self) -> std::io::Result<()> {
        File::open(&self.dir)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> std::io::Result<()> {
        Ok(())
    }
}

impl ObjectStore for FileObjectStore {
    fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path(key);
        if path.exists() {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }

        // Dropping the staging file on any error path removes it.
        let mut staged = Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| StorageError::io(key, e))?;
        staged.write_all(data).map_err(|e| StorageError::io(key, e))?;
        staged
            .as_file()
            .sync_all()
            .map_err(|e| StorageError::io(key, e))?;

        staged.persist_noclobber(&path).map_err(|e| match e.error.kind() {
            ErrorKind::AlreadyExists => StorageError::AlreadyExists(key.to_string()),
            _ => StorageError::io(key, e.error),
        })?;
        self.sync_dir().map_err(|e| StorageError::io(key, e))?;

        debug!(key, bytes = data.len(), "object written");
        Ok(())
    }

    fn list(&self, subdir: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let root = if subdir.is_empty() {
            self.dir.clone()
        } else {
            self.dir.join(subdir)
        };

        let mut names = Vec::new();
        let mut pending = vec![root];

        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::io(dir.display().to_string(), e)),
            };

            for entry in entries {
                let entry = entry.map_err(|e| StorageError::io(dir.display().to_string(), e))?;
                let file_type = entry
                    .file_type()
                    .map_err(|e| StorageError::io(entry.path().display().to_string(), e))?;

                if file_type.is_dir() {
                    pending.push(entry.path());
                    continue;
                }

                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with(STAGING_PREFIX) {
                    continue;
                }
                if matches_prefix(&name, prefix) {
                    names.push(name);
                }
            }
        }

        Ok(names)
    }

    fn read(&self, key: &str) -> Result<Box<dyn Read + Send>, StorageError> {
        let file = File::open(self.path(key)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::io(key, e),
        })?;
        Ok(Box::new(file))
    }
}
