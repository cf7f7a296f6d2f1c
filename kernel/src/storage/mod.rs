// Object Storage Abstraction
//
// Defines the durability contract every persisted byte goes through.
// Log segments and data objects are both written here, and nothing
// written here is ever mutated afterwards.

use std::io::Read;

pub mod file;
pub mod memory;

pub use file::FileObjectStore;
pub use memory::InMemoryObjectStore;

/// Errors produced by object storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("io error on `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }
}

/// Write-once blob storage keyed by name.
///
/// Properties required from implementations:
/// - `write` is put-if-absent and atomic
/// - `write` is durable once it returns `Ok`
/// - `list` of a missing directory is empty, not an error
///
/// Implementations MUST NOT:
/// - Overwrite an existing key
/// - Expose partially written objects to `read`
pub trait ObjectStore: Send + Sync {
    /// Create `key` with the given contents.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if the key is present.
    fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// List key names inside `subdir` (empty = root) starting with `prefix`
    /// (empty = everything).
    ///
    /// Order is unspecified; callers sort when order matters.
    fn list(&self, subdir: &str, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Open `key` for reading. The returned reader is owned by the caller.
    fn read(&self, key: &str) -> Result<Box<dyn Read + Send>, StorageError>;

    /// Read `key` fully into memory.
    fn read_all(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.read(key)?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| StorageError::io(key, e))?;
        Ok(buf)
    }
}

pub(crate) fn matches_prefix(name: &str, prefix: &str) -> bool {
    prefix.is_empty() || name.starts_with(prefix)
}
