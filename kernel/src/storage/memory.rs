use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::Read;

use bytes::{Buf, Bytes};
use parking_lot::RwLock;

use super::{matches_prefix, ObjectStore, StorageError};

/// In-process object store with the same put-if-absent contract as
/// [`FileObjectStore`](super::FileObjectStore).
///
/// Keys may contain `/` to emulate subdirectories; `list` returns the last
/// path component, matching the filesystem backend.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        match self.objects.write().entry(key.to_string()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Bytes::copy_from_slice(data));
                Ok(())
            }
        }
    }

    fn list(&self, subdir: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = if subdir.is_empty() {
            String::new()
        } else {
            format!("{}/", subdir.trim_end_matches('/'))
        };

        let objects = self.objects.read();
        let names = objects
            .keys()
            .filter_map(|key| key.strip_prefix(dir.as_str()))
            .map(|rest| rest.rsplit('/').next().unwrap_or(rest))
            .filter(|name| matches_prefix(name, prefix))
            .map(str::to_string)
            .collect();
        Ok(names)
    }

    fn read(&self, key: &str) -> Result<Box<dyn Read + Send>, StorageError> {
        let data = self
            .objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(Box::new(data.reader()))
    }
}
