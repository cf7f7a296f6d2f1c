// Store
//
// Engine root. Holds the object store handle and options, and hands out
// transactions that each replay the full log when opened.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Options;
use crate::replay::{replay_log, ReplayError, ReplayedLog};
use crate::storage::{FileObjectStore, ObjectStore, StorageError};
use crate::txn::{Transaction, TxnError};

#[derive(Clone)]
pub struct Store {
    storage: Arc<dyn ObjectStore>,
    opts: Options,
}

impl Store {
    pub fn new(storage: Arc<dyn ObjectStore>, opts: Options) -> Self {
        Self { storage, opts }
    }

    /// Store backed by a local directory, created if missing.
    pub fn open_dir(dir: impl Into<PathBuf>, opts: Options) -> Result<Self, StorageError> {
        let storage = FileObjectStore::new(dir)?;
        Ok(Self::new(Arc::new(storage), opts))
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.storage
    }

    /// Open a transaction over everything committed so far.
    pub fn new_transaction(&self) -> Result<Transaction, TxnError> {
        Transaction::open(Arc::clone(&self.storage), self.opts.clone())
    }

    /// Replay the committed history without opening a transaction.
    pub fn replay(&self) -> Result<ReplayedLog, ReplayError> {
        replay_log(self.storage.as_ref())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}
