// Transactions
//
// A transaction replays the committed log on open, buffers writes in
// memory, and on commit turns its buffers into data objects and its
// pending actions into exactly one new log segment.
//
// Lifecycle: Open -> Committed. There is no abort; a transaction that
// failed is dropped by its caller.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Options;
use crate::log::{Action, LogError, Logs, SegmentId};
use crate::object::{DataObject, ObjectError, Row};
use crate::replay::{replay_log, ReplayError};
use crate::scan::TableIterator;
use crate::state::{Table, Tables};
use crate::storage::{ObjectStore, StorageError};

/// Errors produced by transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("transaction already committed")]
    AlreadyCommitted,

    #[error("column {column} of row for table `{table}` holds a non-finite float")]
    InvalidValue { table: String, column: usize },

    #[error("{failed} table flush(es) failed, first: {first}")]
    FlushFailed {
        failed: usize,
        #[source]
        first: ObjectError,
    },

    #[error("replay failed: {0}")]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct Transaction {
    id: SegmentId,
    storage: Arc<dyn ObjectStore>,
    opts: Options,

    tables: Tables,
    buffer: BTreeMap<String, Vec<Row>>,
    pending: Vec<Action>,

    committed: AtomicBool,
}

impl Transaction {
    /// Replay every committed segment and take the next sequence id.
    pub(crate) fn open(storage: Arc<dyn ObjectStore>, opts: Options) -> Result<Self, TxnError> {
        let log = replay_log(storage.as_ref())?;
        let id = log.next_id;
        let segments = log.segments.len();
        let tables = log.into_tables();

        info!(txn = %id, segments, tables = tables.len(), "transaction opened");

        Ok(Self {
            id,
            storage,
            opts,
            tables,
            buffer: BTreeMap::new(),
            pending: Vec::new(),
            committed: AtomicBool::new(false),
        })
    }

    /// Sequence id this transaction will commit under.
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Tables visible to this transaction, including ones it created.
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Actions that will be written on commit.
    pub fn pending_actions(&self) -> &[Action] {
        &self.pending
    }

    pub fn is_committed(&self) -> bool {
        self.committed.load(Ordering::Acquire)
    }

    /// Declare a new table.
    pub fn create<I, S>(&mut self, table: &str, columns: I) -> Result<(), TxnError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_open()?;
        if self.tables.contains_key(table) {
            return Err(TxnError::TableExists(table.to_string()));
        }

        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.tables
            .insert(table.to_string(), Table::declared(table, columns.clone()));
        self.buffer.insert(table.to_string(), Vec::new());
        self.pending.push(Action::change_metadata(table, columns));

        debug!(txn = %self.id, table, "table created");
        Ok(())
    }

    /// Buffer one row. A full buffer is flushed to a data object first.
    pub fn put(&mut self, table: &str, row: Row) -> Result<(), TxnError> {
        self.ensure_open()?;
        if !self.tables.contains_key(table) {
            return Err(TxnError::TableNotFound(table.to_string()));
        }
        if let Some(column) = row.iter().position(|v| !v.is_persistable()) {
            return Err(TxnError::InvalidValue {
                table: table.to_string(),
                column,
            });
        }

        let threshold = self.opts.flush_threshold();
        let buffered = self.buffer.entry(table.to_string()).or_default();

        if buffered.len() >= threshold {
            let object = DataObject::new(table, std::mem::take(buffered));
            match object.persist(self.storage.as_ref()) {
                Ok(key) => {
                    debug!(txn = %self.id, table, file = %key, rows = object.size, "buffer threshold reached, flushed");
                    self.pending.push(Action::add_file(table, key));
                }
                Err(e) => {
                    *buffered = object.rows;
                    return Err(e.into());
                }
            }
        }

        buffered.push(row);
        Ok(())
    }

    /// Scan a table as of this transaction's snapshot.
    ///
    /// Rows still buffered in this transaction are not visible.
    pub fn iter(&self, table: &str) -> Result<TableIterator, TxnError> {
        self.ensure_open()?;
        let table = self
            .tables
            .get(table)
            .ok_or_else(|| TxnError::TableNotFound(table.to_string()))?;
        Ok(TableIterator::new(Arc::clone(&self.storage), table))
    }

    /// Flush all buffers and write the log segment.
    ///
    /// If any table fails to flush, none of this commit's flushes are
    /// recorded and every buffer is kept, so the transaction stays open and
    /// consistent. Objects that did get written are left unreferenced.
    pub fn commit(&mut self) -> Result<(), TxnError> {
        self.ensure_open()?;

        self.flush_tables()?;
        self.log_and_apply()?;

        self.committed.store(true, Ordering::Release);
        info!(txn = %self.id, actions = self.pending.len(), "transaction committed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), TxnError> {
        if self.is_committed() {
            return Err(TxnError::AlreadyCommitted);
        }
        Ok(())
    }

    fn flush_tables(&mut self) -> Result<(), TxnError> {
        let dirty: Vec<String> = self
            .buffer
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(name, _)| name.clone())
            .collect();

        let mut flushed = Vec::with_capacity(dirty.len());
        let mut failures = Vec::new();

        for name in dirty {
            let rows = self.buffer.remove(&name).unwrap_or_default();
            let object = DataObject::new(name, rows);
            match object.persist(self.storage.as_ref()) {
                Ok(key) => flushed.push((object, key)),
                Err(e) => {
                    warn!(txn = %self.id, table = %object.table, error = %e, "flushing table failed");
                    failures.push(e);
                    self.buffer.insert(object.table, object.rows);
                }
            }
        }

        let failed = failures.len();
        if let Some(first) = failures.into_iter().next() {
            for (object, key) in flushed {
                warn!(txn = %self.id, file = %key, "discarding flushed object after failed commit");
                self.buffer.insert(object.table, object.rows);
            }
            return Err(TxnError::FlushFailed { failed, first });
        }

        for (object, key) in flushed {
            self.pending.push(Action::add_file(object.table, key));
        }
        Ok(())
    }

    fn log_and_apply(&self) -> Result<(), TxnError> {
        let raw = Logs::from_actions(&self.pending)?.serialize()?;
        self.storage.write(&self.id.key(), &raw)?;

        debug!(txn = %self.id, segment = %self.id.key(), bytes = raw.len(), "log segment written");
        Ok(())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .field("pending", &self.pending.len())
            .field("committed", &self.is_committed())
            .finish_non_exhaustive()
    }
}
