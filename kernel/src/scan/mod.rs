// Table Scan
//
// Walks a table's data objects in the order the log recorded them,
// holding one object's rows in memory at a time.

use std::sync::Arc;

use tracing::debug;

use crate::object::{DataObject, ObjectError, Row};
use crate::state::Table;
use crate::storage::{ObjectStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// End of the table. Not a failure; callers stop on it.
    #[error("iterator exhausted")]
    Exhausted,

    #[error("data object `{file}` belongs to table `{found}`, expected `{expected}`")]
    DataMismatch {
        file: String,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("data object decoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanError {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ScanError::Exhausted)
    }
}

impl From<ObjectError> for ScanError {
    fn from(err: ObjectError) -> Self {
        match err {
            ObjectError::Serialization(e) => ScanError::Serialization(e),
            ObjectError::Storage(e) => ScanError::Storage(e),
        }
    }
}

/// Cursor over every row of one table.
///
/// `first` rewinds; `next` continues. Both report the end of the table
/// with [`ScanError::Exhausted`].
pub struct TableIterator {
    store: Arc<dyn ObjectStore>,
    table: String,
    files: Vec<String>,
    file_cursor: usize,
    rows: std::vec::IntoIter<Row>,
}

impl TableIterator {
    pub(crate) fn new(store: Arc<dyn ObjectStore>, table: &Table) -> Self {
        Self {
            store,
            table: table.name().to_string(),
            files: table.files().to_vec(),
            file_cursor: 0,
            rows: Vec::new().into_iter(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Rewind to the first row and return it.
    pub fn first(&mut self) -> Result<Row, ScanError> {
        self.file_cursor = 0;
        self.rows = Vec::new().into_iter();
        self.next()
    }

    /// Return the row under the cursor and advance.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Row, ScanError> {
        loop {
            if let Some(row) = self.rows.next() {
                return Ok(row);
            }
            self.load_next_file()?;
        }
    }

    /// Adapt into a std iterator that ends at the last row.
    pub fn rows(self) -> Rows {
        Rows {
            inner: self,
            done: false,
        }
    }

    fn load_next_file(&mut self) -> Result<(), ScanError> {
        let Some(file) = self.files.get(self.file_cursor) else {
            return Err(ScanError::Exhausted);
        };

        let object = DataObject::load(self.store.as_ref(), file)?;
        if object.table != self.table {
            return Err(ScanError::DataMismatch {
                file: file.clone(),
                expected: self.table.clone(),
                found: object.table,
            });
        }

        debug!(table = %self.table, file = %file, rows = object.rows.len(), "loaded data object");
        self.rows = object.rows.into_iter();
        self.file_cursor += 1;
        Ok(())
    }
}

/// Std iterator over a table scan. Yields each error once, then stops.
pub struct Rows {
    inner: TableIterator,
    done: bool,
}

impl Iterator for Rows {
    type Item = Result<Row, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Ok(row) => Some(Ok(row)),
            Err(ScanError::Exhausted) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
