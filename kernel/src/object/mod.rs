// Data Objects
//
// A data object is one immutable batch of rows for a single table.
// It is written exactly once, at flush time, and only ever superseded.

use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;
use uuid::Uuid;

use crate::storage::{ObjectStore, StorageError};

const TABLE_PREFIX: &str = "_table";

/// A single scalar cell.
///
/// Encoded untagged, so a persisted row is a plain JSON array.
/// Integers decode as [`Value::Integer`] whenever they fit in an `i64`.
/// NaN and infinities have no JSON form; serializing them is an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(#[serde(serialize_with = "finite_f64")] f64),
    String(String),
}

impl Value {
    /// Whether the value survives persistence unchanged.
    pub fn is_persistable(&self) -> bool {
        match self {
            Value::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

fn finite_f64<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if !v.is_finite() {
        return Err(serde::ser::Error::custom(format!(
            "non-finite float {v} cannot be persisted"
        )));
    }
    serializer.serialize_f64(*v)
}

/// An ordered sequence of heterogeneous values.
pub type Row = Vec<Value>;

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Build a [`Row`] from a list of convertible scalars.
///
/// ```
/// use deltalite_kernel::row;
/// let r = row!["foo1", "bar", 1, 2];
/// assert_eq!(r.len(), 4);
/// ```
#[macro_export]
macro_rules! row {
    ($($v:expr),* $(,)?) => {
        vec![$($crate::object::Value::from($v)),*]
    };
}

#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("data object serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Persisted batch of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataObject {
    pub id: Uuid,
    pub table: String,
    pub rows: Vec<Row>,
    pub size: usize,
}

impl DataObject {
    /// Wrap `rows` in a new object with a fresh identifier.
    pub fn new(table: impl Into<String>, rows: Vec<Row>) -> Self {
        let size = rows.len();
        Self {
            id: Uuid::new_v4(),
            table: table.into(),
            rows,
            size,
        }
    }

    /// Storage key: `_table_{table}_{id}`.
    pub fn key(&self) -> String {
        format!("{TABLE_PREFIX}_{}_{}", self.table, self.id)
    }

    /// Serialize and write the object. Returns the key it was written under.
    pub fn persist(&self, store: &dyn ObjectStore) -> Result<String, ObjectError> {
        let raw = serde_json::to_vec(self)?;
        let key = self.key();
        store.write(&key, &raw)?;

        debug!(table = %self.table, file = %key, rows = self.size, "data object persisted");
        Ok(key)
    }

    /// Load and decode the object stored under `key`.
    pub fn load(store: &dyn ObjectStore, key: &str) -> Result<Self, ObjectError> {
        let raw = store.read_all(key)?;
        Ok(serde_json::from_slice(&raw)?)
    }
}
