// Action Log
//
// Actions are the only unit of mutation. A commit persists its actions
// as one segment of tagged entries; replaying every segment in order
// reproduces all table state.

use serde::{Deserialize, Serialize};

pub mod segment;

pub use segment::SegmentId;

/// Declares (or redeclares) the column names of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMetadata {
    pub table: String,
    pub columns: Vec<String>,
}

/// Whether a data object joins or leaves a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileAction {
    Add,
    Remove,
}

/// Records that a data object belongs (or no longer belongs) to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataObjectAction {
    pub action: FileAction,
    pub table: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Action {
    ChangeMetadata(ChangeMetadata),
    DataObject(DataObjectAction),
}

impl Action {
    pub fn change_metadata(table: impl Into<String>, columns: Vec<String>) -> Self {
        Action::ChangeMetadata(ChangeMetadata {
            table: table.into(),
            columns,
        })
    }

    pub fn add_file(table: impl Into<String>, file: impl Into<String>) -> Self {
        Action::DataObject(DataObjectAction {
            action: FileAction::Add,
            table: table.into(),
            file: file.into(),
        })
    }

    pub fn remove_file(table: impl Into<String>, file: impl Into<String>) -> Self {
        Action::DataObject(DataObjectAction {
            action: FileAction::Remove,
            table: table.into(),
            file: file.into(),
        })
    }

    pub fn kind(&self) -> LogKind {
        match self {
            Action::ChangeMetadata(_) => LogKind::ChangeMetadata,
            Action::DataObject(_) => LogKind::DataObject,
        }
    }

    /// Name of the table this action mutates.
    pub fn table(&self) -> &str {
        match self {
            Action::ChangeMetadata(cm) => &cm.table,
            Action::DataObject(da) => &da.table,
        }
    }
}

/// Wire tag of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogKind {
    ChangeMetadata = 0,
    DataObject = 1,
}

impl TryFrom<u64> for LogKind {
    type Error = LogError;

    fn try_from(tag: u64) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(LogKind::ChangeMetadata),
            1 => Ok(LogKind::DataObject),
            other => Err(LogError::UnknownKind(other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("unknown log entry kind {0}")]
    UnknownKind(u64),

    #[error("log serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Self-describing envelope around one serialized action.
///
/// The tag stays a raw integer on the wire so entries written by a newer
/// writer still decode as envelopes; only [`LogEntry::action`] rejects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: u64,
    pub payload: serde_json::Value,
}

impl LogEntry {
    pub fn new(action: &Action) -> Result<Self, LogError> {
        let payload = match action {
            Action::ChangeMetadata(cm) => serde_json::to_value(cm)?,
            Action::DataObject(da) => serde_json::to_value(da)?,
        };
        Ok(Self {
            kind: action.kind() as u64,
            payload,
        })
    }

    /// Decode the payload according to its tag.
    pub fn action(&self) -> Result<Action, LogError> {
        let payload = self.payload.clone();
        match LogKind::try_from(self.kind)? {
            LogKind::ChangeMetadata => Ok(Action::ChangeMetadata(serde_json::from_value(payload)?)),
            LogKind::DataObject => Ok(Action::DataObject(serde_json::from_value(payload)?)),
        }
    }
}

/// Ordered entries of one log segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Logs {
    entries: Vec<LogEntry>,
}

impl Logs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_actions<'a>(actions: impl IntoIterator<Item = &'a Action>) -> Result<Self, LogError> {
        let entries = actions
            .into_iter()
            .map(LogEntry::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn serialize(&self) -> Result<Vec<u8>, LogError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, LogError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Decode every entry, in order. Fails on the first unknown tag.
    pub fn actions(&self) -> Result<Vec<Action>, LogError> {
        self.entries.iter().map(LogEntry::action).collect()
    }
}
