// Log Replay
//
// Reads every committed segment, oldest first, and folds the actions
// into table state. Replay is all-or-nothing: one unreadable segment
// fails the whole replay.

use tracing::debug;

use crate::log::segment::{next_segment_id, sorted_segments, LOG_PREFIX};
use crate::log::{Action, LogError, Logs, SegmentId};
use crate::state::{build_tables, Tables};
use crate::storage::{ObjectStore, StorageError};

/// Errors that can occur during replay.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("listing log segments failed: {0}")]
    List(#[source] StorageError),

    #[error("reading log segment {segment} failed: {source}")]
    Read {
        segment: SegmentId,
        #[source]
        source: StorageError,
    },

    #[error("decoding log segment {segment} failed: {source}")]
    Decode {
        segment: SegmentId,
        #[source]
        source: LogError,
    },
}

/// Actions of one committed segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayedSegment {
    pub id: SegmentId,
    pub actions: Vec<Action>,
}

/// Full committed history, plus the id the next commit should take.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayedLog {
    pub segments: Vec<ReplayedSegment>,
    pub next_id: SegmentId,
}

impl ReplayedLog {
    /// Every action, oldest commit first.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.segments.iter().flat_map(|s| s.actions.iter())
    }

    /// Fold the history into one table per name.
    pub fn into_tables(self) -> Tables {
        build_tables(self.segments.into_iter().flat_map(|s| s.actions))
    }
}

/// Replay the action log stored in `store`.
///
/// This is the only way table state is derived; there is no checkpoint,
/// so every segment ever written is read.
pub fn replay_log(store: &dyn ObjectStore) -> Result<ReplayedLog, ReplayError> {
    let keys = store.list("", LOG_PREFIX).map_err(ReplayError::List)?;
    let ids = sorted_segments(&keys);
    let next_id = next_segment_id(&ids);

    let mut segments = Vec::with_capacity(ids.len());
    for id in ids {
        let raw = store
            .read_all(&id.key())
            .map_err(|source| ReplayError::Read {
                segment: id,
                source,
            })?;

        let actions = Logs::deserialize(&raw)
            .and_then(|logs| logs.actions())
            .map_err(|source| ReplayError::Decode {
                segment: id,
                source,
            })?;

        debug!(segment = %id, actions = actions.len(), "replayed log segment");
        segments.push(ReplayedSegment { id, actions });
    }

    Ok(ReplayedLog { segments, next_id })
}
