// Log Segment Keys
//
// A segment is stored under `_log_{id}`. The id is the only total order
// across commits, so key encoding and decoding live side by side here.

use std::fmt;

use tracing::warn;

pub(crate) const LOG_PREFIX: &str = "_log";

/// Sequence id of one committed log segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u64);

impl SegmentId {
    /// Storage key for this segment.
    pub fn key(self) -> String {
        format!("{LOG_PREFIX}_{}", self.0)
    }

    /// Parse a storage key back into an id. Returns `None` for foreign keys.
    pub fn from_key(key: &str) -> Option<Self> {
        key.strip_prefix(LOG_PREFIX)?
            .strip_prefix('_')?
            .parse()
            .ok()
            .map(SegmentId)
    }

    pub fn next(self) -> Self {
        SegmentId(self.0 + 1)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decode listed keys into segment ids, sorted oldest first.
///
/// Keys that share the prefix but do not parse are skipped with a warning.
pub fn sorted_segments<S: AsRef<str>>(keys: &[S]) -> Vec<SegmentId> {
    let mut ids: Vec<SegmentId> = keys
        .iter()
        .filter_map(|key| {
            let key = key.as_ref();
            let id = SegmentId::from_key(key);
            if id.is_none() {
                warn!(key, "ignoring unparsable log segment key");
            }
            id
        })
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Id the next commit should use: one past the newest segment, or 0.
pub fn next_segment_id(existing: &[SegmentId]) -> SegmentId {
    existing
        .iter()
        .max()
        .map(|id| id.next())
        .unwrap_or(SegmentId(0))
}
