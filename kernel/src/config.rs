// Engine Configuration
//
// Tunables for a Store, loadable from JSON. Missing fields take defaults.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_MEMORY_BUFFER_SZ: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Rows buffered per table before `put` flushes them to a data object.
    pub max_memory_buffer_sz: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_memory_buffer_sz: DEFAULT_MAX_MEMORY_BUFFER_SZ,
        }
    }
}

impl Options {
    pub fn with_max_memory_buffer_sz(mut self, rows: usize) -> Self {
        self.max_memory_buffer_sz = rows;
        self
    }

    /// Flush threshold actually applied. Zero is treated as one.
    pub(crate) fn flush_threshold(&self) -> usize {
        self.max_memory_buffer_sz.max(1)
    }
}
