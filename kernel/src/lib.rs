// Deltalite Kernel
//
// Transactional table store over write-once object storage.
// Writes become immutable data objects; commits become log segments;
// readers rebuild every table by replaying the log.

pub mod config;
pub mod log;
pub mod object;
pub mod replay;
pub mod scan;
pub mod state;
pub mod storage;
pub mod store;
pub mod txn;

pub use config::Options;
pub use object::{Row, Value};
pub use scan::{ScanError, TableIterator};
pub use store::Store;
pub use txn::{Transaction, TxnError};
