//! End-to-end transaction tests against real storage backends.

use std::io::Read;
use std::sync::Arc;

use deltalite_kernel::log::SegmentId;
use deltalite_kernel::object::DataObject;
use deltalite_kernel::replay::ReplayError;
use deltalite_kernel::row;
use deltalite_kernel::storage::{InMemoryObjectStore, ObjectStore, StorageError};
use deltalite_kernel::{Options, Row, ScanError, Store, TxnError, Value};
use tempfile::TempDir;

fn file_store(opts: Options) -> (TempDir, Store) {
    let tmp = TempDir::new().unwrap();
    let store = Store::open_dir(tmp.path(), opts).unwrap();
    (tmp, store)
}

fn sorted_keys(store: &Store, prefix: &str) -> Vec<String> {
    let mut keys = store.object_store().list("", prefix).unwrap();
    keys.sort();
    keys
}

fn scan_all(store: &Store, table: &str) -> Vec<Row> {
    let tx = store.new_transaction().unwrap();
    tx.iter(table)
        .unwrap()
        .rows()
        .collect::<Result<_, _>>()
        .unwrap()
}

/// Rejects writes whose key starts with `poisoned`.
struct FailingStore {
    inner: InMemoryObjectStore,
    poisoned: &'static str,
}

impl ObjectStore for FailingStore {
    fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if key.starts_with(self.poisoned) {
            return Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.write(key, data)
    }

    fn list(&self, subdir: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(subdir, prefix)
    }

    fn read(&self, key: &str) -> Result<Box<dyn Read + Send>, StorageError> {
        self.inner.read(key)
    }
}

#[test]
fn create_put_commit_then_scan() {
    let (_tmp, store) = file_store(Options::default());

    let mut tx = store.new_transaction().unwrap();
    tx.create("foo", ["a", "b", "c", "d"]).unwrap();
    for _ in 0..4 {
        tx.put("foo", row!["foo1", "bar", 1, 2]).unwrap();
    }
    tx.commit().unwrap();

    let read = store.new_transaction().unwrap();
    assert_eq!(read.id(), SegmentId(1));
    assert_eq!(read.table("foo").unwrap().columns(), ["a", "b", "c", "d"]);

    let mut it = read.iter("foo").unwrap();
    let expected = vec![
        Value::String("foo1".into()),
        Value::String("bar".into()),
        Value::Integer(1),
        Value::Integer(2),
    ];
    assert_eq!(it.first().unwrap(), expected);
    for _ in 0..3 {
        assert_eq!(it.next().unwrap(), expected);
    }
    assert!(matches!(it.next(), Err(ScanError::Exhausted)));
}

#[test]
fn read_committed_preserves_row_order_and_values() {
    let (_tmp, store) = file_store(Options::default());

    let mut tx = store.new_transaction().unwrap();
    tx.create("foo", ["name1", "name2", "val1", "val2"]).unwrap();
    for i in 0..=100i64 {
        tx.put("foo", row![format!("foo{i}"), format!("bar{}", i + 20), i, i + 100])
            .unwrap();
    }
    tx.commit().unwrap();

    let rows = scan_all(&store, "foo");
    assert_eq!(rows.len(), 101);
    for (i, row) in rows.iter().enumerate() {
        let i = i as i64;
        assert_eq!(row, &row![format!("foo{i}"), format!("bar{}", i + 20), i, i + 100]);
    }
}

#[test]
fn sequential_transactions_take_increasing_ids() {
    let store = Store::new(Arc::new(InMemoryObjectStore::new()), Options::default());

    for expected in 0..5 {
        let mut tx = store.new_transaction().unwrap();
        assert_eq!(tx.id(), SegmentId(expected));
        assert!(tx.tables().is_empty());
        tx.commit().unwrap();
    }

    assert_eq!(sorted_keys(&store, "_log").len(), 5);
}

#[test]
fn threshold_flush_splits_into_objects() {
    let (_tmp, store) = file_store(Options::default().with_max_memory_buffer_sz(2));

    let mut tx = store.new_transaction().unwrap();
    tx.create("foo", ["n"]).unwrap();
    for i in 0..5 {
        tx.put("foo", row![i]).unwrap();
    }
    tx.commit().unwrap();

    assert!(sorted_keys(&store, "_table_foo_").len() >= 3);

    let read = store.new_transaction().unwrap();
    assert_eq!(read.table("foo").unwrap().files().len(), 3);

    let rows = scan_all(&store, "foo");
    assert_eq!(rows, (0..5).map(|i| row![i]).collect::<Vec<_>>());
}

#[test]
fn tables_accumulate_files_across_commits() {
    let store = Store::new(Arc::new(InMemoryObjectStore::new()), Options::default());

    let mut first = store.new_transaction().unwrap();
    first.create("t", ["v"]).unwrap();
    first.put("t", row!["a"]).unwrap();
    first.commit().unwrap();

    let mut second = store.new_transaction().unwrap();
    assert!(matches!(
        second.create("t", ["v"]),
        Err(TxnError::TableExists(_))
    ));
    second.put("t", row!["b"]).unwrap();
    second.commit().unwrap();

    assert_eq!(scan_all(&store, "t"), vec![row!["a"], row!["b"]]);
}

#[test]
fn double_commit_leaves_state_unchanged() {
    let (_tmp, store) = file_store(Options::default());

    let mut tx = store.new_transaction().unwrap();
    tx.create("foo", ["a"]).unwrap();
    tx.put("foo", row![1]).unwrap();
    tx.commit().unwrap();

    let before = sorted_keys(&store, "");
    assert!(matches!(tx.commit(), Err(TxnError::AlreadyCommitted)));
    assert_eq!(sorted_keys(&store, ""), before);
}

#[test]
fn put_on_unknown_table_has_no_side_effects() {
    let (_tmp, store) = file_store(Options::default().with_max_memory_buffer_sz(1));

    let mut tx = store.new_transaction().unwrap();
    for _ in 0..3 {
        assert!(matches!(
            tx.put("ghost", row![1]),
            Err(TxnError::TableNotFound(ref t)) if t == "ghost"
        ));
    }

    assert!(tx.pending_actions().is_empty());
    assert!(sorted_keys(&store, "").is_empty());
    assert!(matches!(tx.iter("ghost").err(), Some(TxnError::TableNotFound(_))));
}

#[test]
fn segment_collision_fails_commit() {
    let store = Store::new(Arc::new(InMemoryObjectStore::new()), Options::default());

    let mut loser = store.new_transaction().unwrap();
    let mut winner = store.new_transaction().unwrap();
    assert_eq!(loser.id(), winner.id());

    winner.create("w", ["a"]).unwrap();
    winner.commit().unwrap();

    loser.create("l", ["a"]).unwrap();
    let err = loser.commit().unwrap_err();
    assert!(matches!(err, TxnError::Storage(StorageError::AlreadyExists(ref k)) if k == "_log_0"));
    assert!(!loser.is_committed());

    let tables = store.new_transaction().unwrap();
    assert!(tables.table("w").is_some());
    assert!(tables.table("l").is_none());
}

#[test]
fn failed_flush_writes_no_segment() {
    let backend = Arc::new(FailingStore {
        inner: InMemoryObjectStore::new(),
        poisoned: "_table_bad_",
    });
    let store = Store::new(backend.clone(), Options::default());

    let mut tx = store.new_transaction().unwrap();
    tx.create("good", ["v"]).unwrap();
    tx.create("bad", ["v"]).unwrap();
    tx.put("good", row![1]).unwrap();
    tx.put("bad", row![2]).unwrap();

    let err = tx.commit().unwrap_err();
    assert!(matches!(err, TxnError::FlushFailed { failed: 1, .. }));
    assert!(!tx.is_committed());
    assert_eq!(tx.pending_actions().len(), 2);
    assert!(backend.list("", "_log").unwrap().is_empty());

    // The good table's object was written but nothing references it.
    assert_eq!(backend.list("", "_table_good_").unwrap().len(), 1);
    let replayed = store.new_transaction().unwrap();
    assert!(replayed.tables().is_empty());
}

#[test]
fn corrupt_history_blocks_new_transactions() {
    let store = Store::new(Arc::new(InMemoryObjectStore::new()), Options::default());

    let mut tx = store.new_transaction().unwrap();
    tx.create("t", ["v"]).unwrap();
    tx.commit().unwrap();

    store.object_store().write("_log_1", b"garbage").unwrap();

    let err = store.new_transaction().unwrap_err();
    assert!(matches!(
        err,
        TxnError::Replay(ReplayError::Decode {
            segment: SegmentId(1),
            ..
        })
    ));
}

#[test]
fn mislabelled_object_is_detected_on_scan() {
    let store = Store::new(Arc::new(InMemoryObjectStore::new()), Options::default());

    let mut tx = store.new_transaction().unwrap();
    tx.create("t", ["v"]).unwrap();
    tx.commit().unwrap();

    let stray = DataObject::new("other", vec![row![1]]);
    let key = stray.persist(store.object_store().as_ref()).unwrap();
    let raw = format!(
        r#"[{{"kind":1,"payload":{{"action":"Add","table":"t","file":"{key}"}}}}]"#
    );
    store.object_store().write("_log_1", raw.as_bytes()).unwrap();

    let read = store.new_transaction().unwrap();
    let mut it = read.iter("t").unwrap();
    assert!(matches!(it.first(), Err(ScanError::DataMismatch { .. })));
}

#[test]
fn non_finite_floats_never_reach_storage() {
    let (_tmp, store) = file_store(Options::default());

    let mut tx = store.new_transaction().unwrap();
    tx.create("m", ["x", "y"]).unwrap();
    assert!(matches!(
        tx.put("m", vec![Value::Float(f64::NAN), Value::Float(f64::INFINITY)]),
        Err(TxnError::InvalidValue { column: 0, .. })
    ));
    tx.put("m", row![0.25, -1e300]).unwrap();
    tx.commit().unwrap();

    assert_eq!(scan_all(&store, "m"), vec![row![0.25, -1e300]]);
}
