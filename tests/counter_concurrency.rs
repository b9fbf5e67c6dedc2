use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use por_upload_lib::counter::{CounterStore, FileCounterStore, PoCounter};
use por_upload_lib::db::Db;
use por_upload_lib::PorError;

const THREADS: usize = 8;
const PER_THREAD: usize = 25;

fn hammer(counter: Arc<PoCounter>) -> Vec<i64> {
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || (0..PER_THREAD).map(|_| counter.next().unwrap()).collect::<Vec<_>>())
        })
        .collect();
    let mut all: Vec<i64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    all.sort_unstable();
    all
}

fn assert_consecutive(values: &[i64], after: i64) {
    let unique: HashSet<_> = values.iter().collect();
    assert_eq!(unique.len(), values.len(), "duplicate PO numbers issued");
    let expected: Vec<i64> = (after + 1..=after + values.len() as i64).collect();
    assert_eq!(values, expected.as_slice());
}

#[test]
fn test_concurrent_next_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("po_counter.txt");
    let counter = Arc::new(PoCounter::new(Box::new(FileCounterStore::new(&path)), 1000).unwrap());

    let values = hammer(Arc::clone(&counter));
    assert_consecutive(&values, 1000);
    let last = 1000 + (THREADS * PER_THREAD) as i64;
    assert_eq!(counter.current().unwrap(), last);
    assert_eq!(FileCounterStore::new(&path).load().unwrap(), Some(last));
}

#[test]
fn test_concurrent_next_with_database() {
    let db = Arc::new(Db::open_in_memory().unwrap());
    let counter = Arc::new(PoCounter::new(Box::new(Arc::clone(&db)), 1).unwrap());

    let values = hammer(counter);
    assert_consecutive(&values, 1);
    assert_eq!(db.load().unwrap(), Some(1 + (THREADS * PER_THREAD) as i64));
}

#[test]
fn test_override_during_traffic_is_never_duplicated() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCounterStore::new(dir.path().join("po_counter.txt"));
    let counter = Arc::new(PoCounter::new(Box::new(store), 1000).unwrap());

    counter.set_value(9000).unwrap();
    assert_eq!(counter.next().unwrap(), 9001);
    assert!(matches!(counter.set_value(0), Err(PorError::InvalidOverride(0))));
    assert!(matches!(counter.set_value(-5), Err(PorError::InvalidOverride(-5))));
    assert_eq!(counter.current().unwrap(), 9001);

    let values = hammer(counter);
    assert_consecutive(&values, 9001);
}

#[test]
fn test_separate_connections_share_one_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("por.db");
    // Each counter owns its own connection, as separate CLI processes would.
    let counters: Vec<Arc<PoCounter>> = (0..4)
        .map(|_| {
            let db = Db::new(path.clone()).unwrap();
            Arc::new(PoCounter::new(Box::new(db), 1000).unwrap())
        })
        .collect();

    let handles: Vec<_> = counters
        .iter()
        .map(|counter| {
            let counter = Arc::clone(counter);
            thread::spawn(move || (0..100).map(|_| counter.next().unwrap()).collect::<Vec<_>>())
        })
        .collect();
    let mut all: Vec<i64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    all.sort_unstable();

    assert_consecutive(&all, 1000);
    assert_eq!(Db::new(path).unwrap().load().unwrap(), Some(1400));
}
