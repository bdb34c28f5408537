//! Concurrent-claim races over a shared store directory.
//!
//! Two scans racing over the same files (as two process invocations would)
//! must hand each file to exactly one of them; the rename either succeeds
//! once or reports the file as already gone.

use serde_json::json;
use spool_core::{Batch, Document};
use spool_durability::SpoolStore;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

fn seeded_store(files: usize) -> (tempfile::TempDir, Arc<SpoolStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SpoolStore::open(dir.path()).unwrap());
    for i in 0..files {
        let mut batch = Batch::new();
        batch.push(Document::new(json!({ "file": i })));
        store.save(&batch).unwrap();
    }
    (dir, store)
}

#[test]
fn each_file_is_claimed_by_exactly_one_racer() {
    let (_dir, store) = seeded_store(24);
    let files = store.written().unwrap();
    assert_eq!(files.len(), 24);

    let barrier = Arc::new(Barrier::new(2));
    let mut racers = Vec::new();
    for _ in 0..2 {
        let store = store.clone();
        let files = files.clone();
        let barrier = barrier.clone();
        racers.push(thread::spawn(move || {
            barrier.wait();
            let mut won = Vec::new();
            for file in &files {
                if let Some(claimed) = store.claim(file).unwrap() {
                    won.push(claimed.path().to_path_buf());
                }
            }
            won
        }));
    }

    let wins: Vec<_> = racers
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    let total: usize = wins.iter().map(Vec::len).sum();
    assert_eq!(total, 24, "every file claimed exactly once overall");

    let distinct: HashSet<_> = wins.iter().flatten().collect();
    assert_eq!(distinct.len(), 24, "no file claimed by both racers");

    assert!(store.written().unwrap().is_empty());
    assert_eq!(store.orphaned_claims().unwrap().len(), 24);
}

#[test]
fn claiming_a_deleted_file_is_a_lost_race_not_an_error() {
    let (_dir, store) = seeded_store(1);
    let files = store.written().unwrap();
    let file = &files[0];

    let claimed = store.claim(file).unwrap().unwrap();
    store.delete(&claimed).unwrap();

    assert!(store.claim(file).unwrap().is_none());
}
