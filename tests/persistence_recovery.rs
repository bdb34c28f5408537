//! Restart-time behavior: spilled batches coming back, orphaned claims,
//! quarantine of corrupt files, and re-persistence of still-failing batches.

mod common;

use common::*;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut files: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(suffix))
        })
        .collect();
    files.sort();
    files
}

#[test]
fn spilled_batches_deliver_after_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    // First run: the service is down, three documents spill to disk.
    {
        let client = TransientFailureClient::new();
        let spool = quiet_builder(dir.path(), client)
            .max_retries(2)
            .build()
            .unwrap();
        for n in 0..3 {
            spool.add(json!({"n": n}));
        }
        spool.flush();
        spool.close();
    }
    assert_eq!(files_with_suffix(dir.path(), ".json").len(), 1);

    // Second run: the service is back and recovery is on.
    let client = RecordingClient::new();
    let spool = quiet_builder(dir.path(), client.clone())
        .recover_on_startup(true)
        .build()
        .unwrap();
    spool.close();

    let delivered: Vec<_> = client
        .documents()
        .iter()
        .map(|v| v["n"].as_i64().unwrap())
        .collect();
    assert_eq!(delivered, vec![0, 1, 2], "order within the batch survives");
    assert_eq!(spool.metrics().batches_recovered, 1);

    assert!(files_with_suffix(dir.path(), ".json").is_empty());
    assert!(files_with_suffix(dir.path(), ".processing").is_empty());
}

#[test]
fn orphaned_processing_files_are_resumed() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    // A claim left behind by an unclean shutdown: claimed, never deleted.
    let orphan = dir.path().join("failed_batch_100_orphan.json.processing");
    fs::write(&orphan, serde_json::to_vec(&json!([{"v": 41}, {"v": 42}])).unwrap()).unwrap();

    let client = RecordingClient::new();
    let spool = quiet_builder(dir.path(), client.clone())
        .recover_on_startup(true)
        .build()
        .unwrap();
    spool.close();

    assert_eq!(client.document_count(), 2);
    assert!(!orphan.exists());
    assert!(files_with_suffix(dir.path(), ".json").is_empty());
}

#[test]
fn corrupt_file_is_quarantined_without_blocking_recovery() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    fs::write(dir.path().join("failed_batch_1_bad.json"), b"{truncated").unwrap();
    fs::write(
        dir.path().join("failed_batch_2_good.json"),
        serde_json::to_vec(&json!([{"ok": true}])).unwrap(),
    )
    .unwrap();

    let client = RecordingClient::new();
    let spool = quiet_builder(dir.path(), client.clone())
        .recover_on_startup(true)
        .build()
        .unwrap();
    spool.close();

    assert_eq!(client.document_count(), 1, "good file still recovered");
    assert_eq!(spool.metrics().batches_quarantined, 1);

    let quarantined = files_with_suffix(&dir.path().join("quarantine"), "");
    assert_eq!(quarantined.len(), 1);
    assert!(files_with_suffix(dir.path(), ".json").is_empty());
}

#[test]
fn still_failing_batches_are_repersisted_not_looped() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let original = serde_json::to_vec(&json!([{"keep": "me"}])).unwrap();
    fs::write(dir.path().join("failed_batch_5_stuck.json"), &original).unwrap();

    // Recovery runs but the service is still down: the batch must end up in
    // exactly one fresh file, with no claim left behind.
    let client = TransientFailureClient::new();
    let spool = quiet_builder(dir.path(), client.clone())
        .max_retries(2)
        .recover_on_startup(true)
        .build()
        .unwrap();
    spool.close();

    assert_eq!(client.calls(), 2);
    let files = files_with_suffix(dir.path(), ".json");
    assert_eq!(files.len(), 1);
    assert_ne!(files[0].file_name().unwrap(), "failed_batch_5_stuck.json");
    assert!(files_with_suffix(dir.path(), ".processing").is_empty());

    let contents = fs::read(&files[0]).unwrap();
    let batch = spool::Batch::from_json_slice(&contents).unwrap();
    assert_eq!(batch.documents()[0].value()["keep"], "me");
}

#[test]
fn recovery_stays_off_unless_requested() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    fs::write(
        dir.path().join("failed_batch_7_idle.json"),
        serde_json::to_vec(&json!([{"v": 7}])).unwrap(),
    )
    .unwrap();

    let client = RecordingClient::new();
    let spool = quiet_builder(dir.path(), client.clone()).build().unwrap();
    spool.close();

    assert_eq!(client.document_count(), 0);
    assert_eq!(files_with_suffix(dir.path(), ".json").len(), 1);
}

#[test]
fn two_generations_of_spill_and_recovery_converge() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    // Generation one: everything spills.
    {
        let spool = quiet_builder(dir.path(), TransientFailureClient::new())
            .max_items(1)
            .max_retries(1)
            .build()
            .unwrap();
        for n in 0..3 {
            spool.add(json!({"gen": n}));
        }
        spool.close();
    }
    assert_eq!(files_with_suffix(dir.path(), ".json").len(), 3);

    // Generation two: recovery drains every file through the live path.
    let client = RecordingClient::new();
    let spool = quiet_builder(dir.path(), client.clone())
        .recover_on_startup(true)
        .build()
        .unwrap();
    spool.close();

    assert_eq!(client.document_count(), 3);
    assert!(files_with_suffix(dir.path(), ".json").is_empty());
    assert!(files_with_suffix(dir.path(), ".processing").is_empty());
}
