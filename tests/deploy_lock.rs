// ABOUTME: Integration tests for the operation lock.
// ABOUTME: Tests concurrent acquisition, lock file contents, and per-MTA isolation.

use mtadeploy::lock::{LockError, LockInfo, OperationLock};
use std::sync::{Arc, Barrier};

/// Test: of several racing acquirers exactly one wins.
#[test]
fn concurrent_acquire_has_a_single_winner() {
    let dir = tempfile::tempdir().unwrap();
    let locks_dir = dir.path().to_path_buf();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let locks_dir = locks_dir.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                OperationLock::acquire(&locks_dir, "shop", false)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one acquirer should hold the lock");
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, LockError::Held { .. }))
    );
}

/// Test: lock file records who holds the lock.
#[test]
fn lock_file_records_the_holder() {
    let dir = tempfile::tempdir().unwrap();
    let lock = OperationLock::acquire(dir.path(), "shop", false).unwrap();

    let content = std::fs::read_to_string(lock.path()).unwrap();
    let info: LockInfo = serde_json::from_str(&content).unwrap();
    assert_eq!(info.mta_id, "shop");
    assert_eq!(info.pid, std::process::id());
    assert!(!info.holder.is_empty());
    assert_eq!(lock.mta_id(), "shop");

    lock.release().unwrap();
    assert!(!LockInfo::lock_path(dir.path(), "shop").exists());
}

/// Test: different MTAs lock independently.
#[test]
fn locks_are_per_mta() {
    let dir = tempfile::tempdir().unwrap();
    let shop = OperationLock::acquire(dir.path(), "shop", false).unwrap();
    let billing = OperationLock::acquire(dir.path(), "billing", false).unwrap();

    assert_ne!(shop.path(), billing.path());
    shop.release().unwrap();
    billing.release().unwrap();
}

/// Test: held-lock error names the holder.
#[test]
fn held_error_describes_the_holder() {
    let dir = tempfile::tempdir().unwrap();
    let _lock = OperationLock::acquire(dir.path(), "shop", false).unwrap();

    let err = OperationLock::acquire(dir.path(), "shop", false).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("MTA shop is locked by"));
    assert!(message.contains(&format!("pid {}", std::process::id())));
}

/// Test: missing lock directory is created.
#[test]
fn acquire_creates_the_locks_directory() {
    let dir = tempfile::tempdir().unwrap();
    let locks_dir = dir.path().join("state").join("locks");

    let lock = OperationLock::acquire(&locks_dir, "shop", false).unwrap();
    assert!(locks_dir.is_dir());
    drop(lock);
    assert!(!LockInfo::lock_path(&locks_dir, "shop").exists());
}
