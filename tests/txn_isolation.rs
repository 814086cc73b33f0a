//! Transaction Isolation Tests
//!
//! Tests for snapshot isolation as seen through the public API:
//! - Snapshots never observe later commits
//! - Read-your-own-writes inside a transaction
//! - Read-set validation rejects stale read-then-write commits
//! - Blind writes never conflict; the later commit timestamp wins
//! - Discard is idempotent and never publishes

use std::sync::{Arc, Barrier};
use std::thread;

use aerokv::{Db, KvError, TxnState};

fn db() -> Db {
    Db::open_in_memory().expect("Failed to open in-memory db")
}

// =============================================================================
// Snapshot Reads
// =============================================================================

/// A transaction keeps reading its snapshot after a concurrent commit.
#[test]
fn test_snapshot_ignores_later_commits() {
    let db = db();
    db.update(|txn| txn.set("k", "v1")).unwrap();

    let reader = db.new_transaction(false);
    db.update(|txn| txn.set("k", "v2")).unwrap();
    db.update(|txn| txn.set("new", "x")).unwrap();

    assert_eq!(reader.get(b"k").unwrap(), b"v1");
    assert!(reader.get(b"new").unwrap_err().is_not_found());

    let fresh = db.new_transaction(false);
    assert_eq!(fresh.get(b"k").unwrap(), b"v2");
}

/// set then get returns the value; delete then get is KeyNotFound, both
/// before and after commit.
#[test]
fn test_set_get_delete_before_and_after_commit() {
    let db = db();

    let mut txn = db.new_transaction(true);
    txn.set("k", "v").unwrap();
    assert_eq!(txn.get(b"k").unwrap(), b"v");
    txn.commit().unwrap();
    assert_eq!(db.view(|t| t.get(b"k")).unwrap(), b"v");

    let mut txn = db.new_transaction(true);
    txn.delete("k").unwrap();
    assert!(txn.get(b"k").unwrap_err().is_not_found());
    txn.commit().unwrap();
    assert!(db.view(|t| t.get(b"k")).unwrap_err().is_not_found());
}

/// get_item reports the commit timestamp of the visible version.
#[test]
fn test_item_version_is_commit_ts() {
    let db = db();
    db.update(|txn| txn.set("k", "v")).unwrap();
    let committed_at = db.last_commit_ts();

    let item = db.view(|txn| txn.get_item(b"k")).unwrap();
    assert_eq!(item.key(), b"k");
    assert_eq!(item.value(), b"v");
    assert_eq!(item.version(), committed_at);
}

// =============================================================================
// Conflict Detection
// =============================================================================

/// T1 reads k, T2 writes and commits k, T1 writes k and commits: conflict.
#[test]
fn test_read_then_write_conflicts() {
    let db = db();
    db.update(|txn| txn.set("k", "base")).unwrap();

    let mut t1 = db.new_transaction(true);
    assert_eq!(t1.get(b"k").unwrap(), b"base");

    let mut t2 = db.new_transaction(true);
    t2.set("k", "t2").unwrap();
    let t2_commit = t2.commit().unwrap().unwrap();

    t1.set("k", "t1").unwrap();
    match t1.commit() {
        Err(KvError::Conflict {
            key, observed_ts, ..
        }) => {
            assert_eq!(key, b"k".to_vec());
            assert_eq!(observed_ts, t2_commit);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(t1.state(), TxnState::Discarded);
    assert_eq!(db.view(|t| t.get(b"k")).unwrap(), b"t2");
}

/// A read of an absent key conflicts with a concurrent insert of it.
#[test]
fn test_read_miss_conflicts_with_insert() {
    let db = db();

    let mut t1 = db.new_transaction(true);
    assert!(t1.get(b"slot").unwrap_err().is_not_found());

    db.update(|txn| txn.set("slot", "taken")).unwrap();

    t1.set("slot", "mine").unwrap();
    assert!(t1.commit().unwrap_err().is_conflict());
}

/// update() surfaces the conflict unchanged and does not retry.
#[test]
fn test_update_surfaces_conflict() {
    let db = db();
    db.update(|txn| txn.set("k", "0")).unwrap();

    let other = db.clone();
    let mut attempts = 0;
    let result = db.update(|txn| {
        attempts += 1;
        txn.get(b"k")?;
        other.update(|t| t.set("k", "1"))?;
        txn.set("k", "2")
    });

    assert!(result.unwrap_err().is_conflict());
    assert_eq!(attempts, 1);
    assert_eq!(db.view(|t| t.get(b"k")).unwrap(), b"1");
}

/// With conflict detection disabled, the stale commit goes through.
#[test]
fn test_conflict_detection_disabled() {
    let db = Db::open_with(aerokv::DbOptions::in_memory().with_detect_conflicts(false)).unwrap();
    db.update(|txn| txn.set("k", "0")).unwrap();

    let mut t1 = db.new_transaction(true);
    t1.get(b"k").unwrap();
    db.update(|txn| txn.set("k", "1")).unwrap();
    t1.set("k", "2").unwrap();
    assert!(t1.commit().is_ok());
}

// =============================================================================
// Blind Writes
// =============================================================================

/// Two concurrent blind writers both commit; the larger commit timestamp wins.
#[test]
fn test_concurrent_blind_writers_both_commit() {
    let db = db();
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|value| {
            let db = db.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut txn = db.new_transaction(true);
                barrier.wait();
                txn.set("k", value).unwrap();
                let commit_ts = txn.commit().unwrap().unwrap();
                (commit_ts, value)
            })
        })
        .collect();

    let mut results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.sort();
    let (_, winner) = results[1];

    assert_ne!(results[0].0, results[1].0);
    assert_eq!(db.view(|t| t.get(b"k")).unwrap(), winner.as_bytes());
}

/// Read-modify-write under contention never loses an increment when the
/// caller retries conflicts.
#[test]
fn test_counter_increments_are_not_lost() {
    const THREADS: usize = 4;
    const INCREMENTS: usize = 50;

    let db = db();
    db.update(|txn| txn.set("counter", "0")).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let db = db.clone();
            thread::spawn(move || {
                let mut conflicts = 0;
                for _ in 0..INCREMENTS {
                    loop {
                        let result = db.update(|txn| {
                            let current: u64 = String::from_utf8(txn.get(b"counter")?)
                                .unwrap()
                                .parse()
                                .unwrap();
                            txn.set("counter", (current + 1).to_string())
                        });
                        match result {
                            Ok(()) => break,
                            Err(e) if e.is_conflict() => conflicts += 1,
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                }
                conflicts
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let value = db.view(|t| t.get(b"counter")).unwrap();
    assert_eq!(value, (THREADS * INCREMENTS).to_string().as_bytes());
}

/// Readers never observe half of a multi-key commit.
#[test]
fn test_commits_are_atomic_to_readers() {
    let db = db();
    db.update(|txn| {
        txn.set("left", "0")?;
        txn.set("right", "0")
    })
    .unwrap();

    let writer = {
        let db = db.clone();
        thread::spawn(move || {
            for i in 1..=200 {
                let v = i.to_string();
                db.update(|txn| {
                    txn.set("left", v.as_str())?;
                    txn.set("right", v.as_str())
                })
                .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let db = db.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    db.view(|txn| {
                        assert_eq!(txn.get(b"left")?, txn.get(b"right")?);
                        Ok(())
                    })
                    .unwrap();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

// =============================================================================
// Discard
// =============================================================================

/// discard twice, or after commit, has no observable effect.
#[test]
fn test_discard_is_idempotent() {
    let db = db();

    let mut txn = db.new_transaction(true);
    txn.set("k", "v").unwrap();
    txn.discard();
    txn.discard();
    assert_eq!(txn.state(), TxnState::Discarded);
    assert!(db.view(|t| t.get(b"k")).unwrap_err().is_not_found());

    let mut txn = db.new_transaction(true);
    txn.set("k", "v").unwrap();
    let commit_ts = txn.commit().unwrap();
    txn.discard();
    assert_eq!(txn.state(), TxnState::Committed);
    assert!(commit_ts.is_some());
    assert_eq!(db.view(|t| t.get(b"k")).unwrap(), b"v");
}

/// Commit after discard fails; writes after commit fail.
#[test]
fn test_finished_transactions_reject_use() {
    let db = db();

    let mut discarded = db.new_transaction(true);
    discarded.discard();
    assert!(matches!(discarded.commit(), Err(KvError::AlreadyDiscarded)));

    let mut committed = db.new_transaction(true);
    committed.set("k", "v").unwrap();
    committed.commit().unwrap();
    assert!(matches!(committed.set("k", "w"), Err(KvError::AlreadyCommitted)));
    assert!(matches!(committed.commit(), Err(KvError::AlreadyCommitted)));
}

/// Read-only transactions reject writes and commit to nothing.
#[test]
fn test_read_only_transactions() {
    let db = db();
    let mut txn = db.new_transaction(false);
    assert!(matches!(txn.set("k", "v"), Err(KvError::ReadOnlyTransaction)));
    assert!(matches!(txn.delete("k"), Err(KvError::ReadOnlyTransaction)));
    assert_eq!(txn.commit().unwrap(), None);
}
