//! MVCC Garbage Collection
//!
//! A version V of key K is reclaimable iff a newer version of K has a
//! commit timestamp at or below the watermark (the oldest in-flight start
//! timestamp). Every live snapshot is at or above the watermark, so it
//! resolves K to that newer version or a later one and never to V.
//!
//! A key whose only remaining version is a tombstone at or below the
//! watermark is invisible to every live and future snapshot and is dropped.
//!
//! Conflict validation only looks at versions above a transaction's start
//! timestamp, which is never below the watermark, so collection cannot hide
//! a conflict.

use super::{OracleClock, Timestamp, VersionedStore};
use crate::observability::{log_event_with_fields, Event};

/// Outcome of one collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcStats {
    /// Watermark the pass pruned against
    pub watermark: Timestamp,
    /// Versions removed
    pub versions_removed: usize,
    /// Keys removed entirely
    pub keys_removed: usize,
}

/// Runs one synchronous collection pass against the oracle's watermark.
pub fn collect(store: &VersionedStore, oracle: &OracleClock) -> GcStats {
    let watermark = oracle.watermark();
    let pruned = store.prune(watermark);

    let stats = GcStats {
        watermark,
        versions_removed: pruned.versions_removed,
        keys_removed: pruned.keys_removed,
    };

    log_event_with_fields(
        Event::GcComplete,
        &[
            ("watermark", &watermark.to_string()),
            ("versions_removed", &stats.versions_removed.to_string()),
            ("keys_removed", &stats.keys_removed.to_string()),
        ],
    );

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::VersionPayload;

    fn commit(store: &VersionedStore, oracle: &OracleClock, key: &[u8], payload: VersionPayload) -> Timestamp {
        let ts = oracle.commit();
        store.apply(ts, &[(key.to_vec(), payload)]).unwrap();
        oracle.publish(ts).unwrap();
        ts
    }

    #[test]
    fn test_collect_preserves_live_snapshot() {
        let store = VersionedStore::new();
        let oracle = OracleClock::new();

        commit(&store, &oracle, b"k", VersionPayload::Value(b"v1".to_vec()));
        let reader = oracle.begin();
        commit(&store, &oracle, b"k", VersionPayload::Value(b"v2".to_vec()));
        commit(&store, &oracle, b"k", VersionPayload::Value(b"v3".to_vec()));

        let stats = collect(&store, &oracle);
        assert_eq!(stats.watermark, reader);
        assert_eq!(stats.versions_removed, 0);
        assert_eq!(store.get(b"k", reader), Some(b"v1".to_vec()));

        oracle.done(reader);
        let stats = collect(&store, &oracle);
        assert_eq!(stats.versions_removed, 2);
        assert_eq!(store.version_count(), 1);
    }

    #[test]
    fn test_collect_drops_deleted_keys() {
        let store = VersionedStore::new();
        let oracle = OracleClock::new();

        commit(&store, &oracle, b"gone", VersionPayload::Value(b"v".to_vec()));
        commit(&store, &oracle, b"gone", VersionPayload::Tombstone);
        commit(&store, &oracle, b"kept", VersionPayload::Value(b"v".to_vec()));

        let stats = collect(&store, &oracle);
        assert_eq!(stats.keys_removed, 1);
        assert_eq!(stats.versions_removed, 2);
        assert_eq!(store.key_count(), 1);
    }
}
