//! Database handle
//!
//! `Db` wires the store, the oracle and the commit coordinator together and
//! owns the startup sequence:
//! 1. Validate options and apply the log level
//! 2. Replay `<data_dir>/wal/wal.log` into an empty store (durable only)
//! 3. Resume the oracle above the highest replayed commit timestamp
//! 4. Open the WAL for appends
//!
//! Replay is all or nothing: a corrupted or truncated log refuses to open.
//!
//! `Db` is a cheap, cloneable handle; clones share one engine.

mod options;

pub use options::DbOptions;

use std::path::Path;
use std::sync::Arc;

use crate::errors::KvResult;
use crate::mvcc::{gc, GcStats, OracleClock, Timestamp, VersionedStore};
use crate::observability::{log_event, log_event_with_fields, Event, Logger};
use crate::txn::{report, CommitCoordinator, Transaction};
use crate::wal::{is_empty_log, wal_path, WalError, WalReader, WalWriter};

struct DbInner {
    coordinator: Arc<CommitCoordinator>,
    options: DbOptions,
}

impl Drop for DbInner {
    fn drop(&mut self) {
        log_event_with_fields(
            Event::DbClose,
            &[("data_dir", &self.options.data_dir.display().to_string())],
        );
    }
}

/// Handle to an open database.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

impl Db {
    /// Opens (or creates) a durable database in `data_dir` with default
    /// options.
    pub fn open(data_dir: impl AsRef<Path>) -> KvResult<Self> {
        Self::open_with(DbOptions::new(data_dir.as_ref()))
    }

    /// Opens a database that keeps everything in memory.
    pub fn open_in_memory() -> KvResult<Self> {
        Self::open_with(DbOptions::in_memory())
    }

    /// Opens a database with explicit options.
    pub fn open_with(options: DbOptions) -> KvResult<Self> {
        options.validate()?;
        Logger::set_min_severity(options.severity()?);

        let store = Arc::new(VersionedStore::new());
        let (oracle, wal) = if options.in_memory {
            (OracleClock::new(), None)
        } else {
            let highest = replay(&options.data_dir, &store)?;
            let writer = WalWriter::open(&options.data_dir)?;
            (OracleClock::from_replayed(highest), Some(writer))
        };

        let coordinator = Arc::new(CommitCoordinator::new(
            Arc::clone(&store),
            oracle,
            wal,
            options.commit_settings(),
        ));

        log_event_with_fields(
            Event::DbOpen,
            &[
                ("data_dir", &options.data_dir.display().to_string()),
                ("in_memory", if options.in_memory { "true" } else { "false" }),
                ("keys", &store.key_count().to_string()),
            ],
        );

        Ok(Self {
            inner: Arc::new(DbInner {
                coordinator,
                options,
            }),
        })
    }

    /// Starts a transaction at a fresh snapshot.
    pub fn new_transaction(&self, read_write: bool) -> Transaction {
        Transaction::begin(Arc::clone(&self.inner.coordinator), read_write)
    }

    /// Runs `f` in a read-only transaction, then discards it.
    pub fn view<T, F>(&self, f: F) -> KvResult<T>
    where
        F: FnOnce(&Transaction) -> KvResult<T>,
    {
        let mut txn = self.new_transaction(false);
        let result = f(&txn);
        txn.discard();
        result
    }

    /// Runs `f` in a read-write transaction and commits it if `f` succeeds.
    ///
    /// Errors from `f` or from the commit are returned unchanged; nothing is
    /// retried.
    pub fn update<T, F>(&self, f: F) -> KvResult<T>
    where
        F: FnOnce(&mut Transaction) -> KvResult<T>,
    {
        let mut txn = self.new_transaction(true);
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                txn.discard();
                Err(err)
            }
        }
    }

    /// Prunes versions no live or future snapshot can observe.
    pub fn collect_garbage(&self) -> GcStats {
        let coordinator = &self.inner.coordinator;
        gc::collect(coordinator.store(), coordinator.oracle())
    }

    pub fn options(&self) -> &DbOptions {
        &self.inner.options
    }

    /// True if commits are written to a WAL.
    pub fn is_durable(&self) -> bool {
        self.inner.coordinator.is_durable()
    }

    /// Highest commit timestamp visible to new transactions.
    pub fn last_commit_ts(&self) -> Timestamp {
        self.inner.coordinator.oracle().last_published()
    }

    /// Number of keys with at least one retained version.
    pub fn key_count(&self) -> usize {
        self.inner.coordinator.store().key_count()
    }

    /// Total number of retained versions.
    pub fn version_count(&self) -> usize {
        self.inner.coordinator.store().version_count()
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("options", &self.inner.options)
            .field("last_commit_ts", &self.last_commit_ts())
            .finish()
    }
}

/// Replays the WAL into `store`. Returns the highest commit timestamp.
fn replay(data_dir: &Path, store: &VersionedStore) -> KvResult<Timestamp> {
    let path = wal_path(data_dir);
    let empty = is_empty_log(&path).map_err(|e| {
        WalError::corruption(format!("Failed to stat WAL {}: {}", path.display(), e))
    })?;
    if empty {
        return Ok(Timestamp::ZERO);
    }

    log_event(Event::WalReplayBegin);

    let mut reader = WalReader::open(&path)?;
    let mut records = 0u64;
    loop {
        let record = match reader.read_next() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(err) => {
                let site = err.site().map(|s| s.to_string()).unwrap_or_default();
                log_event_with_fields(
                    Event::WalCorruption,
                    &[("error", &err.to_string()), ("site", &site)],
                );
                return Err(err.into());
            }
        };
        store
            .apply(record.commit_ts, &record.entries)
            .map_err(report)?;
        records += 1;
    }

    let highest = Timestamp::new(reader.last_commit_ts());
    log_event_with_fields(
        Event::WalReplayComplete,
        &[
            ("last_commit_ts", &highest.to_string()),
            ("records", &records.to_string()),
        ],
    );
    Ok(highest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::KvError;
    use tempfile::TempDir;

    #[test]
    fn test_update_then_view() {
        let db = Db::open_in_memory().unwrap();
        db.update(|txn| txn.set("k", "v")).unwrap();

        let value = db.view(|txn| txn.get(b"k")).unwrap();
        assert_eq!(value, b"v");
        assert!(!db.is_durable());
    }

    #[test]
    fn test_update_error_discards_writes() {
        let db = Db::open_in_memory().unwrap();
        let result: KvResult<()> = db.update(|txn| {
            txn.set("k", "v")?;
            Err(KvError::KeyNotFound)
        });
        assert!(result.unwrap_err().is_not_found());
        assert!(db.view(|txn| txn.get(b"k")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_view_rejects_writes() {
        let db = Db::open_in_memory().unwrap();
        let err = db
            .view(|txn| txn.get(b"missing").map(|_| ()))
            .unwrap_err();
        assert!(err.is_not_found());

        let mut txn = db.new_transaction(false);
        assert!(matches!(txn.set("k", "v"), Err(KvError::ReadOnlyTransaction)));
    }

    #[test]
    fn test_reopen_restores_state_and_clock() {
        let temp = TempDir::new().unwrap();
        let last = {
            let db = Db::open(temp.path()).unwrap();
            db.update(|txn| {
                txn.set("a", "1")?;
                txn.set("b", "2")
            })
            .unwrap();
            db.update(|txn| txn.delete("a")).unwrap();
            db.last_commit_ts()
        };

        let db = Db::open(temp.path()).unwrap();
        assert!(db.is_durable());
        assert_eq!(db.last_commit_ts(), last);
        assert!(db.view(|txn| txn.get(b"a")).unwrap_err().is_not_found());
        assert_eq!(db.view(|txn| txn.get(b"b")).unwrap(), b"2");

        let txn = db.new_transaction(false);
        assert!(txn.start_ts() > last);
    }

    #[test]
    fn test_clones_share_engine() {
        let db = Db::open_in_memory().unwrap();
        let other = db.clone();
        other.update(|txn| txn.set("k", "v")).unwrap();
        assert_eq!(db.view(|txn| txn.get(b"k")).unwrap(), b"v");
    }

    #[test]
    fn test_invalid_options_refuse_to_open() {
        let err = Db::open_with(DbOptions::in_memory().with_max_pending_writes(0)).unwrap_err();
        assert_eq!(err.code(), "AERO_CONFIG_INVALID");
    }
}
