//! WAL writer
//!
//! - Append-only, single file at `<data_dir>/wal/wal.log`
//! - One record per committed transaction, written before the batch is
//!   published to readers
//! - With `sync` set, every append is followed by fsync and nothing is
//!   acknowledged before fsync returns
//!
//! A failed append truncates the file back to its last complete record, so
//! the log never holds a record its caller saw fail. A failed fsync also
//! poisons the writer: durability of the whole file is unknown from then on.
//! If the truncation itself fails the torn bytes stay behind and the writer
//! is poisoned with a corruption error. A poisoned writer rejects every
//! later append.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::errors::{WalError, WalResult};
use super::record::WalRecord;

/// Returns the WAL file location for a data directory.
pub fn wal_path(data_dir: &Path) -> PathBuf {
    data_dir.join("wal").join("wal.log")
}

/// I/O failures tests can force on the writer.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WalFaults {
    /// Write half of the record, then fail
    pub torn_write: bool,
    /// Fail fsync
    pub sync: bool,
    /// Fail the rollback truncation
    pub truncate: bool,
}

/// Appends commit records to the WAL file.
#[derive(Debug)]
pub struct WalWriter {
    /// Path to the WAL file
    wal_path: PathBuf,
    /// Underlying file handle
    file: File,
    /// Length of the file after the last successful append
    len: u64,
    /// Records appended through this writer
    appended: u64,
    /// First fatal failure, if any
    poisoned: Option<String>,
    #[cfg(test)]
    faults: WalFaults,
}

impl WalWriter {
    /// Opens or creates `<data_dir>/wal/wal.log`, creating directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns `AERO_WAL_APPEND_FAILED` if the file cannot be created or opened.
    pub fn open(data_dir: &Path) -> WalResult<Self> {
        let wal_path = wal_path(data_dir);
        let wal_dir = wal_path.parent().unwrap_or(data_dir);

        fs::create_dir_all(wal_dir).map_err(|e| {
            WalError::append_failed(
                format!("Failed to create WAL directory: {}", wal_dir.display()),
                e,
            )
        })?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&wal_path)
            .map_err(|e| {
                WalError::append_failed(
                    format!("Failed to open WAL file: {}", wal_path.display()),
                    e,
                )
            })?;

        let len = file
            .metadata()
            .map_err(|e| WalError::append_failed("Failed to read WAL metadata", e))?
            .len();

        Ok(Self {
            wal_path,
            file,
            len,
            appended: 0,
            poisoned: None,
            #[cfg(test)]
            faults: WalFaults::default(),
        })
    }

    /// Returns the path to the WAL file.
    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    /// Returns the current file length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if the file holds no records.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of records appended through this writer.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Returns true once a fatal failure has stopped this writer.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Appends one commit record, then fsyncs when `sync` is set.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// - `AERO_WAL_RECORD_TOO_LARGE` if the record cannot be encoded, nothing written
    /// - `AERO_WAL_APPEND_FAILED` if the write fails and was rolled back
    /// - `AERO_WAL_FSYNC_FAILED` if fsync fails (FATAL, record rolled back)
    /// - `AERO_WAL_CORRUPTION` if a rollback fails (FATAL)
    /// - `AERO_WAL_POISONED` after any earlier fatal failure
    pub fn append(&mut self, record: &WalRecord, sync: bool) -> WalResult<usize> {
        if let Some(cause) = &self.poisoned {
            return Err(WalError::Poisoned {
                cause: cause.clone(),
            });
        }

        let serialized = record.serialize()?;
        let commit_ts = record.commit_ts;

        if let Err(e) = self.write_record(&serialized) {
            self.rollback()?;
            return Err(WalError::append_failed(
                format!("Failed to write WAL record at commit_ts {}", commit_ts),
                e,
            ));
        }

        if sync {
            if let Err(e) = self.sync() {
                let err = WalError::fsync_failed(
                    format!("fsync failed after WAL append at commit_ts {}", commit_ts),
                    e,
                );
                // A record whose fsync failed must not replay as a commit.
                self.rollback()?;
                self.poisoned = Some(err.to_string());
                return Err(err);
            }
        }

        self.len += serialized.len() as u64;
        self.appended += 1;
        Ok(serialized.len())
    }

    /// Truncates the file back to the last complete record.
    fn rollback(&mut self) -> WalResult<()> {
        let len = self.len;
        self.truncate(len).map_err(|e| {
            let err = WalError::corruption_at_offset(
                len,
                format!("Failed to truncate torn WAL record: {}", e),
            );
            self.poisoned = Some(err.to_string());
            err
        })
    }

    fn write_record(&mut self, bytes: &[u8]) -> io::Result<()> {
        #[cfg(test)]
        {
            if self.faults.torn_write {
                self.file.write_all(&bytes[..bytes.len() / 2])?;
                return Err(io::Error::new(io::ErrorKind::Other, "injected torn write"));
            }
        }
        self.file.write_all(bytes)
    }

    fn sync(&mut self) -> io::Result<()> {
        #[cfg(test)]
        {
            if self.faults.sync {
                return Err(io::Error::new(io::ErrorKind::Other, "injected fsync failure"));
            }
        }
        self.file.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        #[cfg(test)]
        {
            if self.faults.truncate {
                return Err(io::Error::new(io::ErrorKind::Other, "injected truncate failure"));
            }
        }
        self.file.set_len(len)
    }

    #[cfg(test)]
    pub(crate) fn inject_faults(&mut self, faults: WalFaults) {
        self.faults = faults;
    }
}
