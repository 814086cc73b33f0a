//! WAL reader with strict corruption detection
//!
//! Zero tolerance:
//! - Any checksum mismatch, malformed record or truncated tail fails the read
//! - No partial replay, no skipping records, no repair attempts
//!
//! Commit timestamps must be strictly increasing through the file; a record
//! that goes backwards is treated as corruption.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use super::errors::{WalError, WalResult};
use super::record::{WalRecord, MIN_RECORD_SIZE};

/// WAL reader for sequential replay.
pub struct WalReader {
    /// Path to the WAL file
    wal_path: PathBuf,
    /// Buffered reader for sequential reads
    reader: BufReader<File>,
    /// Current byte offset in the file
    current_offset: u64,
    /// Total file size
    file_size: u64,
    /// Commit timestamp of the last record read, 0 before the first
    last_commit_ts: u64,
}

impl WalReader {
    /// Opens a WAL file for reading.
    ///
    /// # Errors
    ///
    /// Returns `AERO_WAL_CORRUPTION` if the file cannot be opened.
    pub fn open(wal_path: &Path) -> WalResult<Self> {
        let file = File::open(wal_path).map_err(|e| {
            WalError::corruption(format!(
                "Failed to open WAL file: {}: {}",
                wal_path.display(),
                e
            ))
        })?;

        let file_size = file
            .metadata()
            .map_err(|e| WalError::corruption(format!("Failed to read WAL metadata: {}", e)))?
            .len();

        Ok(Self {
            wal_path: wal_path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
            last_commit_ts: 0,
        })
    }

    /// Returns the path to the WAL file.
    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    /// Returns the current byte offset in the file.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Returns the commit timestamp of the last record read, or 0.
    pub fn last_commit_ts(&self) -> u64 {
        self.last_commit_ts
    }

    /// Reads the next record.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` if a record was read and validated
    /// - `Ok(None)` at a clean end of file
    /// - `Err(WalError)` on any corruption or read failure
    pub fn read_next(&mut self) -> WalResult<Option<WalRecord>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < MIN_RECORD_SIZE as u64 {
            return Err(WalError::corruption_at_offset(
                self.current_offset,
                format!(
                    "Truncated WAL: {} bytes remaining, minimum record size is {}",
                    remaining, MIN_RECORD_SIZE
                ),
            ));
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            WalError::corruption_at_offset(
                self.current_offset,
                format!("Failed to read record length: {}", e),
            )
        })?;
        let record_length = u32::from_le_bytes(len_buf) as u64;

        if record_length < MIN_RECORD_SIZE as u64 {
            return Err(WalError::corruption_at_offset(
                self.current_offset,
                format!("Invalid record length: {}", record_length),
            ));
        }
        if record_length > remaining {
            return Err(WalError::corruption_at_offset(
                self.current_offset,
                format!(
                    "Record length {} exceeds remaining file size {}",
                    record_length, remaining
                ),
            ));
        }

        let mut record_buf = vec![0u8; record_length as usize];
        record_buf[0..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut record_buf[4..]).map_err(|e| {
            WalError::corruption_at_offset(
                self.current_offset,
                format!("Failed to read record body: {}", e),
            )
        })?;

        let (record, bytes_consumed) = WalRecord::deserialize(&record_buf)
            .map_err(|e| WalError::corruption_at_offset(self.current_offset, e.to_string()))?;

        let commit_ts = record.commit_ts.value();
        if commit_ts <= self.last_commit_ts {
            return Err(WalError::corruption_at_commit(
                commit_ts,
                format!(
                    "Commit timestamps out of order: {} follows {}",
                    commit_ts, self.last_commit_ts
                ),
            ));
        }

        self.current_offset += bytes_consumed as u64;
        self.last_commit_ts = commit_ts;
        Ok(Some(record))
    }

    /// Reads every remaining record, failing on the first corruption.
    pub fn read_all(&mut self) -> WalResult<Vec<WalRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_next()? {
            records.push(record);
        }
        Ok(records)
    }
}

impl std::fmt::Debug for WalReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalReader")
            .field("wal_path", &self.wal_path)
            .field("current_offset", &self.current_offset)
            .field("file_size", &self.file_size)
            .finish()
    }
}

/// Returns true if the file is missing or empty.
pub(crate) fn is_empty_log(wal_path: &Path) -> io::Result<bool> {
    match std::fs::metadata(wal_path) {
        Ok(metadata) => Ok(metadata.len() == 0),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}
