//! WAL record types and structures
//!
//! One record per committed transaction:
//! - Record Length (u32 LE) - total length including this field and the checksum
//! - Record Type (u8)
//! - Commit Timestamp (u64 LE)
//! - Entry Count (u32 LE)
//! - Entries, each:
//!   - Key Length (u32 LE), Key
//!   - Kind (u8): 0 = value, 1 = tombstone
//!   - Value Length (u32 LE), Value (empty for tombstones)
//! - Checksum (u32 LE) over every preceding byte of the record
//!
//! Records carry the full post-commit value of every written key, never
//! deltas, so replay is a plain re-application.
//!
//! The whole record must fit the u32 length prefix; every inner length is
//! then bounded by it too.

use std::io::{self, Read};

use super::checksum::{compute_checksum, verify_checksum};
use super::errors::{WalError, WalResult};
use crate::mvcc::{Timestamp, VersionPayload};

/// Smallest possible record: length + type + commit_ts + count + checksum.
pub(crate) const MIN_RECORD_SIZE: usize = 4 + 1 + 8 + 4 + 4;

const KIND_VALUE: u8 = 0;
const KIND_TOMBSTONE: u8 = 1;

/// WAL record types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// A committed transaction's complete write batch
    Commit = 1,
}

impl RecordType {
    /// Convert from u8, returns None for invalid values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(RecordType::Commit),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One committed write batch as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// Record type
    pub record_type: RecordType,
    /// Commit timestamp the batch was published at
    pub commit_ts: Timestamp,
    /// Written keys with their value or tombstone, in key order
    pub entries: Vec<(Vec<u8>, VersionPayload)>,
}

impl WalRecord {
    /// Create a commit record
    pub fn commit(commit_ts: Timestamp, entries: Vec<(Vec<u8>, VersionPayload)>) -> Self {
        Self {
            record_type: RecordType::Commit,
            commit_ts,
            entries,
        }
    }

    /// Size of the serialized record, checksum included.
    pub fn encoded_len(&self) -> usize {
        self.entries
            .iter()
            .map(|(key, payload)| 4 + key.len() + 1 + 4 + payload.value().map_or(0, |v| v.len()))
            .fold(MIN_RECORD_SIZE, usize::saturating_add)
    }

    fn serialize_body(&self, buf: &mut Vec<u8>) {
        buf.push(self.record_type.as_u8());
        buf.extend_from_slice(&self.commit_ts.value().to_le_bytes());
        buf.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());

        for (key, payload) in &self.entries {
            buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
            buf.extend_from_slice(key);
            match payload {
                VersionPayload::Value(value) => {
                    buf.push(KIND_VALUE);
                    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
                    buf.extend_from_slice(value);
                }
                VersionPayload::Tombstone => {
                    buf.push(KIND_TOMBSTONE);
                    buf.extend_from_slice(&0u32.to_le_bytes());
                }
            }
        }
    }

    /// Serialize the complete record to bytes, checksum included.
    ///
    /// # Errors
    ///
    /// `AERO_WAL_RECORD_TOO_LARGE` if the record does not fit the length prefix.
    pub fn serialize(&self) -> WalResult<Vec<u8>> {
        let size = self.encoded_len();
        let record_length = length_prefix(self.commit_ts, size)?;

        let mut record = Vec::with_capacity(size);
        record.extend_from_slice(&record_length.to_le_bytes());
        self.serialize_body(&mut record);

        let checksum = compute_checksum(&record);
        record.extend_from_slice(&checksum.to_le_bytes());
        Ok(record)
    }

    /// Deserialize a record from bytes, verifying the checksum.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Record too short"));
        }

        let record_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if record_length < MIN_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid record length: {}", record_length),
            ));
        }
        if data.len() < record_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Record truncated: expected {} bytes, got {}",
                    record_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = record_length - 4;
        let mut checksum_bytes = [0u8; 4];
        checksum_bytes.copy_from_slice(&data[checksum_offset..record_length]);
        let stored_checksum = u32::from_le_bytes(checksum_bytes);

        if !verify_checksum(&data[..checksum_offset], stored_checksum) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Checksum mismatch: stored {:08x}", stored_checksum),
            ));
        }

        let mut body = io::Cursor::new(&data[4..checksum_offset]);

        let type_byte = read_u8(&mut body)?;
        let record_type = RecordType::from_u8(type_byte).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid record type: {}", type_byte),
            )
        })?;
        let commit_ts = Timestamp::new(read_u64(&mut body)?);
        let count = read_u32(&mut body)? as usize;

        let mut entries = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = read_bytes(&mut body)?;
            let payload = match read_u8(&mut body)? {
                KIND_VALUE => VersionPayload::Value(read_bytes(&mut body)?),
                KIND_TOMBSTONE => {
                    read_bytes(&mut body)?;
                    VersionPayload::Tombstone
                }
                other => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Invalid entry kind: {}", other),
                    ))
                }
            };
            entries.push((key, payload));
        }

        if body.position() as usize != checksum_offset - 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Trailing bytes after last entry",
            ));
        }

        Ok((
            WalRecord {
                record_type,
                commit_ts,
                entries,
            },
            record_length,
        ))
    }
}

fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_bytes<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let len = read_u32(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn length_prefix(commit_ts: Timestamp, size: usize) -> WalResult<u32> {
    u32::try_from(size).map_err(|_| WalError::RecordTooLarge {
        commit_ts: commit_ts.value(),
        size,
    })
}
