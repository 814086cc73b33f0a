//! Write-Ahead Log (WAL) subsystem for aerokv
//!
//! No commit of a durable database is visible to readers unless its batch
//! has been appended to the WAL first.
//!
//! # Design Principles
//!
//! - One record per committed transaction, full values only
//! - Checksums on every record
//! - Halt on corruption: replay either reads the whole log or refuses to open
//! - Replay strictly in commit timestamp order

mod checksum;
mod errors;
mod reader;
mod record;
mod writer;

pub use checksum::{compute_checksum, verify_checksum};
pub use errors::{CorruptionSite, WalError, WalResult};
pub use reader::WalReader;
pub(crate) use reader::is_empty_log;
pub use record::{RecordType, WalRecord};
pub use writer::{wal_path, WalWriter};
#[cfg(test)]
pub(crate) use writer::WalFaults;
