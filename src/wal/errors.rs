//! WAL error types
//!
//! | Code | Severity | Meaning |
//! |---|---|---|
//! | AERO_WAL_APPEND_FAILED | ERROR | write failed, file rolled back to its last record |
//! | AERO_WAL_RECORD_TOO_LARGE | ERROR | batch does not fit the u32 length prefix, nothing written |
//! | AERO_WAL_FSYNC_FAILED | FATAL | durability of the log is unknown |
//! | AERO_WAL_CORRUPTION | FATAL | replay found a bad record, or a torn append could not be removed |
//! | AERO_WAL_POISONED | FATAL | an earlier fatal failure stopped this writer |

use std::fmt;
use std::io;

use thiserror::Error;

use crate::observability::Severity;

/// Where in the log a corruption was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionSite {
    /// The file as a whole (metadata, open)
    File,
    /// A byte offset into the file
    Offset(u64),
    /// The record carrying this commit timestamp
    Commit(u64),
}

impl fmt::Display for CorruptionSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorruptionSite::File => write!(f, "file"),
            CorruptionSite::Offset(offset) => write!(f, "byte_offset: {}", offset),
            CorruptionSite::Commit(commit_ts) => write!(f, "commit_ts: {}", commit_ts),
        }
    }
}

/// Write-ahead log errors
#[derive(Debug, Error)]
pub enum WalError {
    #[error("WAL append failed: {context}")]
    AppendFailed {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("WAL record for commit_ts {commit_ts} is {size} bytes, above the u32 length limit")]
    RecordTooLarge { commit_ts: u64, size: usize },

    #[error("WAL fsync failed: {context}")]
    FsyncFailed {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("WAL corrupted ({site}): {reason}")]
    Corruption { site: CorruptionSite, reason: String },

    #[error("WAL writer stopped after an earlier failure: {cause}")]
    Poisoned { cause: String },
}

impl WalError {
    pub fn append_failed(context: impl Into<String>, source: io::Error) -> Self {
        Self::AppendFailed {
            context: context.into(),
            source,
        }
    }

    pub fn fsync_failed(context: impl Into<String>, source: io::Error) -> Self {
        Self::FsyncFailed {
            context: context.into(),
            source,
        }
    }

    pub fn corruption(reason: impl Into<String>) -> Self {
        Self::Corruption {
            site: CorruptionSite::File,
            reason: reason.into(),
        }
    }

    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self::Corruption {
            site: CorruptionSite::Offset(offset),
            reason: reason.into(),
        }
    }

    pub fn corruption_at_commit(commit_ts: u64, reason: impl Into<String>) -> Self {
        Self::Corruption {
            site: CorruptionSite::Commit(commit_ts),
            reason: reason.into(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::AppendFailed { .. } => "AERO_WAL_APPEND_FAILED",
            Self::RecordTooLarge { .. } => "AERO_WAL_RECORD_TOO_LARGE",
            Self::FsyncFailed { .. } => "AERO_WAL_FSYNC_FAILED",
            Self::Corruption { .. } => "AERO_WAL_CORRUPTION",
            Self::Poisoned { .. } => "AERO_WAL_POISONED",
        }
    }

    /// Failures that leave the log intact are errors; the rest are fatal.
    pub fn severity(&self) -> Severity {
        match self {
            Self::AppendFailed { .. } | Self::RecordTooLarge { .. } => Severity::Error,
            Self::FsyncFailed { .. } | Self::Corruption { .. } | Self::Poisoned { .. } => {
                Severity::Fatal
            }
        }
    }

    /// Returns whether the handle must stop being used
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Where a corruption was found, for corruption errors.
    pub fn site(&self) -> Option<CorruptionSite> {
        match self {
            Self::Corruption { site, .. } => Some(*site),
            _ => None,
        }
    }
}

/// Result type for WAL operations
pub type WalResult<T> = Result<T, WalError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn eio() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "eio")
    }

    #[test]
    fn test_rolled_back_failures_are_not_fatal() {
        let append = WalError::append_failed("write failed", eio());
        assert_eq!(append.code(), "AERO_WAL_APPEND_FAILED");
        assert!(!append.is_fatal());
        assert!(std::error::Error::source(&append).is_some());

        let too_large = WalError::RecordTooLarge {
            commit_ts: 7,
            size: usize::MAX,
        };
        assert!(!too_large.is_fatal());
        assert!(too_large.to_string().contains("commit_ts 7"));
    }

    #[test]
    fn test_fsync_corruption_and_poison_are_fatal() {
        assert!(WalError::fsync_failed("fsync", eio()).is_fatal());
        assert!(WalError::corruption("bad").is_fatal());
        let poisoned = WalError::Poisoned {
            cause: "fsync".into(),
        };
        assert_eq!(poisoned.code(), "AERO_WAL_POISONED");
        assert!(poisoned.is_fatal());
    }

    #[test]
    fn test_corruption_names_its_site() {
        let err = WalError::corruption_at_offset(128, "checksum mismatch");
        assert_eq!(err.site(), Some(CorruptionSite::Offset(128)));

        let display = err.to_string();
        assert!(display.contains("checksum mismatch"));
        assert!(display.contains("byte_offset: 128"));
        assert_eq!(
            WalError::corruption_at_commit(9, "out of order").site(),
            Some(CorruptionSite::Commit(9))
        );
    }
}
