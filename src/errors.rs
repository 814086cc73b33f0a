//! Engine error types
//!
//! Error codes:
//! - AERO_TXN_CONFLICT (ERROR) - commit-time read invalidated, retry with a fresh transaction
//! - AERO_KEY_NOT_FOUND (ERROR) - read miss, expected control flow
//! - AERO_TXN_EMPTY_KEY / AERO_TXN_READ_ONLY / AERO_TXN_TOO_BIG (ERROR) - rejected write
//! - AERO_TXN_ALREADY_COMMITTED / AERO_TXN_ALREADY_DISCARDED (ERROR) - misuse of a finished transaction
//! - AERO_INVARIANT_VIOLATION (FATAL) - engine bug, stop using the handle
//! - AERO_WAL_* - see `WalError`
//! - AERO_DB_POISONED (FATAL) - commit refused after an earlier fatal commit failure
//! - AERO_CONFIG_INVALID (ERROR)
//!
//! No error is retried inside the engine.

use thiserror::Error;

use crate::mvcc::Timestamp;
use crate::observability::{display_key, Severity};
use crate::wal::WalError;

/// Result type for engine operations
pub type KvResult<T> = Result<T, KvError>;

/// Engine errors
#[derive(Debug, Error)]
pub enum KvError {
    /// A key in the read-set changed after the transaction's snapshot
    #[error("transaction conflict on key {}: snapshot at {start_ts}, newer commit at {observed_ts}", display_key(.key))]
    Conflict {
        key: Vec<u8>,
        start_ts: Timestamp,
        observed_ts: Timestamp,
    },

    /// No visible value for the key
    #[error("key not found")]
    KeyNotFound,

    /// Writes require a non-empty key
    #[error("key cannot be empty")]
    EmptyKey,

    /// Write attempted through a read-only transaction
    #[error("transaction is read-only")]
    ReadOnlyTransaction,

    /// Write buffer would exceed the configured limit
    #[error("transaction exceeds {limit} pending writes")]
    TransactionTooBig { limit: usize },

    /// Operation on a transaction that already committed
    #[error("transaction already committed")]
    AlreadyCommitted,

    /// Operation on a transaction that was discarded
    #[error("transaction already discarded")]
    AlreadyDiscarded,

    /// Engine bug: timestamp monotonicity or another internal rule broken
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    /// Write-ahead log failure
    #[error(transparent)]
    Wal(#[from] WalError),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A fatal commit failure stopped this database from accepting commits
    #[error("database stopped accepting commits after a fatal error: {cause}")]
    Poisoned { cause: String },
}

impl KvError {
    /// Create an invariant violation error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "AERO_TXN_CONFLICT",
            Self::KeyNotFound => "AERO_KEY_NOT_FOUND",
            Self::EmptyKey => "AERO_TXN_EMPTY_KEY",
            Self::ReadOnlyTransaction => "AERO_TXN_READ_ONLY",
            Self::TransactionTooBig { .. } => "AERO_TXN_TOO_BIG",
            Self::AlreadyCommitted => "AERO_TXN_ALREADY_COMMITTED",
            Self::AlreadyDiscarded => "AERO_TXN_ALREADY_DISCARDED",
            Self::InvariantViolation(_) => "AERO_INVARIANT_VIOLATION",
            Self::Wal(e) => e.code(),
            Self::Config(_) => "AERO_CONFIG_INVALID",
            Self::Poisoned { .. } => "AERO_DB_POISONED",
        }
    }

    /// Severity of this error
    pub fn severity(&self) -> Severity {
        match self {
            Self::InvariantViolation(_) | Self::Poisoned { .. } => Severity::Fatal,
            Self::Wal(e) => e.severity(),
            _ => Severity::Error,
        }
    }

    /// Returns whether the handle must stop being used
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns true for a commit rejected by read-set validation
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true for a read miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound)
    }
}
