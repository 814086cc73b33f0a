//! Observable events for aerokv
//!
//! Events are explicit and typed. Each carries a default severity so call
//! sites only decide which fields to attach.

use std::fmt;

use super::Severity;

/// Observable events in aerokv
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// A database handle was opened
    DbOpen,
    /// The last handle to a database was dropped
    DbClose,

    // WAL
    /// Replay of an existing log begins
    WalReplayBegin,
    /// Replay finished, the store reflects every logged commit
    WalReplayComplete,
    /// One commit batch was appended to the log
    WalAppend,
    /// The log failed validation during replay (FATAL)
    WalCorruption,

    // Transactions
    /// A transaction obtained its start timestamp
    TxnBegin,
    /// A transaction published its writes
    TxnCommit,
    /// A commit was rejected by read-set validation
    TxnConflict,
    /// A transaction was released without publishing
    TxnDiscard,

    // Maintenance
    /// Obsolete versions were pruned below the watermark
    GcComplete,

    /// An engine invariant was broken (FATAL)
    InvariantViolation,
}

impl Event {
    /// Returns the event name as written in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::DbOpen => "DB_OPEN",
            Event::DbClose => "DB_CLOSE",
            Event::WalReplayBegin => "WAL_REPLAY_BEGIN",
            Event::WalReplayComplete => "WAL_REPLAY_COMPLETE",
            Event::WalAppend => "WAL_APPEND",
            Event::WalCorruption => "WAL_CORRUPTION",
            Event::TxnBegin => "TXN_BEGIN",
            Event::TxnCommit => "TXN_COMMIT",
            Event::TxnConflict => "TXN_CONFLICT",
            Event::TxnDiscard => "TXN_DISCARD",
            Event::GcComplete => "GC_COMPLETE",
            Event::InvariantViolation => "INVARIANT_VIOLATION",
        }
    }

    /// Returns true if this event means the engine must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::WalCorruption | Event::InvariantViolation)
    }

    /// Default severity for this event
    pub fn severity(&self) -> Severity {
        match self {
            Event::WalCorruption | Event::InvariantViolation => Severity::Fatal,
            Event::TxnConflict => Severity::Warn,
            Event::DbOpen
            | Event::DbClose
            | Event::WalReplayBegin
            | Event::WalReplayComplete
            | Event::GcComplete => Severity::Info,
            Event::WalAppend | Event::TxnBegin | Event::TxnCommit | Event::TxnDiscard => {
                Severity::Trace
            }
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
