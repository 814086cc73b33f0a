//! Transactions
//!
//! This module provides:
//! - `Transaction` - snapshot-bound scope with a private write buffer
//! - `CommitCoordinator` - serialized validation and publication of commits
//! - `TxnIterator` - merged, snapshot-consistent iteration

mod coordinator;
mod iterator;
mod transaction;

pub use coordinator::{CommitCoordinator, CommitSettings, PendingCommit};
pub(crate) use coordinator::report;
pub use iterator::{Item, IteratorOptions, IteratorState, Items, TxnIterator};
pub use transaction::{Transaction, TxnState};
