//! MVCC core
//!
//! This module provides:
//! - `Timestamp` - Logical clock value ordering starts and commits
//! - `Version` / `VersionPayload` - Immutable value or tombstone
//! - `VersionChain` - Ordered history of one key
//! - `Visibility` - Snapshot isolation read rule
//! - `VersionedStore` - Key space of version chains with lazy scans
//! - `OracleClock` - Timestamp issuance and in-flight watermark
//! - `gc` - Watermark-driven pruning of unobservable versions

pub mod gc;
mod oracle;
mod store;
mod timestamp;
mod version;
mod version_chain;
mod visibility;

pub use gc::GcStats;
pub use oracle::OracleClock;
pub use store::{PruneStats, Scan, ScanOptions, VersionedStore, DEFAULT_SCAN_BATCH};
pub use timestamp::Timestamp;
pub use version::{Version, VersionPayload};
pub use version_chain::VersionChain;
pub use visibility::{Visibility, VisibilityResult};
