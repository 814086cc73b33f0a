//! MVCC Visibility - snapshot isolation read rule
//!
//! Given a snapshot timestamp `S` and the version chain of a key:
//! 1. Consider only versions with `commit_ts <= S`
//! 2. Select the one with the largest `commit_ts`
//! 3. If it is a tombstone, the key is invisible
//!
//! A snapshot never observes versions committed after it was taken, and two
//! reads with the same snapshot always resolve to the same version.

use super::{Timestamp, Version, VersionChain};

/// Result of visibility evaluation for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityResult<'a> {
    /// A visible value version exists
    Visible(&'a Version),
    /// No versions at or below the snapshot, or the latest one is a tombstone
    Invisible,
}

impl<'a> VisibilityResult<'a> {
    /// Returns the visible version if any
    pub fn version(&self) -> Option<&'a Version> {
        match self {
            VisibilityResult::Visible(v) => Some(v),
            VisibilityResult::Invisible => None,
        }
    }

    /// Returns true if visible
    pub fn is_visible(&self) -> bool {
        matches!(self, VisibilityResult::Visible(_))
    }
}

/// Stateless visibility resolver.
pub struct Visibility;

impl Visibility {
    /// Evaluates visibility for a version chain at `snapshot`.
    pub fn visible_version(chain: &VersionChain, snapshot: Timestamp) -> VisibilityResult<'_> {
        match chain.version_at(snapshot) {
            Some(version) if !version.is_tombstone() => VisibilityResult::Visible(version),
            _ => VisibilityResult::Invisible,
        }
    }

}
