//! VersionChain - version history for a key
//!
//! - Versions are ordered ascending by commit timestamp
//! - No two versions share a commit timestamp
//! - Versions are never mutated; pruning only drops a prefix

use super::{Timestamp, Version};
use crate::errors::{KvError, KvResult};

/// The complete retained history of a single key.
#[derive(Clone, Debug, Default)]
pub struct VersionChain {
    versions: Vec<Version>,
}

impl VersionChain {
    /// Creates a new empty version chain.
    pub fn new() -> Self {
        Self {
            versions: Vec::new(),
        }
    }

    /// Returns the number of versions in this chain.
    #[inline]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Returns true if this chain has no versions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Returns all versions, oldest first. No visibility filtering.
    #[inline]
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Returns the newest version regardless of any snapshot.
    #[inline]
    pub fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }

    /// Returns the commit timestamp of the newest version.
    #[inline]
    pub fn latest_commit_ts(&self) -> Option<Timestamp> {
        self.latest().map(Version::commit_ts)
    }

    /// Checks that a version stamped `commit_ts` may be appended.
    pub fn check_append(&self, commit_ts: Timestamp) -> KvResult<()> {
        match self.latest_commit_ts() {
            Some(latest) if commit_ts <= latest => Err(KvError::invariant(format!(
                "commit_ts {} is not above latest version {}",
                commit_ts, latest
            ))),
            _ => Ok(()),
        }
    }

    /// Appends a version after checking timestamp monotonicity.
    pub fn push(&mut self, version: Version) -> KvResult<()> {
        self.check_append(version.commit_ts())?;
        self.versions.push(version);
        Ok(())
    }

    /// Finds the version visible at `as_of`: the largest commit timestamp
    /// not above `as_of`, tombstones included.
    pub fn version_at(&self, as_of: Timestamp) -> Option<&Version> {
        // Ascending order: everything before the partition point is <= as_of.
        let idx = self.versions.partition_point(|v| v.commit_ts() <= as_of);
        idx.checked_sub(1).map(|i| &self.versions[i])
    }

    /// Drops every version older than the newest one at or below
    /// `watermark`. Returns how many were removed.
    pub(crate) fn prune_below(&mut self, watermark: Timestamp) -> usize {
        let idx = self.versions.partition_point(|v| v.commit_ts() <= watermark);
        if idx <= 1 {
            return 0;
        }
        let removed = idx - 1;
        self.versions.drain(..removed);
        removed
    }
}
