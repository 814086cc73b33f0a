//! Version - immutable value version
//!
//! - A version holds a complete value OR an explicit tombstone
//! - Each version carries the commit timestamp that published it
//! - Once created, never changes; updates and deletes append new versions

use super::Timestamp;

/// The payload of a version or of a pending write: a value or a tombstone.
///
/// Tombstone is explicit, NOT represented via Option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionPayload {
    /// A complete value.
    Value(Vec<u8>),
    /// An explicit deletion marker.
    Tombstone,
}

impl VersionPayload {
    /// Returns true if this payload is a tombstone.
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, VersionPayload::Tombstone)
    }

    /// Returns the value bytes, or `None` for a tombstone.
    #[inline]
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            VersionPayload::Value(bytes) => Some(bytes),
            VersionPayload::Tombstone => None,
        }
    }
}

/// A single committed version of a key.
///
/// Fields are private to enforce immutability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Version {
    commit_ts: Timestamp,
    payload: VersionPayload,
}

impl Version {
    /// Creates a new version.
    pub fn new(commit_ts: Timestamp, payload: VersionPayload) -> Self {
        Self { commit_ts, payload }
    }

    /// Creates a version holding a value.
    pub fn with_value(commit_ts: Timestamp, value: Vec<u8>) -> Self {
        Self::new(commit_ts, VersionPayload::Value(value))
    }

    /// Creates a tombstone version.
    pub fn with_tombstone(commit_ts: Timestamp) -> Self {
        Self::new(commit_ts, VersionPayload::Tombstone)
    }

    /// Returns the commit timestamp.
    #[inline]
    pub fn commit_ts(&self) -> Timestamp {
        self.commit_ts
    }

    /// Returns a reference to the payload.
    #[inline]
    pub fn payload(&self) -> &VersionPayload {
        &self.payload
    }

    /// Returns true if this version is a tombstone.
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_tombstone()
    }
}
