//! VersionedStore - in-memory multi-version key space
//!
//! - `read` resolves the version visible at a timestamp
//! - `apply` appends one commit batch under a single write lock, after
//!   checking every key, so a batch is either fully present or absent
//! - `scan` is lazy: keys are fetched in batches under short read locks and
//!   snapshot consistency comes purely from timestamp filtering
//!
//! No lock is ever held across a whole scan or across calls.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Timestamp, Version, VersionChain, VersionPayload, Visibility};
use crate::errors::KvResult;

/// Default number of visible entries fetched per scan batch.
pub const DEFAULT_SCAN_BATCH: usize = 100;

/// Upper limit of keys examined per batch, as a multiple of the batch size.
/// Bounds the read-lock hold time when long runs of keys are invisible.
const EXAMINE_FACTOR: usize = 8;

/// Shape of a scan: key prefix, direction, starting key and batch size.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Only keys starting with this prefix are produced
    pub prefix: Vec<u8>,
    /// Produce keys in descending order
    pub reverse: bool,
    /// First key to consider (inclusive); `None` starts at the prefix edge
    pub start: Option<Vec<u8>>,
    /// Visible entries fetched per read-lock acquisition (advisory)
    pub batch_size: usize,
}

/// Result of a pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// Versions dropped from chains
    pub versions_removed: usize,
    /// Keys dropped entirely (their only remaining version was a tombstone)
    pub keys_removed: usize,
}

/// In-memory mapping from key to its ordered version chain.
#[derive(Debug, Default)]
pub struct VersionedStore {
    chains: RwLock<BTreeMap<Vec<u8>, VersionChain>>,
}

impl VersionedStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest version with `commit_ts <= as_of`, tombstones
    /// included, or `None` if the key has no such version.
    pub fn read(&self, key: &[u8], as_of: Timestamp) -> Option<Version> {
        let chains = self.chains.read();
        chains.get(key).and_then(|chain| chain.version_at(as_of).cloned())
    }

    /// Returns the value visible at `as_of`, treating tombstones as absent.
    pub fn get(&self, key: &[u8], as_of: Timestamp) -> Option<Vec<u8>> {
        let chains = self.chains.read();
        chains.get(key).and_then(|chain| {
            Visibility::visible_version(chain, as_of)
                .version()
                .and_then(|v| v.payload().value().map(<[u8]>::to_vec))
        })
    }

    /// Commit timestamp of the newest version of `key`, at any timestamp.
    pub fn latest_commit_ts(&self, key: &[u8]) -> Option<Timestamp> {
        let chains = self.chains.read();
        chains.get(key).and_then(VersionChain::latest_commit_ts)
    }

    /// Appends one version to `key`.
    ///
    /// The version must be newer than every existing version of the key;
    /// otherwise `InvariantViolation` is returned and nothing changes.
    pub fn append(&self, key: Vec<u8>, version: Version) -> KvResult<()> {
        let mut chains = self.chains.write();
        chains.entry(key).or_default().push(version)
    }

    /// Appends a whole commit batch stamped `commit_ts`.
    ///
    /// Every key is validated before anything is written, so readers see
    /// either the complete batch or none of it.
    pub fn apply(&self, commit_ts: Timestamp, entries: &[(Vec<u8>, VersionPayload)]) -> KvResult<()> {
        let mut chains = self.chains.write();

        for (key, _) in entries {
            if let Some(chain) = chains.get(key.as_slice()) {
                chain.check_append(commit_ts)?;
            }
        }

        for (key, payload) in entries {
            chains
                .entry(key.clone())
                .or_default()
                .push(Version::new(commit_ts, payload.clone()))?;
        }
        Ok(())
    }

    /// Starts a lazy scan of the keys visible at `as_of`.
    pub fn scan(self: &Arc<Self>, as_of: Timestamp, options: ScanOptions) -> Scan {
        Scan::new(Arc::clone(self), as_of, options)
    }

    /// Drops versions that no snapshot at or above `watermark` can observe.
    pub fn prune(&self, watermark: Timestamp) -> PruneStats {
        let mut chains = self.chains.write();
        let mut stats = PruneStats::default();

        for chain in chains.values_mut() {
            stats.versions_removed += chain.prune_below(watermark);
        }

        chains.retain(|_, chain| {
            let dead = match chain.versions() {
                [only] => only.is_tombstone() && only.commit_ts() <= watermark,
                [] => true,
                _ => false,
            };
            if dead {
                stats.versions_removed += chain.len();
                stats.keys_removed += 1;
            }
            !dead
        });

        stats
    }

    /// Number of keys with at least one retained version.
    pub fn key_count(&self) -> usize {
        self.chains.read().len()
    }

    /// Total number of retained versions.
    pub fn version_count(&self) -> usize {
        self.chains.read().values().map(VersionChain::len).sum()
    }

    /// Fetches up to `limit` visible entries after `cursor` and reports the
    /// last key examined, or `None` once the range is exhausted.
    fn fetch_batch(
        &self,
        as_of: Timestamp,
        options: &ScanOptions,
        cursor: Option<&[u8]>,
        limit: usize,
        out: &mut VecDeque<(Vec<u8>, Version)>,
    ) -> Option<Vec<u8>> {
        let (lower, upper) = scan_bounds(options, cursor)?;

        let chains = self.chains.read();
        let range = chains.range::<[u8], _>((as_slice_bound(&lower), as_slice_bound(&upper)));
        let entries: Box<dyn Iterator<Item = (&Vec<u8>, &VersionChain)> + '_> = if options.reverse {
            Box::new(range.rev())
        } else {
            Box::new(range)
        };

        let max_examined = limit.saturating_mul(EXAMINE_FACTOR);
        let mut examined = 0usize;

        for (key, chain) in entries {
            if !key.starts_with(&options.prefix) {
                break;
            }
            if let Some(version) = Visibility::visible_version(chain, as_of).version() {
                out.push_back((key.clone(), version.clone()));
            }
            examined += 1;
            if out.len() >= limit || examined >= max_examined {
                return Some(key.clone());
            }
        }
        None
    }
}

/// Smallest key greater than every key starting with `prefix`, or `None`
/// if no such key exists (empty prefix or all 0xff).
fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut succ = prefix.to_vec();
    while let Some(last) = succ.pop() {
        if last < u8::MAX {
            succ.push(last + 1);
            return Some(succ);
        }
    }
    None
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Computes the range to read next, or `None` when the range is empty.
fn scan_bounds(options: &ScanOptions, cursor: Option<&[u8]>) -> Option<(Bound<Vec<u8>>, Bound<Vec<u8>>)> {
    let prefix = options.prefix.as_slice();
    let start = options.start.as_deref();

    if !options.reverse {
        let lower = match (cursor, start) {
            (Some(c), _) => Bound::Excluded(c.to_vec()),
            (None, Some(s)) if s > prefix => Bound::Included(s.to_vec()),
            (None, _) => Bound::Included(prefix.to_vec()),
        };
        return Some((lower, Bound::Unbounded));
    }

    // Reverse: the upper edge is the cursor, else the seek key, capped at
    // the end of the prefix range.
    let end = prefix_successor(prefix);
    let upper = match (cursor, start) {
        (Some(c), _) => Bound::Excluded(c.to_vec()),
        (None, Some(s)) => match &end {
            Some(e) if s >= e.as_slice() => Bound::Excluded(e.clone()),
            _ => Bound::Included(s.to_vec()),
        },
        (None, None) => match end {
            Some(e) => Bound::Excluded(e),
            None => Bound::Unbounded,
        },
    };

    let empty = match &upper {
        Bound::Included(k) => k.as_slice() < prefix,
        Bound::Excluded(k) => k.as_slice() <= prefix,
        Bound::Unbounded => false,
    };
    if empty {
        return None;
    }
    Some((Bound::Included(prefix.to_vec()), upper))
}

/// A lazy, restartable scan over the keys visible at one timestamp.
///
/// Each key is produced once, with the version visible at the scan's
/// timestamp. Tombstoned keys are skipped.
pub struct Scan {
    store: Arc<VersionedStore>,
    as_of: Timestamp,
    options: ScanOptions,
    buffer: VecDeque<(Vec<u8>, Version)>,
    cursor: Option<Vec<u8>>,
    exhausted: bool,
}

impl Scan {
    fn new(store: Arc<VersionedStore>, as_of: Timestamp, mut options: ScanOptions) -> Self {
        if options.batch_size == 0 {
            options.batch_size = DEFAULT_SCAN_BATCH;
        }
        Self {
            store,
            as_of,
            options,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
        }
    }

    /// Restarts the scan from its first key.
    pub fn rewind(&mut self) {
        self.buffer.clear();
        self.cursor = None;
        self.exhausted = false;
    }

    /// Timestamp this scan resolves visibility at.
    pub fn as_of(&self) -> Timestamp {
        self.as_of
    }

    /// Returns the next entry without consuming it.
    pub fn peek(&mut self) -> Option<&(Vec<u8>, Version)> {
        self.fill();
        self.buffer.front()
    }

    fn fill(&mut self) {
        while self.buffer.is_empty() && !self.exhausted {
            let next_cursor = self.store.fetch_batch(
                self.as_of,
                &self.options,
                self.cursor.as_deref(),
                self.options.batch_size,
                &mut self.buffer,
            );
            match next_cursor {
                Some(cursor) => self.cursor = Some(cursor),
                None => self.exhausted = true,
            }
        }
    }
}

impl Iterator for Scan {
    type Item = (Vec<u8>, Version);

    fn next(&mut self) -> Option<Self::Item> {
        self.fill();
        self.buffer.pop_front()
    }
}
