//! Transaction iterators
//!
//! A `TxnIterator` walks the keys visible to one transaction: committed
//! versions as of its start timestamp merged with its own buffered writes.
//! Buffered entries override committed ones for the same key and buffered
//! tombstones hide the key.
//!
//! The iterator borrows its transaction, so the buffer cannot change while
//! the iterator exists and every rewind sees the same buffered state.
//! Committed data is fetched lazily in batches of `prefetch_size` keys.
//!
//! Keys produced by an iterator of a read-write transaction join its
//! read-set, like keys read with `get`.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::ops::Bound;

use crate::mvcc::{Scan, ScanOptions, Timestamp, VersionPayload, DEFAULT_SCAN_BATCH};

use super::Transaction;

/// Iteration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IteratorOptions {
    /// Only keys starting with this prefix are produced
    pub prefix: Vec<u8>,
    /// Produce keys in descending order
    pub reverse: bool,
    /// Committed keys fetched per batch (advisory)
    pub prefetch_size: usize,
}

impl Default for IteratorOptions {
    fn default() -> Self {
        Self {
            prefix: Vec::new(),
            reverse: false,
            prefetch_size: DEFAULT_SCAN_BATCH,
        }
    }
}

impl IteratorOptions {
    /// Options restricted to keys starting with `prefix`.
    pub fn with_prefix(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Sets descending order.
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Sets the batch size for committed keys.
    pub fn prefetch_size(mut self, prefetch_size: usize) -> Self {
        self.prefetch_size = prefetch_size;
        self
    }
}

/// A key with the value and version visible to a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    key: Vec<u8>,
    value: Vec<u8>,
    version: Timestamp,
}

impl Item {
    pub(crate) fn new(key: Vec<u8>, value: Vec<u8>, version: Timestamp) -> Self {
        Self { key, value, version }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Commit timestamp of the version, or the transaction's start timestamp
    /// for a buffered write.
    pub fn version(&self) -> Timestamp {
        self.version
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.key, self.value)
    }
}

/// Iterator position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    /// Created, not yet rewound or seeked
    Unpositioned,
    /// On a key; `key`, `value` and `item` are defined
    Positioned,
    /// Past the last key
    Exhausted,
}

enum Source {
    Store,
    Buffer,
    Both,
}

/// Snapshot-consistent cursor over a transaction's visible keys.
pub struct TxnIterator<'a> {
    txn: &'a Transaction,
    options: IteratorOptions,
    scan: Option<Scan>,
    buffered: VecDeque<(&'a [u8], &'a VersionPayload)>,
    current: Option<Item>,
    state: IteratorState,
}

impl<'a> TxnIterator<'a> {
    pub(crate) fn new(txn: &'a Transaction, options: IteratorOptions) -> Self {
        Self {
            txn,
            options,
            scan: None,
            buffered: VecDeque::new(),
            current: None,
            state: IteratorState::Unpositioned,
        }
    }

    /// Positions at the first key of the range.
    pub fn rewind(&mut self) {
        self.position(None);
    }

    /// Positions at the first key at or after `key` (at or before `key`
    /// when reversed) within the prefix.
    pub fn seek(&mut self, key: &[u8]) {
        self.position(Some(key));
    }

    /// True iff positioned on a key.
    pub fn valid(&self) -> bool {
        self.state == IteratorState::Positioned
    }

    /// True iff positioned on a key starting with `prefix`.
    pub fn valid_for_prefix(&self, prefix: &[u8]) -> bool {
        self.key().map_or(false, |key| key.starts_with(prefix))
    }

    /// Advances to the next key. Does nothing unless positioned.
    pub fn next(&mut self) {
        if self.state == IteratorState::Positioned {
            self.advance();
        }
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(Item::key)
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(Item::value)
    }

    pub fn item(&self) -> Option<&Item> {
        self.current.as_ref()
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    pub fn options(&self) -> &IteratorOptions {
        &self.options
    }

    /// Consumes items from the current position, rewinding first if the
    /// iterator has not been positioned yet.
    pub fn items(&mut self) -> Items<'_, 'a> {
        Items { iter: self }
    }

    fn position(&mut self, start: Option<&[u8]>) {
        let scan_options = ScanOptions {
            prefix: self.options.prefix.clone(),
            reverse: self.options.reverse,
            start: start.map(<[u8]>::to_vec),
            batch_size: self.options.prefetch_size,
        };
        self.scan = Some(self.txn.store().scan(self.txn.start_ts(), scan_options));
        self.buffered = self.buffered_from(start);
        self.advance();
    }

    /// Buffered writes inside the range, in iteration order.
    fn buffered_from(&self, start: Option<&[u8]>) -> VecDeque<(&'a [u8], &'a VersionPayload)> {
        let txn: &'a Transaction = self.txn;
        let writes = txn.writes();
        let prefix = self.options.prefix.as_slice();

        if self.options.reverse {
            let upper = start.map_or(Bound::Unbounded, Bound::Included);
            writes
                .range::<[u8], _>((Bound::Unbounded, upper))
                .rev()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, payload)| (key.as_slice(), payload))
                .collect()
        } else {
            let lower = match start {
                Some(s) if s > prefix => s,
                _ => prefix,
            };
            writes
                .range::<[u8], _>((Bound::Included(lower), Bound::Unbounded))
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, payload)| (key.as_slice(), payload))
                .collect()
        }
    }

    fn advance(&mut self) {
        let reverse = self.options.reverse;
        loop {
            let source = {
                let store_head = self.scan.as_mut().and_then(Scan::peek);
                match (store_head, self.buffered.front()) {
                    (None, None) => None,
                    (Some(_), None) => Some(Source::Store),
                    (None, Some(_)) => Some(Source::Buffer),
                    (Some((store_key, _)), Some((buffer_key, _))) => {
                        let ord = store_key.as_slice().cmp(*buffer_key);
                        let ord = if reverse { ord.reverse() } else { ord };
                        Some(match ord {
                            Ordering::Less => Source::Store,
                            Ordering::Greater => Source::Buffer,
                            Ordering::Equal => Source::Both,
                        })
                    }
                }
            };

            let item = match source {
                None => {
                    self.current = None;
                    self.state = IteratorState::Exhausted;
                    return;
                }
                Some(Source::Store) => match self.scan.as_mut().and_then(Iterator::next) {
                    Some((key, version)) => match version.payload() {
                        VersionPayload::Value(value) => {
                            Some(Item::new(key, value.clone(), version.commit_ts()))
                        }
                        VersionPayload::Tombstone => None,
                    },
                    None => None,
                },
                Some(source) => {
                    if matches!(source, Source::Both) {
                        if let Some(scan) = self.scan.as_mut() {
                            scan.next();
                        }
                    }
                    match self.buffered.pop_front() {
                        Some((key, VersionPayload::Value(value))) => {
                            Some(Item::new(key.to_vec(), value.clone(), self.txn.start_ts()))
                        }
                        _ => None,
                    }
                }
            };

            if let Some(item) = item {
                self.txn.record_read(item.key());
                self.current = Some(item);
                self.state = IteratorState::Positioned;
                return;
            }
        }
    }
}

impl std::fmt::Debug for TxnIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxnIterator")
            .field("start_ts", &self.txn.start_ts())
            .field("options", &self.options)
            .field("state", &self.state)
            .finish()
    }
}

/// Owning adapter yielding `Item`s from a `TxnIterator`.
pub struct Items<'i, 'a> {
    iter: &'i mut TxnIterator<'a>,
}

impl Iterator for Items<'_, '_> {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        match self.iter.state {
            IteratorState::Unpositioned => self.iter.rewind(),
            IteratorState::Positioned => {}
            IteratorState::Exhausted => return None,
        }
        let item = self.iter.current.take()?;
        self.iter.advance();
        Some(item)
    }
}
