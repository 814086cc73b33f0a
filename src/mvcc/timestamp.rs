//! Timestamp - logical clock value
//!
//! Start and commit timestamps come from one counter, so a single type
//! orders both. Timestamps are independent of wall-clock time.

use std::fmt;

/// A logical, totally ordered timestamp issued by the oracle.
///
/// Zero is never issued: it is the snapshot of an empty store.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The timestamp before anything was issued.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Creates a timestamp with the given value.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns the timestamp immediately after this one.
    #[inline]
    pub(crate) fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering() {
        assert!(Timestamp::new(1) < Timestamp::new(2));
        assert!(Timestamp::ZERO < Timestamp::new(1));
        assert_eq!(Timestamp::new(7).next(), Timestamp::new(8));
    }

    #[test]
    fn test_timestamp_display() {
        assert_eq!(Timestamp::new(42).to_string(), "42");
    }
}
