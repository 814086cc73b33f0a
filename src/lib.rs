//! aerokv - an embedded, snapshot-isolated, transactional key-value store
//!
//! Every transaction reads from the snapshot taken at its start timestamp,
//! buffers its writes privately and publishes them atomically on commit.
//! A commit fails with `KvError::Conflict` if a key it read was committed
//! by someone else after its snapshot.
//!
//! ```no_run
//! use aerokv::{Db, IteratorOptions};
//!
//! # fn main() -> aerokv::KvResult<()> {
//! let db = Db::open("/tmp/aerokv")?;
//! db.update(|txn| txn.set("user:1", "ada"))?;
//!
//! db.view(|txn| {
//!     let mut iter = txn.new_iterator(IteratorOptions::with_prefix("user:"));
//!     for item in iter.items() {
//!         println!("{:?} = {:?}", item.key(), item.value());
//!     }
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod db;
pub mod errors;
pub mod mvcc;
pub mod observability;
pub mod txn;
pub mod wal;

pub use db::{Db, DbOptions};
pub use errors::{KvError, KvResult};
pub use mvcc::{GcStats, Timestamp};
pub use txn::{Item, IteratorOptions, IteratorState, Transaction, TxnIterator, TxnState};
