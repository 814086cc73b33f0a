//! CLI module for aerokv
//!
//! Provides command-line access to a data directory:
//! - init: create the data directory and an empty WAL
//! - get / set / delete: single-key transactions
//! - scan: snapshot listing with prefix, direction and limit
//! - stats: key and version counts of the replayed state

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{delete, execute, get, init, run, run_command, scan, set, stats};
pub use errors::{CliError, CliResult};
pub use io::{write_error, write_response};
