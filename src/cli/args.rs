//! CLI argument definitions using clap
//!
//! Commands:
//! - aerokv init --config <path>
//! - aerokv get --config <path> <key>
//! - aerokv set --config <path> <key> <value>
//! - aerokv delete --config <path> <key>
//! - aerokv scan --config <path> [--prefix <p>] [--reverse] [--limit <n>]
//! - aerokv stats --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerokv - an embedded MVCC key-value store
#[derive(Parser, Debug)]
#[command(name = "aerokv")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./aerokv.json")]
        config: PathBuf,
    },

    /// Print the value of a key
    Get {
        /// Path to configuration file
        #[arg(long, default_value = "./aerokv.json")]
        config: PathBuf,
        key: String,
    },

    /// Set a key in its own transaction
    Set {
        /// Path to configuration file
        #[arg(long, default_value = "./aerokv.json")]
        config: PathBuf,
        key: String,
        value: String,
    },

    /// Delete a key in its own transaction
    Delete {
        /// Path to configuration file
        #[arg(long, default_value = "./aerokv.json")]
        config: PathBuf,
        key: String,
    },

    /// List keys and values from one snapshot
    Scan {
        /// Path to configuration file
        #[arg(long, default_value = "./aerokv.json")]
        config: PathBuf,
        /// Only keys starting with this prefix
        #[arg(long, default_value = "")]
        prefix: String,
        /// Descending key order
        #[arg(long)]
        reverse: bool,
        /// Stop after this many entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Report key and version counts of the replayed state
    Stats {
        /// Path to configuration file
        #[arg(long, default_value = "./aerokv.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_flags() {
        let cli = Cli::try_parse_from([
            "aerokv", "scan", "--config", "kv.json", "--prefix", "user:", "--reverse", "--limit", "5",
        ])
        .unwrap();
        match cli.command {
            Command::Scan {
                config,
                prefix,
                reverse,
                limit,
            } => {
                assert_eq!(config, PathBuf::from("kv.json"));
                assert_eq!(prefix, "user:");
                assert!(reverse);
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_stats() {
        let cli = Cli::try_parse_from(["aerokv", "stats"]).unwrap();
        match cli.command {
            Command::Stats { config } => assert_eq!(config, PathBuf::from("./aerokv.json")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_set_requires_value() {
        assert!(Cli::try_parse_from(["aerokv", "set", "k"]).is_err());
    }
}
