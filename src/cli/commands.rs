//! CLI command implementations
//!
//! Each command loads the configuration, opens the database (replaying the
//! WAL), runs one transaction or report and returns the JSON payload of its
//! response. `run_command` prints it.

use std::path::Path;

use serde_json::{json, Value};

use crate::db::{Db, DbOptions};
use crate::errors::{KvError, KvResult};
use crate::txn::{Item, IteratorOptions, Transaction};
use crate::wal::{wal_path, WalWriter};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Parse arguments, run the command and print its response.
///
/// Errors are printed as a JSON error response and also returned so the
/// binary can exit non-zero.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run one parsed command and print its response
pub fn run_command(cmd: Command) -> CliResult<()> {
    match execute(cmd) {
        Ok(data) => write_response(data),
        Err(err) => {
            write_error(err.code(), &err.to_string())?;
            Err(err)
        }
    }
}

/// Run one parsed command and return its response payload
pub fn execute(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Get { config, key } => get(&config, &key),
        Command::Set { config, key, value } => set(&config, &key, &value),
        Command::Delete { config, key } => delete(&config, &key),
        Command::Scan {
            config,
            prefix,
            reverse,
            limit,
        } => scan(&config, &prefix, reverse, limit),
        Command::Stats { config } => stats(&config),
    }
}

/// Initialize a data directory: creates `<data_dir>/wal/wal.log`, writes no
/// records.
pub fn init(config_path: &Path) -> CliResult<Value> {
    let options = DbOptions::load(config_path)?;
    if options.in_memory {
        return Err(KvError::config("in_memory databases have no data directory").into());
    }
    if is_initialized(&options.data_dir) {
        return Err(CliError::AlreadyInitialized);
    }

    WalWriter::open(&options.data_dir).map_err(KvError::from)?;

    Ok(json!({
        "initialized": true,
        "data_dir": options.data_dir.display().to_string(),
    }))
}

pub fn get(config_path: &Path, key: &str) -> CliResult<Value> {
    let db = open(config_path)?;
    let item = db.view(|txn| txn.get_item(key.as_bytes()))?;
    Ok(item_json(&item))
}

pub fn set(config_path: &Path, key: &str, value: &str) -> CliResult<Value> {
    let db = open(config_path)?;
    let commit_ts = commit_one(&db, |txn| txn.set(key, value))?;
    Ok(json!({
        "key": key,
        "commit_ts": commit_ts,
    }))
}

pub fn delete(config_path: &Path, key: &str) -> CliResult<Value> {
    let db = open(config_path)?;
    let commit_ts = commit_one(&db, |txn| txn.delete(key))?;
    Ok(json!({
        "key": key,
        "commit_ts": commit_ts,
    }))
}

pub fn scan(config_path: &Path, prefix: &str, reverse: bool, limit: Option<usize>) -> CliResult<Value> {
    let db = open(config_path)?;
    let options = IteratorOptions::with_prefix(prefix).reverse(reverse);

    let items = db.view(|txn| {
        let mut iter = txn.new_iterator(options);
        let items: Vec<Value> = iter
            .items()
            .take(limit.unwrap_or(usize::MAX))
            .map(|item| item_json(&item))
            .collect();
        Ok(items)
    })?;

    Ok(json!({
        "count": items.len(),
        "items": items,
    }))
}

/// Report the replayed state.
///
/// The WAL is never compacted, so `reclaimable_versions` counts what garbage
/// collection would drop from a long-lived handle's memory, not disk space.
pub fn stats(config_path: &Path) -> CliResult<Value> {
    let db = open(config_path)?;
    let keys = db.key_count();
    let versions = db.version_count();
    let reclaimable = db.collect_garbage();
    Ok(json!({
        "last_commit_ts": db.last_commit_ts().value(),
        "keys": keys,
        "versions": versions,
        "reclaimable_versions": reclaimable.versions_removed,
    }))
}

fn open(config_path: &Path) -> CliResult<Db> {
    let options = DbOptions::load(config_path)?;
    if !options.in_memory && !is_initialized(&options.data_dir) {
        return Err(CliError::NotInitialized);
    }
    Ok(Db::open_with(options)?)
}

/// Runs one write in its own transaction and returns the commit timestamp
/// it was published at.
fn commit_one<F>(db: &Db, write: F) -> KvResult<Option<u64>>
where
    F: FnOnce(&mut Transaction) -> KvResult<()>,
{
    let mut txn = db.new_transaction(true);
    write(&mut txn)?;
    Ok(txn.commit()?.map(|ts| ts.value()))
}

fn is_initialized(data_dir: &Path) -> bool {
    wal_path(data_dir).exists()
}

fn item_json(item: &Item) -> Value {
    json!({
        "key": String::from_utf8_lossy(item.key()),
        "value": String::from_utf8_lossy(item.value()),
        "version": item.version().value(),
    })
}
