//! CLI error types
//!
//! Engine errors pass through with their own code (`AERO_TXN_CONFLICT`,
//! `AERO_WAL_*`, `AERO_CONFIG_INVALID`, ...) so scripts can match on it. The
//! CLI adds codes only for what it checks itself.

use std::io;

use thiserror::Error;

use crate::errors::KvError;

/// CLI errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Writing the JSON response failed
    #[error("failed to write response: {0}")]
    Io(#[from] io::Error),

    #[error("data directory already initialized")]
    AlreadyInitialized,

    #[error("data directory not initialized, run `aerokv init` first")]
    NotInitialized,

    #[error(transparent)]
    Engine(#[from] KvError),
}

impl CliError {
    /// Stable error code printed in the JSON response
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "AERO_CLI_IO_ERROR",
            Self::AlreadyInitialized => "AERO_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "AERO_CLI_NOT_INITIALIZED",
            Self::Engine(err) => err.code(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(e.into())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
