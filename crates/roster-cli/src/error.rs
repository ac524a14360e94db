use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] roster_core::Error),
    #[error(transparent)]
    Config(#[from] roster_core::ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Reservation code cannot be empty")]
    EmptyCode,
    #[error("No operation event provided (pass --event or pipe JSON on stdin)")]
    EmptyEvent,
    #[error("Failed to resolve a data directory; set ROSTER_DB_PATH or pass --db-path")]
    NoDataDir,
    #[error("Reconciliation failed: {0}")]
    ReconcileFailed(String),
}
