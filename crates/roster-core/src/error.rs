//! Error types for roster-core

use serde::Serialize;
use thiserror::Error;

/// Result type alias using roster-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can end a reconciliation pass or a store/reader call
#[derive(Error, Debug)]
pub enum Error {
    /// Remote fetch failed (transport or upstream failure)
    #[error("Remote state unavailable: {0}")]
    RemoteUnavailable(String),

    /// Local store failed
    #[error("Reservation store unavailable: {0}")]
    StoreUnavailable(String),

    /// Local store rejected a write
    #[error("Reservation store conflict: {0}")]
    StoreConflict(String),

    /// Malformed remote document or invalid identifier
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Coarse error category, stable across message changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RemoteUnavailable,
    StoreUnavailable,
    StoreConflict,
    InvalidState,
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
            Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Self::StoreConflict(_) => ErrorKind::StoreConflict,
            Self::InvalidState(_) => ErrorKind::InvalidState,
        }
    }

    /// Whether re-running the same operation later can succeed.
    ///
    /// `InvalidState` and `StoreConflict` need a human or an upstream change.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable(_) | Self::StoreUnavailable(_)
        )
    }
}

impl From<libsql::Error> for Error {
    fn from(error: libsql::Error) -> Self {
        let message = error.to_string();
        if is_constraint_violation(&message) {
            Self::StoreConflict(message)
        } else {
            Self::StoreUnavailable(message)
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidState(format!("remote document could not be decoded: {error}"))
        } else {
            Self::RemoteUnavailable(error.to_string().replace('\n', " "))
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidState(format!("malformed JSON: {error}"))
    }
}

fn is_constraint_violation(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("constraint failed") || message.contains("sqlite_constraint")
}
