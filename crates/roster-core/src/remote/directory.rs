//! Shadow documents exported to a local directory

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use super::document::parse_shadow_document;
use super::{RemoteStateDeleter, RemoteStateReader};
use crate::error::{Error, Result};
use crate::models::{RemoteState, ReservationId};

/// Reads shadow documents exported to `<dir>/<reservation_code>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryShadowReader {
    root: PathBuf,
}

impl DirectoryShadowReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, id: &ReservationId) -> Result<PathBuf> {
        let code = id.reservation_code();
        if code.contains(['/', '\\']) || code == "." || code == ".." {
            return Err(Error::InvalidState(format!(
                "reservation code '{code}' is not a valid file name"
            )));
        }
        Ok(self.root.join(format!("{code}.json")))
    }
}

impl RemoteStateReader for DirectoryShadowReader {
    async fn fetch(&self, id: &ReservationId) -> Result<RemoteState> {
        let path = self.document_path(id)?;
        let payload = match tokio::fs::read(&path).await {
            Ok(payload) => payload,
            Err(error) if error.kind() == IoErrorKind::NotFound => {
                return Err(Error::InvalidState(format!(
                    "no shadow document at {}",
                    path.display()
                )))
            }
            Err(error) => {
                return Err(Error::RemoteUnavailable(format!(
                    "failed to read {}: {error}",
                    path.display()
                )))
            }
        };

        parse_shadow_document(&payload)
    }
}

impl RemoteStateDeleter for DirectoryShadowReader {
    async fn delete_remote(&self, id: &ReservationId) -> Result<bool> {
        let path = self.document_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Removed shadow document {}", path.display());
                Ok(true)
            }
            Err(error) if error.kind() == IoErrorKind::NotFound => Ok(false),
            Err(error) => Err(Error::RemoteUnavailable(format!(
                "failed to remove {}: {error}",
                path.display()
            ))),
        }
    }
}
