//! Remote desired-state access
//!
//! The remote side is a per-reservation shadow document. Readers fetch it,
//! reporters acknowledge what was applied locally and deleters retire it.

mod directory;
mod document;
mod http;

pub use directory::DirectoryShadowReader;
pub use document::{parse_shadow_document, reported_state_payload};
pub use http::HttpShadowClient;

use crate::config::ShadowSource;
use crate::error::Result;
use crate::models::{RemoteState, ReservationId, Version};

/// Fetches the current remote desired state (async)
#[allow(async_fn_in_trait)]
pub trait RemoteStateReader {
    /// Fetch the full document for one reservation
    async fn fetch(&self, id: &ReservationId) -> Result<RemoteState>;
}

/// Acknowledges a synced version back to the remote side (async)
#[allow(async_fn_in_trait)]
pub trait RemoteStateReporter {
    async fn report_synced(&self, id: &ReservationId, version: &Version) -> Result<()>;
}

/// Removes a reservation's remote document (async)
#[allow(async_fn_in_trait)]
pub trait RemoteStateDeleter {
    /// Returns `false` when there was no document to delete
    async fn delete_remote(&self, id: &ReservationId) -> Result<bool>;
}

/// Reader chosen at runtime from [`ShadowSource`]
#[derive(Debug, Clone)]
pub enum ShadowReader {
    Http(HttpShadowClient),
    Directory(DirectoryShadowReader),
}

impl ShadowReader {
    pub fn from_source(source: &ShadowSource) -> Result<Self> {
        Ok(match source {
            ShadowSource::Http(config) => Self::Http(HttpShadowClient::new(config.clone())?),
            ShadowSource::Directory(root) => Self::Directory(DirectoryShadowReader::new(root)),
        })
    }

    /// The HTTP client, when reading over HTTP
    pub const fn http(&self) -> Option<&HttpShadowClient> {
        match self {
            Self::Http(client) => Some(client),
            Self::Directory(_) => None,
        }
    }
}

impl RemoteStateReader for ShadowReader {
    async fn fetch(&self, id: &ReservationId) -> Result<RemoteState> {
        match self {
            Self::Http(client) => client.fetch(id).await,
            Self::Directory(reader) => reader.fetch(id).await,
        }
    }
}

impl RemoteStateDeleter for ShadowReader {
    async fn delete_remote(&self, id: &ReservationId) -> Result<bool> {
        match self {
            Self::Http(client) => client.delete_remote(id).await,
            Self::Directory(reader) => reader.delete_remote(id).await,
        }
    }
}
