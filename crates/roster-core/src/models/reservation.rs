//! Reservation model

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use super::{MemberRecord, StoredMember};
use crate::error::{Error, Result};

/// Composite key of a reservation: the listing it belongs to plus its code.
///
/// The reservation code doubles as the remote shadow name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId {
    listing_id: String,
    reservation_code: String,
}

impl ReservationId {
    /// Build an id, rejecting blank parts
    pub fn new(listing_id: impl Into<String>, reservation_code: impl Into<String>) -> Result<Self> {
        let listing_id = listing_id.into().trim().to_string();
        let reservation_code = reservation_code.into().trim().to_string();

        if listing_id.is_empty() {
            return Err(Error::InvalidState("listing id must not be empty".into()));
        }
        if reservation_code.is_empty() {
            return Err(Error::InvalidState(
                "reservation code must not be empty".into(),
            ));
        }

        Ok(Self {
            listing_id,
            reservation_code,
        })
    }

    pub fn listing_id(&self) -> &str {
        &self.listing_id
    }

    pub fn reservation_code(&self) -> &str {
        &self.reservation_code
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.listing_id, self.reservation_code)
    }
}

/// Opaque revision token of a remote document.
///
/// Only equality is meaningful. Numeric and string tokens normalize to the
/// same text, so `7` and `"7"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawVersion {
            Number(serde_json::Number),
            Text(String),
        }

        Ok(match RawVersion::deserialize(deserializer)? {
            RawVersion::Number(number) => Self::new(number.to_string()),
            RawVersion::Text(text) => Self::new(text),
        })
    }
}

/// The authoritative document fetched for one reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteState {
    pub version: Version,
    /// Reservation-level attributes, never interpreted here
    pub reservation: Value,
    pub members: Vec<MemberRecord>,
}

/// The last reconciled copy of a reservation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalState {
    pub version: Version,
    pub reservation: Value,
    /// Ordered by position
    pub members: Vec<StoredMember>,
    /// Unix ms of the last successful save
    pub synced_at: i64,
}

impl LocalState {
    /// Member records in stored order
    pub fn member_records(&self) -> Vec<MemberRecord> {
        self.members
            .iter()
            .map(|member| member.record.clone())
            .collect()
    }
}
