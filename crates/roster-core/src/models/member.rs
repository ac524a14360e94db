//! Member model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One occupant/guest entry of a reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Stable member key, when the remote side provides one
    #[serde(rename = "memberId", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Per-member change marker
    #[serde(rename = "lastUpdateOn", default, skip_serializing_if = "Value::is_null")]
    pub last_update_on: Value,
    /// Remaining fields, carried verbatim
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl MemberRecord {
    /// Create a record with an empty payload
    pub fn new(key: Option<String>, last_update_on: impl Into<Value>) -> Self {
        Self {
            key,
            last_update_on: last_update_on.into(),
            payload: Map::new(),
        }
    }

    /// Attach an extra payload field
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    /// Key trimmed of whitespace, `None` when absent or blank
    pub fn normalized_key(&self) -> Option<&str> {
        self.key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// How a stored member row is addressed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberIdentity {
    /// Slot in the ordered member list
    Position(usize),
    /// Stable member key
    Key(String),
}

impl fmt::Display for MemberIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(position) => write!(f, "pos:{position}"),
            Self::Key(key) => write!(f, "key:{key}"),
        }
    }
}

impl FromStr for MemberIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(position) = s.strip_prefix("pos:") {
            return position
                .parse()
                .map(Self::Position)
                .map_err(|_| Error::InvalidState(format!("invalid member position: {s}")));
        }
        if let Some(key) = s.strip_prefix("key:") {
            if !key.is_empty() {
                return Ok(Self::Key(key.to_string()));
            }
        }
        Err(Error::InvalidState(format!("invalid member identity: {s}")))
    }
}

impl Serialize for MemberIdentity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A member as held by the local store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMember {
    pub identity: MemberIdentity,
    pub position: usize,
    pub record: MemberRecord,
}
