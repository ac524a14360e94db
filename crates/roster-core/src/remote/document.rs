//! Shadow document layout

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::models::{MemberRecord, RemoteState, Version};

#[derive(Debug, Deserialize)]
struct ShadowDocument {
    #[serde(default)]
    version: Option<Version>,
    #[serde(default)]
    state: Option<ShadowState>,
}

#[derive(Debug, Deserialize)]
struct ShadowState {
    #[serde(default)]
    desired: Option<DesiredSection>,
}

#[derive(Debug, Deserialize)]
struct DesiredSection {
    #[serde(default)]
    reservation: Value,
    #[serde(default)]
    members: Option<Value>,
}

/// Parse a raw shadow document into a [`RemoteState`].
pub fn parse_shadow_document(payload: &[u8]) -> Result<RemoteState> {
    let document: ShadowDocument = serde_json::from_slice(payload)?;

    let version = document
        .version
        .filter(|version| !version.is_empty())
        .ok_or_else(|| Error::InvalidState("shadow document has no version".into()))?;

    let desired = document
        .state
        .and_then(|state| state.desired)
        .ok_or_else(|| Error::InvalidState("shadow document has no state.desired".into()))?;

    let members = match desired.members {
        Some(members @ Value::Array(_)) => serde_json::from_value::<Vec<MemberRecord>>(members)
            .map_err(|error| Error::InvalidState(format!("invalid member record: {error}")))?,
        Some(_) => {
            return Err(Error::InvalidState(
                "state.desired.members must be an array".into(),
            ))
        }
        None => {
            return Err(Error::InvalidState(
                "shadow document has no state.desired.members".into(),
            ))
        }
    };

    Ok(RemoteState {
        version,
        reservation: desired.reservation,
        members,
    })
}

/// Body that records `version` as applied under `state.reported`
pub fn reported_state_payload(version: &Version) -> Value {
    json!({
        "state": {
            "reported": {
                "syncedVersion": version.as_str()
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_desired_state() {
        let payload = br#"
        {
          "version": 12,
          "timestamp": 1700000000,
          "state": {
            "desired": {
              "reservation": { "owner": "Tanaka", "checkIn": "2024-05-01" },
              "members": [
                { "memberId": "m-1", "lastUpdateOn": 1, "name": "Aiko" },
                { "memberId": "m-2", "lastUpdateOn": 3 }
              ]
            },
            "reported": { "syncedVersion": "11" }
          }
        }
        "#;

        let state = parse_shadow_document(payload).unwrap();
        assert_eq!(state.version, Version::from(12));
        assert_eq!(state.reservation["owner"], json!("Tanaka"));
        assert_eq!(state.members.len(), 2);
        assert_eq!(state.members[1].key.as_deref(), Some("m-2"));
    }

    #[test]
    fn missing_reservation_becomes_null() {
        let payload = br#"{ "version": "v3", "state": { "desired": { "members": [] } } }"#;
        let state = parse_shadow_document(payload).unwrap();
        assert!(state.reservation.is_null());
        assert!(state.members.is_empty());
        assert_eq!(state.version.as_str(), "v3");
    }

    #[test]
    fn rejects_documents_without_version_or_members() {
        let no_version = br#"{ "state": { "desired": { "members": [] } } }"#;
        let error = parse_shadow_document(no_version).unwrap_err();
        assert!(error.to_string().contains("version"));

        let no_members = br#"{ "version": 1, "state": { "desired": { "reservation": {} } } }"#;
        let error = parse_shadow_document(no_members).unwrap_err();
        assert!(error.to_string().contains("members"));

        let no_desired = br#"{ "version": 1, "state": { "reported": {} } }"#;
        assert!(parse_shadow_document(no_desired).is_err());

        let members_object = br#"{ "version": 1, "state": { "desired": { "members": {} } } }"#;
        assert!(parse_shadow_document(members_object).is_err());
    }

    #[test]
    fn malformed_json_is_invalid_state() {
        let error = parse_shadow_document(b"not json").unwrap_err();
        assert!(matches!(error, Error::InvalidState(_)));
        assert!(!error.is_retryable());
    }

    #[test]
    fn reported_payload_carries_version() {
        assert_eq!(
            reported_state_payload(&Version::from(4)),
            json!({ "state": { "reported": { "syncedVersion": "4" } } })
        );
    }
}
