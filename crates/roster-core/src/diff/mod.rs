//! Member diffing
//!
//! Pure comparison of the remote-desired member list against the locally
//! stored one. Produces the members to write and the identities to purge.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{MemberIdentity, MemberRecord, StoredMember};

/// How remote members are correlated with local ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStrategy {
    /// Correlate by list index
    #[default]
    Positional,
    /// Correlate by `memberId`
    Keyed,
}

impl fmt::Display for DiffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positional => f.write_str("positional"),
            Self::Keyed => f.write_str("keyed"),
        }
    }
}

impl FromStr for DiffStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positional" => Ok(Self::Positional),
            "keyed" => Ok(Self::Keyed),
            other => Err(format!(
                "unknown diff strategy '{other}' (expected positional or keyed)"
            )),
        }
    }
}

/// A member that must be written, with the slot it occupies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedMember {
    pub identity: MemberIdentity,
    pub position: usize,
    pub record: MemberRecord,
}

/// Outcome of a member diff
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemberMergePlan {
    /// New or changed members, in remote order
    pub to_persist: Vec<PlannedMember>,
    /// Local members to purge before writing
    pub to_delete: Vec<MemberIdentity>,
    /// Remote members already stored as-is
    pub unchanged: usize,
}

impl MemberMergePlan {
    pub fn is_noop(&self) -> bool {
        self.to_persist.is_empty() && self.to_delete.is_empty()
    }
}

/// Compute the merge plan for `remote` against `local`.
///
/// `local` is `None` or empty for a reservation never synced before.
pub fn diff(
    remote: &[MemberRecord],
    local: Option<&[StoredMember]>,
    strategy: DiffStrategy,
) -> MemberMergePlan {
    let local = local.unwrap_or_default();
    match strategy {
        DiffStrategy::Positional => diff_positional(remote, local),
        DiffStrategy::Keyed => diff_keyed(remote, local),
    }
}

/// Check that every remote member has a distinct non-blank key.
///
/// Required before running the keyed strategy.
pub fn validate_member_keys(remote: &[MemberRecord]) -> Result<()> {
    let mut seen = HashMap::with_capacity(remote.len());
    for (position, member) in remote.iter().enumerate() {
        let Some(key) = member.normalized_key() else {
            return Err(Error::InvalidState(format!(
                "member at position {position} has no memberId"
            )));
        };
        if let Some(first) = seen.insert(key, position) {
            return Err(Error::InvalidState(format!(
                "memberId '{key}' appears at positions {first} and {position}"
            )));
        }
    }
    Ok(())
}

fn diff_positional(remote: &[MemberRecord], local: &[StoredMember]) -> MemberMergePlan {
    if local.is_empty() {
        return replace_all(remote, Vec::new());
    }

    // Index correlation is meaningless once members were removed upstream,
    // or when the rows were written by the keyed strategy.
    let keyed_rows = local
        .iter()
        .any(|member| !matches!(member.identity, MemberIdentity::Position(_)));
    if remote.len() < local.len() || keyed_rows {
        let to_delete = local
            .iter()
            .map(|member| member.identity.clone())
            .collect();
        return replace_all(remote, to_delete);
    }

    let mut plan = MemberMergePlan::default();
    for (position, record) in remote.iter().enumerate() {
        let changed = local
            .get(position)
            .is_none_or(|stored| !same_marker(&stored.record.last_update_on, &record.last_update_on));

        if changed {
            plan.to_persist.push(PlannedMember {
                identity: MemberIdentity::Position(position),
                position,
                record: record.clone(),
            });
        } else {
            plan.unchanged += 1;
        }
    }
    plan
}

/// `lastUpdateOn` equality where a number and its text form match (`1` == `"1"`)
fn same_marker(stored: &Value, remote: &Value) -> bool {
    match (stored, remote) {
        (Value::Number(number), Value::String(text)) | (Value::String(text), Value::Number(number)) => {
            text.trim().parse::<f64>().ok() == number.as_f64()
        }
        _ => stored == remote,
    }
}

fn replace_all(remote: &[MemberRecord], to_delete: Vec<MemberIdentity>) -> MemberMergePlan {
    MemberMergePlan {
        to_persist: remote
            .iter()
            .enumerate()
            .map(|(position, record)| PlannedMember {
                identity: MemberIdentity::Position(position),
                position,
                record: record.clone(),
            })
            .collect(),
        to_delete,
        unchanged: 0,
    }
}

fn diff_keyed(remote: &[MemberRecord], local: &[StoredMember]) -> MemberMergePlan {
    let local_by_key: HashMap<&str, &StoredMember> = local
        .iter()
        .filter_map(|member| match &member.identity {
            MemberIdentity::Key(key) => Some((key.as_str(), member)),
            MemberIdentity::Position(_) => None,
        })
        .collect();

    let mut plan = MemberMergePlan::default();
    let mut kept = HashSet::with_capacity(remote.len());

    for (position, record) in remote.iter().enumerate() {
        let Some(key) = record.normalized_key() else {
            continue;
        };
        kept.insert(key);

        let changed = local_by_key.get(key).is_none_or(|stored| {
            stored.position != position
                || !same_marker(&stored.record.last_update_on, &record.last_update_on)
        });

        if changed {
            plan.to_persist.push(PlannedMember {
                identity: MemberIdentity::Key(key.to_string()),
                position,
                record: record.clone(),
            });
        } else {
            plan.unchanged += 1;
        }
    }

    // Anything stored that no remote key claims, including rows written by
    // the positional strategy, goes.
    plan.to_delete = local
        .iter()
        .filter(|member| match &member.identity {
            MemberIdentity::Key(key) => !kept.contains(key.as_str()),
            MemberIdentity::Position(_) => true,
        })
        .map(|member| member.identity.clone())
        .collect();

    plan
}
