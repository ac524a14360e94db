//! Local reservation store

mod connection;
mod migrations;
mod store;

use serde_json::Value;

use crate::diff::PlannedMember;
use crate::error::Result;
use crate::models::{LocalState, MemberIdentity, ReservationId, Version};

pub use connection::Database;
pub use store::LibSqlReservationStore;

/// Everything a successful pass writes for one reservation
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub reservation: Value,
    /// Members to insert or overwrite; members not named keep their rows
    pub members: Vec<PlannedMember>,
    pub version: Version,
}

/// Storage of the last reconciled copy of each reservation (async)
#[allow(async_fn_in_trait)]
pub trait ReservationStore {
    /// Load a reservation with its members ordered by position
    async fn get(&self, id: &ReservationId) -> Result<Option<LocalState>>;

    /// Write reservation attributes, version and members in one transaction
    async fn save(&self, id: &ReservationId, request: SaveRequest) -> Result<()>;

    /// Remove members by identity; unknown identities are ignored
    async fn delete_members(&self, id: &ReservationId, identities: &[MemberIdentity])
        -> Result<()>;

    /// Remove a reservation and all of its members.
    ///
    /// Returns `false` when nothing was stored.
    async fn delete_reservation(&self, id: &ReservationId) -> Result<bool>;
}
