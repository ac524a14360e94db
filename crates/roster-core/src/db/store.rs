//! libSQL implementation of `ReservationStore`

use std::sync::Arc;

use libsql::Connection;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{Database, ReservationStore, SaveRequest};
use crate::error::{Error, Result};
use crate::models::{LocalState, MemberIdentity, MemberRecord, ReservationId, StoredMember, Version};
use crate::util::unix_millis_now;

/// Reservation store backed by a single libSQL connection.
///
/// Clones share the connection; every call holds it for its whole duration.
#[derive(Clone)]
pub struct LibSqlReservationStore {
    db: Arc<Mutex<Database>>,
}

impl LibSqlReservationStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open (and migrate) the database file at `path`
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path).await?))
    }

    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    async fn load(conn: &Connection, id: &ReservationId) -> Result<Option<LocalState>> {
        let mut rows = conn
            .query(
                "SELECT version, payload, synced_at FROM reservations
                 WHERE listing_id = ?1 AND reservation_code = ?2",
                libsql::params![id.listing_id(), id.reservation_code()],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let version = Version::new(row.get::<String>(0)?);
        let reservation: Value = serde_json::from_str(&row.get::<String>(1)?)?;
        let synced_at = row.get::<i64>(2)?;

        let mut rows = conn
            .query(
                "SELECT member_id, position, record FROM reservation_members
                 WHERE listing_id = ?1 AND reservation_code = ?2
                 ORDER BY position, member_id",
                libsql::params![id.listing_id(), id.reservation_code()],
            )
            .await?;

        let mut members = Vec::new();
        while let Some(row) = rows.next().await? {
            let identity: MemberIdentity = row.get::<String>(0)?.parse()?;
            let position = usize::try_from(row.get::<i64>(1)?)
                .map_err(|_| Error::InvalidState(format!("negative position for {identity}")))?;
            let record: MemberRecord = serde_json::from_str(&row.get::<String>(2)?)?;
            members.push(StoredMember {
                identity,
                position,
                record,
            });
        }

        Ok(Some(LocalState {
            version,
            reservation,
            members,
            synced_at,
        }))
    }

    async fn write(conn: &Connection, id: &ReservationId, request: &SaveRequest) -> Result<()> {
        let mut rows = conn
            .query(
                "SELECT version, payload FROM reservations
                 WHERE listing_id = ?1 AND reservation_code = ?2",
                libsql::params![id.listing_id(), id.reservation_code()],
            )
            .await?;

        let stored = match rows.next().await? {
            Some(row) => Some((Version::new(row.get::<String>(0)?), row.get::<String>(1)?)),
            None => None,
        };
        drop(rows);

        let same_version = match stored {
            Some((version, payload)) if version == request.version => {
                let payload: Value = serde_json::from_str(&payload)?;
                if payload != request.reservation {
                    return Err(Error::StoreConflict(format!(
                        "{id} is already stored at version {version} with different attributes"
                    )));
                }
                true
            }
            _ => false,
        };

        if !same_version {
            conn.execute(
                "INSERT INTO reservations (listing_id, reservation_code, version, payload, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(listing_id, reservation_code) DO UPDATE SET
                     version = excluded.version,
                     payload = excluded.payload,
                     synced_at = excluded.synced_at",
                libsql::params![
                    id.listing_id(),
                    id.reservation_code(),
                    request.version.as_str(),
                    serde_json::to_string(&request.reservation)?,
                    unix_millis_now(),
                ],
            )
            .await?;
        }

        for member in &request.members {
            let position = i64::try_from(member.position)
                .map_err(|_| Error::InvalidState(format!("position {} overflows", member.position)))?;
            conn.execute(
                "INSERT INTO reservation_members
                     (listing_id, reservation_code, member_id, position, last_update_on, record)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(listing_id, reservation_code, member_id) DO UPDATE SET
                     position = excluded.position,
                     last_update_on = excluded.last_update_on,
                     record = excluded.record",
                libsql::params![
                    id.listing_id(),
                    id.reservation_code(),
                    member.identity.to_string(),
                    position,
                    serde_json::to_string(&member.record.last_update_on)?,
                    serde_json::to_string(&member.record)?,
                ],
            )
            .await?;
        }

        Ok(())
    }

    async fn purge(
        conn: &Connection,
        id: &ReservationId,
        identities: &[MemberIdentity],
    ) -> Result<()> {
        for identity in identities {
            conn.execute(
                "DELETE FROM reservation_members
                 WHERE listing_id = ?1 AND reservation_code = ?2 AND member_id = ?3",
                libsql::params![id.listing_id(), id.reservation_code(), identity.to_string()],
            )
            .await?;
        }
        Ok(())
    }
}

async fn finish(conn: &Connection, outcome: Result<()>) -> Result<()> {
    if let Err(e) = outcome {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e);
    }
    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }
    Ok(())
}

impl ReservationStore for LibSqlReservationStore {
    async fn get(&self, id: &ReservationId) -> Result<Option<LocalState>> {
        let db = self.db.lock().await;
        Self::load(db.connection(), id).await
    }

    async fn save(&self, id: &ReservationId, request: SaveRequest) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute("BEGIN TRANSACTION", ()).await?;
        let outcome = Self::write(conn, id, &request).await;
        finish(conn, outcome).await?;

        tracing::debug!(
            "Saved {id} at version {} ({} members written)",
            request.version,
            request.members.len()
        );
        Ok(())
    }

    async fn delete_members(
        &self,
        id: &ReservationId,
        identities: &[MemberIdentity],
    ) -> Result<()> {
        if identities.is_empty() {
            return Ok(());
        }

        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute("BEGIN TRANSACTION", ()).await?;
        let outcome = Self::purge(conn, id, identities).await;
        finish(conn, outcome).await?;

        tracing::debug!("Deleted {} members of {id}", identities.len());
        Ok(())
    }

    async fn delete_reservation(&self, id: &ReservationId) -> Result<bool> {
        let db = self.db.lock().await;
        let removed = db
            .connection()
            .execute(
                "DELETE FROM reservations WHERE listing_id = ?1 AND reservation_code = ?2",
                libsql::params![id.listing_id(), id.reservation_code()],
            )
            .await?;
        Ok(removed > 0)
    }
}
