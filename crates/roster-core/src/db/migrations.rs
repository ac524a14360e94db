//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }

    Ok(())
}

async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: reservations and their members
async fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        "CREATE TABLE IF NOT EXISTS reservations (
            listing_id TEXT NOT NULL,
            reservation_code TEXT NOT NULL,
            version TEXT NOT NULL,
            payload TEXT NOT NULL,
            synced_at INTEGER NOT NULL,
            PRIMARY KEY (listing_id, reservation_code)
        )",
        "CREATE TABLE IF NOT EXISTS reservation_members (
            listing_id TEXT NOT NULL,
            reservation_code TEXT NOT NULL,
            member_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            last_update_on TEXT,
            record TEXT NOT NULL,
            PRIMARY KEY (listing_id, reservation_code, member_id),
            FOREIGN KEY (listing_id, reservation_code)
                REFERENCES reservations(listing_id, reservation_code) ON DELETE CASCADE
        )",
        "CREATE INDEX IF NOT EXISTS idx_reservation_members_position
            ON reservation_members(listing_id, reservation_code, position)",
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
