//! Reconciliation engine
//!
//! One pass brings the local copy of a reservation up to the remote
//! document: fetch, compare versions, diff members, purge, then save.

use serde::Serialize;
use uuid::Uuid;

use crate::db::{ReservationStore, SaveRequest};
use crate::diff::{self, DiffStrategy};
use crate::error::Result;
use crate::models::{ReservationId, Version};
use crate::remote::RemoteStateReader;

/// What a successful pass did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Local version already matched; nothing was written
    AlreadyCurrent { version: Version },
    Synced {
        new_version: Version,
        changed_members: usize,
        deleted_members: usize,
    },
}

/// Drives reconciliation passes against a reader and a store.
///
/// Holds no mutable state; passes for different reservations may run
/// concurrently. Passes for the same reservation must be serialized by the
/// caller (see [`crate::dispatch::Dispatcher`]).
pub struct ReconciliationEngine<R, S> {
    reader: R,
    store: S,
    strategy: DiffStrategy,
}

impl<R, S> ReconciliationEngine<R, S>
where
    R: RemoteStateReader,
    S: ReservationStore,
{
    pub fn new(reader: R, store: S) -> Self {
        Self {
            reader,
            store,
            strategy: DiffStrategy::default(),
        }
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: DiffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub const fn reader(&self) -> &R {
        &self.reader
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn strategy(&self) -> DiffStrategy {
        self.strategy
    }

    /// Run one pass for `id`.
    ///
    /// A failed pass leaves the stored version untouched, so running it
    /// again starts over from the fetch.
    pub async fn reconcile(&self, id: &ReservationId) -> Result<ReconcileOutcome> {
        let pass_id = Uuid::now_v7();
        tracing::debug!(%pass_id, strategy = %self.strategy, "Reconciling {id}");

        match self.run_pass(pass_id, id).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                tracing::warn!(
                    %pass_id,
                    kind = ?error.kind(),
                    retryable = error.is_retryable(),
                    "Reconciliation of {id} failed: {error}"
                );
                Err(error)
            }
        }
    }

    async fn run_pass(&self, pass_id: Uuid, id: &ReservationId) -> Result<ReconcileOutcome> {
        let remote = self.reader.fetch(id).await?;
        let local = self.store.get(id).await?;

        if let Some(local) = &local {
            if local.version == remote.version {
                tracing::debug!(%pass_id, "{id} already at version {}", remote.version);
                return Ok(ReconcileOutcome::AlreadyCurrent {
                    version: remote.version,
                });
            }
        }

        if self.strategy == DiffStrategy::Keyed {
            diff::validate_member_keys(&remote.members)?;
        }

        let plan = diff::diff(
            &remote.members,
            local.as_ref().map(|local| local.members.as_slice()),
            self.strategy,
        );
        tracing::debug!(
            %pass_id,
            persist = plan.to_persist.len(),
            delete = plan.to_delete.len(),
            unchanged = plan.unchanged,
            "Planned member merge for {id}"
        );

        if !plan.to_delete.is_empty() {
            self.store.delete_members(id, &plan.to_delete).await?;
        }

        let changed_members = plan.to_persist.len();
        let deleted_members = plan.to_delete.len();
        self.store
            .save(
                id,
                SaveRequest {
                    reservation: remote.reservation,
                    members: plan.to_persist,
                    version: remote.version.clone(),
                },
            )
            .await?;

        tracing::info!(
            %pass_id,
            changed_members,
            deleted_members,
            "Synced {id} to version {}",
            remote.version
        );
        Ok(ReconcileOutcome::Synced {
            new_version: remote.version,
            changed_members,
            deleted_members,
        })
    }
}
