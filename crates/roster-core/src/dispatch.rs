//! Operation dispatch
//!
//! Maps a trigger event (`{"operation": "...", "shadowName": "..."}`) onto the
//! engine or the store, serializing work per reservation.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use crate::db::ReservationStore;
use crate::error::{Error, ErrorKind, Result};
use crate::models::{LocalState, RemoteState, ReservationId, Version};
use crate::reconcile::{ReconcileOutcome, ReconciliationEngine};
use crate::remote::{RemoteStateDeleter, RemoteStateReader, RemoteStateReporter};

/// The operations a trigger may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum OperationKind {
    Reconcile,
    Fetch,
    Delete,
    Show,
    Purge,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reconcile => "reconcile",
            Self::Fetch => "fetch",
            Self::Delete => "delete",
            Self::Show => "show",
            Self::Purge => "purge",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    /// Exact, case-sensitive match
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reconcile" => Ok(Self::Reconcile),
            "fetch" => Ok(Self::Fetch),
            "delete" => Ok(Self::Delete),
            "show" => Ok(Self::Show),
            "purge" => Ok(Self::Purge),
            other => Err(Error::InvalidState(format!(
                "unknown operation '{other}' (expected reconcile, fetch, delete, show or purge)"
            ))),
        }
    }
}

impl TryFrom<String> for OperationKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// A trigger event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub operation: OperationKind,
    /// Reservation code; doubles as the shadow name
    pub shadow_name: String,
}

impl OperationRequest {
    pub fn new(operation: OperationKind, shadow_name: impl Into<String>) -> Self {
        Self {
            operation,
            shadow_name: shadow_name.into(),
        }
    }

    pub fn from_json(event: &str) -> Result<Self> {
        serde_json::from_str(event)
            .map_err(|error| Error::InvalidState(format!("invalid operation request: {error}")))
    }
}

/// Caller-facing result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconciliationResult {
    NoOpAlreadyCurrent {
        version: Version,
    },
    Synced {
        new_version: Version,
        changed_member_count: usize,
        deleted_member_count: usize,
    },
    Failed {
        reason: String,
        kind: ErrorKind,
        retryable: bool,
    },
}

impl ReconciliationResult {
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl From<Result<ReconcileOutcome>> for ReconciliationResult {
    fn from(result: Result<ReconcileOutcome>) -> Self {
        match result {
            Ok(ReconcileOutcome::AlreadyCurrent { version }) => Self::NoOpAlreadyCurrent { version },
            Ok(ReconcileOutcome::Synced {
                new_version,
                changed_members,
                deleted_members,
            }) => Self::Synced {
                new_version,
                changed_member_count: changed_members,
                deleted_member_count: deleted_members,
            },
            Err(error) => Self::Failed {
                reason: error.to_string(),
                kind: error.kind(),
                retryable: error.is_retryable(),
            },
        }
    }
}

/// Result of a dispatched operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationResult {
    Reconcile {
        reservation: ReservationId,
        result: ReconciliationResult,
        /// `None` when acknowledgement is disabled or nothing was synced
        #[serde(skip_serializing_if = "Option::is_none")]
        acknowledged: Option<bool>,
    },
    Fetch {
        reservation: ReservationId,
        remote: RemoteState,
    },
    Delete {
        reservation: ReservationId,
        deleted: bool,
    },
    Show {
        reservation: ReservationId,
        local: Option<LocalState>,
    },
    /// Remote shadow and local copy both removed
    Purge {
        reservation: ReservationId,
        remote_deleted: bool,
        local_deleted: bool,
    },
}

/// Placeholder for dispatchers that never write to the remote side
#[derive(Debug, Clone, Copy)]
pub enum NoRemoteWrites {}

impl RemoteStateReporter for NoRemoteWrites {
    async fn report_synced(&self, _id: &ReservationId, _version: &Version) -> Result<()> {
        match *self {}
    }
}

impl RemoteStateDeleter for NoRemoteWrites {
    async fn delete_remote(&self, _id: &ReservationId) -> Result<bool> {
        match *self {}
    }
}

type LockMap = std::sync::Mutex<HashMap<ReservationId, Arc<AsyncMutex<()>>>>;

/// Routes operation requests for one listing
pub struct Dispatcher<R, S, P = NoRemoteWrites, D = NoRemoteWrites> {
    engine: ReconciliationEngine<R, S>,
    listing_id: String,
    reporter: Option<P>,
    deleter: Option<D>,
    locks: LockMap,
}

impl<R, S, P, D> Dispatcher<R, S, P, D>
where
    R: RemoteStateReader,
    S: ReservationStore,
    P: RemoteStateReporter,
    D: RemoteStateDeleter,
{
    pub fn new(engine: ReconciliationEngine<R, S>, listing_id: impl Into<String>) -> Self {
        Self {
            engine,
            listing_id: listing_id.into(),
            reporter: None,
            deleter: None,
            locks: LockMap::default(),
        }
    }

    /// Acknowledge synced versions through `reporter`
    #[must_use]
    pub fn with_reporter(mut self, reporter: P) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Allow [`OperationKind::Purge`] to delete remote documents through `deleter`
    #[must_use]
    pub fn with_deleter(mut self, deleter: D) -> Self {
        self.deleter = Some(deleter);
        self
    }

    pub const fn engine(&self) -> &ReconciliationEngine<R, S> {
        &self.engine
    }

    pub fn reservation_id(&self, code: &str) -> Result<ReservationId> {
        ReservationId::new(self.listing_id.as_str(), code)
    }

    /// Parse a JSON event and dispatch it
    pub async fn dispatch_json(&self, event: &str) -> Result<OperationResult> {
        let request = OperationRequest::from_json(event)?;
        self.dispatch(&request).await
    }

    /// Run one operation.
    ///
    /// Reconcile failures are reported inside [`ReconciliationResult::Failed`];
    /// the other operations return their errors.
    pub async fn dispatch(&self, request: &OperationRequest) -> Result<OperationResult> {
        let reservation = self.reservation_id(&request.shadow_name)?;
        tracing::debug!("Dispatching {} for {reservation}", request.operation);

        match request.operation {
            OperationKind::Reconcile => {
                let (result, acknowledged) = self.reconcile(&reservation).await;
                Ok(OperationResult::Reconcile {
                    reservation,
                    result,
                    acknowledged,
                })
            }
            OperationKind::Fetch => {
                let remote = self.engine.reader().fetch(&reservation).await?;
                Ok(OperationResult::Fetch {
                    reservation,
                    remote,
                })
            }
            OperationKind::Delete => {
                let lock = self.lock_for(&reservation);
                let deleted = {
                    let _guard = lock.lock().await;
                    self.engine.store().delete_reservation(&reservation).await
                };
                drop(lock);
                self.release_idle_locks();

                let deleted = deleted?;
                if deleted {
                    tracing::info!("Deleted {reservation}");
                }
                Ok(OperationResult::Delete {
                    reservation,
                    deleted,
                })
            }
            OperationKind::Show => {
                let local = self.engine.store().get(&reservation).await?;
                Ok(OperationResult::Show { reservation, local })
            }
            OperationKind::Purge => self.purge(reservation).await,
        }
    }

    /// Remote first; a failed remote delete leaves the local copy in place.
    async fn purge(&self, reservation: ReservationId) -> Result<OperationResult> {
        let deleter = self.deleter.as_ref().ok_or_else(|| {
            Error::InvalidState("purge needs a remote deleter; none is configured".into())
        })?;

        let lock = self.lock_for(&reservation);
        let deleted = async {
            let _guard = lock.lock().await;
            let remote_deleted = deleter.delete_remote(&reservation).await?;
            let local_deleted = self.engine.store().delete_reservation(&reservation).await?;
            Ok::<_, Error>((remote_deleted, local_deleted))
        }
        .await;
        drop(lock);
        self.release_idle_locks();

        let (remote_deleted, local_deleted) = deleted?;
        tracing::info!(remote_deleted, local_deleted, "Purged {reservation}");
        Ok(OperationResult::Purge {
            reservation,
            remote_deleted,
            local_deleted,
        })
    }

    async fn reconcile(&self, id: &ReservationId) -> (ReconciliationResult, Option<bool>) {
        let lock = self.lock_for(id);
        let (outcome, acknowledged) = {
            let _guard = lock.lock().await;
            let outcome = self.engine.reconcile(id).await;
            let acknowledged = match (&outcome, &self.reporter) {
                (Ok(ReconcileOutcome::Synced { new_version, .. }), Some(reporter)) => {
                    Some(Self::acknowledge(reporter, id, new_version).await)
                }
                _ => None,
            };
            (outcome, acknowledged)
        };
        drop(lock);
        self.release_idle_locks();

        (ReconciliationResult::from(outcome), acknowledged)
    }

    async fn acknowledge(reporter: &P, id: &ReservationId, version: &Version) -> bool {
        match reporter.report_synced(id, version).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("Failed to acknowledge version {version} for {id}: {error}");
                false
            }
        }
    }

    fn lock_for(&self, id: &ReservationId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    fn release_idle_locks(&self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use super::*;
    use crate::reconcile::tests::{member, remote, RecordingStore, StubReader};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingReporter {
        reported: Mutex<Vec<(String, Version)>>,
        fail: bool,
    }

    impl RemoteStateReporter for RecordingReporter {
        async fn report_synced(&self, id: &ReservationId, version: &Version) -> Result<()> {
            if self.fail {
                return Err(Error::RemoteUnavailable("report endpoint down".into()));
            }
            self.reported
                .lock()
                .unwrap()
                .push((id.reservation_code().to_string(), version.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDeleter {
        deleted: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RemoteStateDeleter for RecordingDeleter {
        async fn delete_remote(&self, id: &ReservationId) -> Result<bool> {
            if self.fail {
                return Err(Error::RemoteUnavailable("shadow service down".into()));
            }
            self.deleted
                .lock()
                .unwrap()
                .push(id.reservation_code().to_string());
            Ok(true)
        }
    }

    async fn dispatcher() -> Dispatcher<StubReader, RecordingStore> {
        let engine = ReconciliationEngine::new(StubReader::default(), RecordingStore::new().await);
        Dispatcher::new(engine, "L-1")
    }

    async fn reporting_dispatcher(
        reporter: RecordingReporter,
    ) -> Dispatcher<StubReader, RecordingStore, RecordingReporter> {
        let engine = ReconciliationEngine::new(StubReader::default(), RecordingStore::new().await);
        Dispatcher::new(engine, "L-1").with_reporter(reporter)
    }

    async fn purging_dispatcher(
        deleter: RecordingDeleter,
    ) -> Dispatcher<StubReader, RecordingStore, NoRemoteWrites, RecordingDeleter> {
        let engine = ReconciliationEngine::new(StubReader::default(), RecordingStore::new().await);
        Dispatcher::new(engine, "L-1").with_deleter(deleter)
    }

    fn reconcile_request(code: &str) -> OperationRequest {
        OperationRequest::new(OperationKind::Reconcile, code)
    }

    fn reconcile_result(result: OperationResult) -> (ReconciliationResult, Option<bool>) {
        match result {
            OperationResult::Reconcile {
                result,
                acknowledged,
                ..
            } => (result, acknowledged),
            other => panic!("expected reconcile result, got {other:?}"),
        }
    }

    #[test]
    fn operation_kind_parses_exact_names_only() {
        assert_eq!(
            "reconcile".parse::<OperationKind>().unwrap(),
            OperationKind::Reconcile
        );
        assert_eq!("show".parse::<OperationKind>().unwrap(), OperationKind::Show);
        assert_eq!("purge".parse::<OperationKind>().unwrap(), OperationKind::Purge);

        for rejected in ["Reconcile", "RECONCILE", " reconcile", "reconcile_all", "sync", ""] {
            let error = rejected.parse::<OperationKind>().unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidState, "{rejected:?}");
        }
    }

    #[test]
    fn request_is_read_from_camel_case_json() {
        let request =
            OperationRequest::from_json(r#"{"operation":"fetch","shadowName":"HMABC123"}"#)
                .unwrap();
        assert_eq!(request, OperationRequest::new(OperationKind::Fetch, "HMABC123"));

        assert!(OperationRequest::from_json(r#"{"operation":"Fetch","shadowName":"X"}"#).is_err());
        assert!(OperationRequest::from_json(r#"{"operation":"fetch"}"#).is_err());
    }

    #[test]
    fn reconciliation_result_serializes_with_status_tag() {
        let synced = ReconciliationResult::from(Ok(ReconcileOutcome::Synced {
            new_version: Version::from(2),
            changed_members: 1,
            deleted_members: 3,
        }));
        assert_eq!(
            serde_json::to_value(&synced).unwrap(),
            json!({
                "status": "synced",
                "new_version": "2",
                "changed_member_count": 1,
                "deleted_member_count": 3
            })
        );

        let failed =
            ReconciliationResult::from(Err(Error::StoreConflict("version 2 differs".into())));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "status": "failed",
                "reason": "Reservation store conflict: version 2 differs",
                "kind": "store_conflict",
                "retryable": false
            })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reconcile_then_rerun_is_noop() {
        let dispatcher = dispatcher().await;
        dispatcher
            .engine()
            .reader()
            .publish("HMABC", remote(3, vec![member(None, 1, "Aiko")]));

        let (first, acknowledged) =
            reconcile_result(dispatcher.dispatch(&reconcile_request("HMABC")).await.unwrap());
        assert_eq!(
            first,
            ReconciliationResult::Synced {
                new_version: Version::from(3),
                changed_member_count: 1,
                deleted_member_count: 0,
            }
        );
        assert_eq!(acknowledged, None);

        let (second, _) =
            reconcile_result(dispatcher.dispatch(&reconcile_request("HMABC")).await.unwrap());
        assert_eq!(
            second,
            ReconciliationResult::NoOpAlreadyCurrent {
                version: Version::from(3)
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reconcile_failure_is_reported_not_raised() {
        let dispatcher = dispatcher().await;

        let (result, _) =
            reconcile_result(dispatcher.dispatch(&reconcile_request("HMNONE")).await.unwrap());

        let ReconciliationResult::Failed {
            kind, retryable, ..
        } = result
        else {
            panic!("expected failure, got {result:?}");
        };
        assert_eq!(kind, ErrorKind::RemoteUnavailable);
        assert!(retryable);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn same_reservation_dispatches_run_one_after_another() {
        let dispatcher = dispatcher().await;
        dispatcher
            .engine()
            .reader()
            .publish("HMABC", remote(1, vec![member(None, 1, "Aiko")]));

        let request = reconcile_request("HMABC");
        let (first, second) = tokio::join!(
            dispatcher.dispatch(&request),
            dispatcher.dispatch(&request)
        );
        let mut statuses = vec![
            reconcile_result(first.unwrap()).0,
            reconcile_result(second.unwrap()).0,
        ];
        statuses.sort_by_key(|result| matches!(result, ReconciliationResult::Synced { .. }));

        assert!(matches!(
            statuses[0],
            ReconciliationResult::NoOpAlreadyCurrent { .. }
        ));
        assert!(matches!(statuses[1], ReconciliationResult::Synced { .. }));
        assert_eq!(dispatcher.engine().store().writes(), vec!["save"]);
        assert!(dispatcher.locks.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn synced_version_is_acknowledged() {
        let dispatcher = reporting_dispatcher(RecordingReporter::default()).await;
        dispatcher
            .engine()
            .reader()
            .publish("HMABC", remote(5, Vec::new()));

        let (_, acknowledged) =
            reconcile_result(dispatcher.dispatch(&reconcile_request("HMABC")).await.unwrap());
        assert_eq!(acknowledged, Some(true));

        // Nothing new to acknowledge on a no-op pass
        let (_, acknowledged) =
            reconcile_result(dispatcher.dispatch(&reconcile_request("HMABC")).await.unwrap());
        assert_eq!(acknowledged, None);

        let reporter = dispatcher.reporter.as_ref().unwrap();
        assert_eq!(
            *reporter.reported.lock().unwrap(),
            vec![("HMABC".to_string(), Version::from(5))]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_acknowledgement_keeps_the_sync() {
        let dispatcher = reporting_dispatcher(RecordingReporter {
            fail: true,
            ..RecordingReporter::default()
        })
        .await;
        dispatcher
            .engine()
            .reader()
            .publish("HMABC", remote(5, Vec::new()));

        let (result, acknowledged) =
            reconcile_result(dispatcher.dispatch(&reconcile_request("HMABC")).await.unwrap());

        assert!(matches!(result, ReconciliationResult::Synced { .. }));
        assert_eq!(acknowledged, Some(false));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_reads_remote_without_touching_store() {
        let dispatcher = dispatcher().await;
        let document = remote(8, vec![member(Some("m-1"), 2, "Ken")]);
        dispatcher.engine().reader().publish("HMABC", document.clone());

        let result = dispatcher
            .dispatch_json(r#"{"operation":"fetch","shadowName":"HMABC"}"#)
            .await
            .unwrap();

        let OperationResult::Fetch { remote, .. } = result else {
            panic!("expected fetch result");
        };
        assert_eq!(remote, document);
        assert!(dispatcher.engine().store().calls.lock().unwrap().is_empty());
        assert_eq!(
            dispatcher.engine().reader().fetches.load(Ordering::SeqCst),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_and_show_use_the_store() {
        let dispatcher = dispatcher().await;
        dispatcher
            .engine()
            .reader()
            .publish("HMABC", remote(2, vec![member(None, 1, "Aiko")]));
        dispatcher.dispatch(&reconcile_request("HMABC")).await.unwrap();

        let shown = dispatcher
            .dispatch(&OperationRequest::new(OperationKind::Show, "HMABC"))
            .await
            .unwrap();
        let OperationResult::Show { local: Some(local), .. } = shown else {
            panic!("expected stored reservation");
        };
        assert_eq!(local.members.len(), 1);

        let delete = OperationRequest::new(OperationKind::Delete, "HMABC");
        let OperationResult::Delete { deleted, .. } = dispatcher.dispatch(&delete).await.unwrap()
        else {
            panic!("expected delete result");
        };
        assert!(deleted);

        let OperationResult::Delete { deleted, .. } = dispatcher.dispatch(&delete).await.unwrap()
        else {
            panic!("expected delete result");
        };
        assert!(!deleted);

        let shown = dispatcher
            .dispatch(&OperationRequest::new(OperationKind::Show, "HMABC"))
            .await
            .unwrap();
        assert!(matches!(shown, OperationResult::Show { local: None, .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blank_shadow_name_is_rejected() {
        let dispatcher = dispatcher().await;
        let error = dispatcher
            .dispatch_json(r#"{"operation":"show","shadowName":"  "}"#)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn purge_deletes_remote_shadow_and_local_copy() {
        let dispatcher = purging_dispatcher(RecordingDeleter::default()).await;
        dispatcher
            .engine()
            .reader()
            .publish("HMABC", remote(2, vec![member(None, 1, "Aiko")]));
        dispatcher.dispatch(&reconcile_request("HMABC")).await.unwrap();

        let result = dispatcher
            .dispatch_json(r#"{"operation":"purge","shadowName":"HMABC"}"#)
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "operation": "purge",
                "reservation": { "listing_id": "L-1", "reservation_code": "HMABC" },
                "remote_deleted": true,
                "local_deleted": true
            })
        );
        let deleter = dispatcher.deleter.as_ref().unwrap();
        assert_eq!(*deleter.deleted.lock().unwrap(), vec!["HMABC".to_string()]);
        assert!(dispatcher
            .engine()
            .store()
            .get(&dispatcher.reservation_id("HMABC").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_remote_delete_keeps_local_copy() {
        let dispatcher = purging_dispatcher(RecordingDeleter {
            fail: true,
            ..RecordingDeleter::default()
        })
        .await;
        dispatcher
            .engine()
            .reader()
            .publish("HMABC", remote(2, vec![member(None, 1, "Aiko")]));
        dispatcher.dispatch(&reconcile_request("HMABC")).await.unwrap();

        let error = dispatcher
            .dispatch(&OperationRequest::new(OperationKind::Purge, "HMABC"))
            .await
            .unwrap_err();

        assert!(error.is_retryable());
        assert_eq!(dispatcher.engine().store().writes(), vec!["save"]);
        assert!(dispatcher.locks.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn purge_without_deleter_is_rejected() {
        let dispatcher = dispatcher().await;
        let error = dispatcher
            .dispatch(&OperationRequest::new(OperationKind::Purge, "HMABC"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::InvalidState);
        assert!(dispatcher.engine().store().calls.lock().unwrap().is_empty());
    }
}
