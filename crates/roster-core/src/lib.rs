//! roster-core - Core library for Roster
//!
//! Reconciles remote reservation shadows (the desired guest list of a
//! reservation) into a local libSQL store. Shared by the CLI and any other
//! trigger that drives reconciliation passes.

pub mod config;
pub mod db;
pub mod diff;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod remote;
mod util;

pub use config::{ConfigError, RosterConfig, ShadowSource};
pub use db::{LibSqlReservationStore, ReservationStore};
pub use diff::DiffStrategy;
pub use dispatch::{Dispatcher, OperationKind, OperationRequest, OperationResult, ReconciliationResult};
pub use error::{Error, ErrorKind, Result};
pub use models::{ReservationId, Version};
pub use reconcile::{ReconcileOutcome, ReconciliationEngine};
pub use remote::{RemoteStateDeleter, RemoteStateReader, RemoteStateReporter, ShadowReader};
