pub mod common;
pub mod delete;
pub mod dispatch;
pub mod fetch;
pub mod purge;
pub mod reconcile;
pub mod show;
