//! Data models for Roster

mod member;
mod reservation;

pub use member::{MemberIdentity, MemberRecord, StoredMember};
pub use reservation::{LocalState, RemoteState, ReservationId, Version};
