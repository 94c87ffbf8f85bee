//! Session lifecycle coordination.
//!
//! The [`SessionLifecycleCoordinator`] is the single owner of identity
//! transitions: it purges the outgoing account's draft namespace before the
//! next account may read anything, rehydrates the per-account role mode, and
//! issues one ordered notification to dependent stores instead of letting
//! each of them listen to raw identity events.

pub mod cache;
pub mod coordinator;
pub mod role;

pub use cache::DerivedIdCache;
pub use coordinator::{Phase, SessionError, SessionLifecycleCoordinator, SessionSubscriber};
pub use role::{RoleAvailability, RoleMode, RoleModeStore};
