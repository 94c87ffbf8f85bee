//! Per-account role mode: which profile "view" is active.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use pista_store::{AccountId, ScopedKey, ScopedKeyStore};

/// Storage schema version for the persisted role value.
const ROLE_SCHEMA_VERSION: u32 = 1;

/// The active profile view for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleMode {
	/// Plain member view, available to every account.
	Member,
	/// Event-organizer view, requires server-side approval.
	Organizer,
	/// Brand/venue view, requires server-side approval.
	Brand,
}

impl RoleMode {
	/// The base role every account falls back to.
	pub const BASE: RoleMode = RoleMode::Member;
}

/// Server-supplied predicate: is a role available to an account?
///
/// A persisted role is never trusted without passing this check; a revoked
/// or not-yet-approved role silently coerces to [`RoleMode::BASE`] instead
/// of surfacing a broken view.
pub trait RoleAvailability: Send + Sync {
	/// Returns true if `role` is currently available to `account`.
	fn is_available(&self, account: &AccountId, role: RoleMode) -> bool;
}

impl<F> RoleAvailability for F
where
	F: Fn(&AccountId, RoleMode) -> bool + Send + Sync,
{
	fn is_available(&self, account: &AccountId, role: RoleMode) -> bool {
		self(account, role)
	}
}

/// A single persisted role value plus its in-memory mirror.
pub struct RoleModeStore {
	store: Arc<ScopedKeyStore>,
	current: RoleMode,
}

impl RoleModeStore {
	/// Creates a store starting at the base role.
	pub fn new(store: Arc<ScopedKeyStore>) -> Self {
		Self {
			store,
			current: RoleMode::BASE,
		}
	}

	/// The currently active role.
	pub fn current(&self) -> RoleMode {
		self.current
	}

	/// Resets to the base role without touching storage.
	///
	/// Used on the sign-out edge, where no namespace exists to persist to.
	pub fn reset_in_memory(&mut self) {
		self.current = RoleMode::BASE;
	}

	/// Loads the persisted role for `account`, gated by availability.
	pub fn rehydrate(&mut self, account: &AccountId, availability: &dyn RoleAvailability) {
		let persisted = self
			.store
			.read(&Self::key(account), ROLE_SCHEMA_VERSION)
			.and_then(|record| record.value_as::<RoleMode>());
		self.current = match persisted {
			Some(role) if availability.is_available(account, role) => role,
			Some(role) => {
				tracing::debug!(%account, ?role, "persisted role unavailable, falling back to base");
				RoleMode::BASE
			}
			None => RoleMode::BASE,
		};
	}

	/// Switches to `next` if available, persisting the result.
	///
	/// An unavailable role coerces to base instead of erroring.
	pub fn set_mode(
		&mut self,
		next: RoleMode,
		account: &AccountId,
		availability: &dyn RoleAvailability,
	) {
		self.current = if availability.is_available(account, next) {
			next
		} else {
			tracing::debug!(%account, ?next, "requested role unavailable, staying on base");
			RoleMode::BASE
		};
		self.store
			.write(&Self::key(account), &self.current, ROLE_SCHEMA_VERSION);
	}

	fn key(account: &AccountId) -> ScopedKey {
		ScopedKey::for_account(account.clone(), vec!["role_mode".to_string()])
	}
}
