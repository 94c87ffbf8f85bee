//! The session lifecycle coordinator.

use std::sync::Arc;

use thiserror::Error;

use pista_store::{AccountId, PurgeError, ScopedKeyStore};

use crate::role::{RoleAvailability, RoleMode, RoleModeStore};

/// Errors from a session transition.
#[derive(Debug, Error)]
pub enum SessionError {
	/// The outgoing account's namespace could not be purged. Cross-account
	/// draft leakage is a privacy invariant, so sign-in stays blocked until
	/// a retry succeeds.
	#[error("namespace purge failed, sign-in blocked until it succeeds: {0}")]
	PurgeFailed(#[from] PurgeError),
}

/// Where the session currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
	/// No account context; scoped writes land in the anonymous namespace.
	Anonymous,
	/// Credentials are being exchanged; still no account context.
	Authenticating,
	/// An account is active and its namespace is readable.
	Authenticated(AccountId),
	/// Sign-out purge failed; the previous namespace may still hold drafts
	/// and no new account may enter until a retry succeeds.
	PurgeBlocked(AccountId),
}

/// A store that follows the coordinator's ordered transitions.
///
/// Dependent stores subscribe here instead of each listening to raw identity
/// events, so "purge, then rehydrate, then notify" happens in one place and
/// in one order.
pub trait SessionSubscriber: Send {
	/// The previous session is gone; drop any per-account state.
	fn on_session_cleared(&mut self);

	/// A new account's namespace is purged, rehydrated, and readable.
	fn on_session_ready(&mut self, account: &AccountId);
}

/// Owns identity transitions and their side effects.
///
/// An account switch is always sign-out followed by sign-in, never a direct
/// edge: the purge of the outgoing namespace must complete before the next
/// account's reads are permitted, and the phase machine makes the in-between
/// state unrepresentable.
pub struct SessionLifecycleCoordinator {
	store: Arc<ScopedKeyStore>,
	roles: RoleModeStore,
	availability: Arc<dyn RoleAvailability>,
	subscribers: Vec<Box<dyn SessionSubscriber>>,
	phase: Phase,
}

impl SessionLifecycleCoordinator {
	/// Creates a coordinator in the anonymous phase.
	pub fn new(store: Arc<ScopedKeyStore>, availability: Arc<dyn RoleAvailability>) -> Self {
		Self {
			roles: RoleModeStore::new(store.clone()),
			store,
			availability,
			subscribers: Vec::new(),
			phase: Phase::Anonymous,
		}
	}

	/// Registers a store to be notified of ordered transitions.
	pub fn subscribe(&mut self, subscriber: Box<dyn SessionSubscriber>) {
		self.subscribers.push(subscriber);
	}

	/// The current phase.
	pub fn phase(&self) -> &Phase {
		&self.phase
	}

	/// The active account, if any.
	pub fn current_account(&self) -> Option<&AccountId> {
		match &self.phase {
			Phase::Authenticated(account) => Some(account),
			_ => None,
		}
	}

	/// The active role mode.
	pub fn role_mode(&self) -> RoleMode {
		self.roles.current()
	}

	/// Switches the active role, persisting per account.
	///
	/// Without an account context this is a logged no-op: there is no
	/// namespace to persist to.
	pub fn set_role_mode(&mut self, next: RoleMode) {
		let Phase::Authenticated(account) = self.phase.clone() else {
			tracing::warn!(?next, "role switch ignored outside an active session");
			return;
		};
		self.roles.set_mode(next, &account, self.availability.as_ref());
	}

	/// Marks the start of a credential exchange.
	pub fn begin_authentication(&mut self) {
		if self.phase == Phase::Anonymous {
			self.phase = Phase::Authenticating;
		}
	}

	/// Completes sign-in for `account`.
	///
	/// Signing in over an existing session is an account switch and runs the
	/// full sign-out first. Pre-login anonymous drafts are purged on the way
	/// in; they are intentionally ephemeral.
	pub fn sign_in(&mut self, account: AccountId) -> Result<(), SessionError> {
		match self.phase.clone() {
			Phase::Authenticated(_) => self.sign_out()?,
			Phase::PurgeBlocked(previous) => {
				self.store.purge_namespace(&previous)?;
				self.phase = Phase::Anonymous;
			}
			Phase::Anonymous | Phase::Authenticating => {}
		}

		if let Err(err) = self.store.purge_anonymous() {
			// Anonymous keys can never alias an account namespace, so a
			// failed hygiene purge does not block the sign-in.
			tracing::warn!(%err, "anonymous draft purge failed");
		}

		self.roles.rehydrate(&account, self.availability.as_ref());
		self.phase = Phase::Authenticated(account.clone());
		for subscriber in &mut self.subscribers {
			subscriber.on_session_ready(&account);
		}
		Ok(())
	}

	/// Signs the current account out.
	///
	/// The outgoing namespace purge must succeed before the phase returns to
	/// anonymous; on failure the coordinator parks in
	/// [`Phase::PurgeBlocked`] and refuses new sessions until
	/// [`Self::retry_purge`] (or a later sign-in/sign-out) succeeds.
	pub fn sign_out(&mut self) -> Result<(), SessionError> {
		match self.phase.clone() {
			Phase::Authenticated(account) => {
				let purged = self.store.purge_namespace(&account);
				self.roles.reset_in_memory();
				for subscriber in &mut self.subscribers {
					subscriber.on_session_cleared();
				}
				match purged {
					Ok(()) => {
						self.phase = Phase::Anonymous;
						Ok(())
					}
					Err(err) => {
						self.phase = Phase::PurgeBlocked(account);
						Err(err.into())
					}
				}
			}
			Phase::PurgeBlocked(_) => self.retry_purge(),
			Phase::Authenticating => {
				self.phase = Phase::Anonymous;
				Ok(())
			}
			Phase::Anonymous => Ok(()),
		}
	}

	/// Switches accounts: a full sign-out of the current account strictly
	/// ordered before the sign-in of the next.
	pub fn switch_account(&mut self, next: AccountId) -> Result<(), SessionError> {
		self.sign_out()?;
		self.sign_in(next)
	}

	/// Retries a failed sign-out purge.
	pub fn retry_purge(&mut self) -> Result<(), SessionError> {
		if let Phase::PurgeBlocked(previous) = self.phase.clone() {
			self.store.purge_namespace(&previous)?;
			self.phase = Phase::Anonymous;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pista_store::{MemoryBackend, ScopedKey, draft_segments};
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	fn any_role(_: &AccountId, _: RoleMode) -> bool {
		true
	}

	fn setup() -> (SessionLifecycleCoordinator, Arc<ScopedKeyStore>, Arc<MemoryBackend>) {
		let backend = Arc::new(MemoryBackend::new());
		let store = Arc::new(ScopedKeyStore::new(backend.clone()));
		let coordinator = SessionLifecycleCoordinator::new(store.clone(), Arc::new(any_role));
		(coordinator, store, backend)
	}

	fn draft_key(account: &str) -> ScopedKey {
		ScopedKey::for_account(AccountId::new(account), draft_segments("event", Some("e1")))
	}

	#[test]
	fn sign_out_purges_the_namespace() {
		let (mut coordinator, store, _) = setup();
		coordinator.sign_in(AccountId::new("u1")).unwrap();
		store.write(&draft_key("u1"), &json!({"name": "x"}), 1);

		coordinator.sign_out().unwrap();
		assert_eq!(coordinator.phase(), &Phase::Anonymous);
		assert!(store.read(&draft_key("u1"), 1).is_none());
	}

	#[test]
	fn sign_in_purges_pre_login_drafts() {
		let (mut coordinator, store, _) = setup();
		let anon = ScopedKey::anonymous(draft_segments("event", None));
		store.write(&anon, &json!({"name": "pre-login"}), 1);

		coordinator.begin_authentication();
		assert_eq!(coordinator.phase(), &Phase::Authenticating);
		coordinator.sign_in(AccountId::new("u1")).unwrap();
		assert!(store.read(&anon, 1).is_none());
	}

	#[test]
	fn switch_purges_before_the_next_account_enters() {
		let (mut coordinator, store, _) = setup();
		coordinator.sign_in(AccountId::new("u1")).unwrap();
		store.write(&draft_key("u1"), &json!({"name": "Salsa Night"}), 1);

		coordinator.switch_account(AccountId::new("u2")).unwrap();
		assert_eq!(coordinator.current_account(), Some(&AccountId::new("u2")));
		assert!(store.read(&draft_key("u1"), 1).is_none());
	}

	#[test]
	fn failed_purge_blocks_the_next_session() {
		let (mut coordinator, store, backend) = setup();
		coordinator.sign_in(AccountId::new("u1")).unwrap();
		store.write(&draft_key("u1"), &json!({"name": "secret"}), 1);

		backend.set_fail_removes(true);
		assert!(coordinator.sign_out().is_err());
		assert_eq!(
			coordinator.phase(),
			&Phase::PurgeBlocked(AccountId::new("u1"))
		);
		// While blocked, the next account cannot enter over the leak.
		assert!(coordinator.sign_in(AccountId::new("u2")).is_err());
		assert!(coordinator.current_account().is_none());

		backend.set_fail_removes(false);
		coordinator.sign_in(AccountId::new("u2")).unwrap();
		assert!(store.read(&draft_key("u1"), 1).is_none());
	}

	#[test]
	fn retry_purge_unblocks() {
		let (mut coordinator, store, backend) = setup();
		coordinator.sign_in(AccountId::new("u1")).unwrap();
		store.write(&draft_key("u1"), &json!(1), 1);

		backend.set_fail_removes(true);
		let _ = coordinator.sign_out();
		backend.set_fail_removes(false);

		coordinator.retry_purge().unwrap();
		assert_eq!(coordinator.phase(), &Phase::Anonymous);
	}

	#[test]
	fn role_mode_resets_on_sign_out_and_rehydrates_on_sign_in() {
		let (mut coordinator, _, _) = setup();
		coordinator.sign_in(AccountId::new("u1")).unwrap();
		coordinator.set_role_mode(RoleMode::Organizer);
		assert_eq!(coordinator.role_mode(), RoleMode::Organizer);

		coordinator.sign_out().unwrap();
		assert_eq!(coordinator.role_mode(), RoleMode::BASE);

		// The role was persisted inside u1's namespace, which sign-out
		// purged; a fresh session starts from base.
		coordinator.sign_in(AccountId::new("u1")).unwrap();
		assert_eq!(coordinator.role_mode(), RoleMode::BASE);
	}

	#[test]
	fn role_persists_across_session_restart_without_sign_out() {
		let (mut coordinator, store, _) = setup();
		coordinator.sign_in(AccountId::new("u1")).unwrap();
		coordinator.set_role_mode(RoleMode::Brand);

		// Process restart: new coordinator over the same storage.
		let mut restarted = SessionLifecycleCoordinator::new(store, Arc::new(any_role));
		restarted.sign_in(AccountId::new("u1")).unwrap();
		assert_eq!(restarted.role_mode(), RoleMode::Brand);
	}

	#[test]
	fn derived_caches_reset_on_every_session_edge() {
		let (mut coordinator, _, _) = setup();
		let organizer_id: crate::DerivedIdCache<String> = crate::DerivedIdCache::new();
		coordinator.subscribe(Box::new(organizer_id.clone()));

		coordinator.sign_in(AccountId::new("u1")).unwrap();
		organizer_id.set("org-of-u1".to_string());

		coordinator.switch_account(AccountId::new("u2")).unwrap();
		// u1's derived value must never be served under u2.
		assert_eq!(organizer_id.get(), None);

		organizer_id.set("org-of-u2".to_string());
		coordinator.sign_out().unwrap();
		assert_eq!(organizer_id.get(), None);
	}

	#[test]
	fn role_switch_outside_a_session_is_ignored() {
		let (mut coordinator, _, _) = setup();
		coordinator.set_role_mode(RoleMode::Organizer);
		assert_eq!(coordinator.role_mode(), RoleMode::BASE);
	}
}
