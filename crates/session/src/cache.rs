//! Account-derived value caches invalidated by session transitions.

use std::sync::Arc;

use parking_lot::Mutex;

use pista_store::AccountId;

use crate::coordinator::SessionSubscriber;

/// A cached value derived from the current account (e.g. "does this account
/// have an organizer profile").
///
/// Registered with the coordinator as a subscriber, the cache is emptied on
/// every session edge so a value derived for one account is never served for
/// the next. Handles are cheap clones over shared state, so the coordinator
/// can own one handle while screens read through another.
#[derive(Debug)]
pub struct DerivedIdCache<T> {
	inner: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for DerivedIdCache<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> Default for DerivedIdCache<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> DerivedIdCache<T> {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Mutex::new(None)),
		}
	}

	/// Stores a freshly derived value.
	pub fn set(&self, value: T) {
		*self.inner.lock() = Some(value);
	}

	/// Empties the cache; the next read must re-derive.
	pub fn invalidate(&self) {
		*self.inner.lock() = None;
	}
}

impl<T: Clone> DerivedIdCache<T> {
	/// The cached value, if any.
	pub fn get(&self) -> Option<T> {
		self.inner.lock().clone()
	}

	/// Returns the cached value or derives, stores, and returns a fresh one.
	pub fn get_or_derive(&self, derive: impl FnOnce() -> T) -> T {
		let mut slot = self.inner.lock();
		slot.get_or_insert_with(derive).clone()
	}
}

impl<T: Send> SessionSubscriber for DerivedIdCache<T> {
	fn on_session_cleared(&mut self) {
		self.invalidate();
	}

	fn on_session_ready(&mut self, _account: &AccountId) {
		// Derived values are account-specific; refetch, never carry over.
		self.invalidate();
	}
}
