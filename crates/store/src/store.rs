//! The process-wide scoped draft store.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::backend::{BackendError, StorageBackend};
use crate::key::{AccountId, ScopedKey, namespace_component};
use crate::record::DraftRecord;

/// Errors from a namespace purge.
///
/// Unlike draft reads and writes, purge failures are real errors: an
/// unpurged namespace can leak one account's drafts to the next account on
/// the device, so the session layer must block on them.
#[derive(Debug, Error)]
pub enum PurgeError {
	/// The backend could not enumerate the namespace.
	#[error("failed to enumerate namespace keys: {0}")]
	List(#[source] BackendError),

	/// A key in the namespace could not be deleted.
	#[error("failed to delete {key}: {source}")]
	Delete {
		/// The serialized key that survived.
		key: String,
		/// The underlying backend error.
		source: BackendError,
	},
}

/// Durable key-value store namespaced per signed-in account.
///
/// Draft reads and writes are best-effort: a failing backend degrades them
/// to logged no-ops because losing the ability to draft must never block
/// editing. Shared process-wide as `Arc<ScopedKeyStore>`; distinct keys
/// never interfere and one form controller owns one key.
pub struct ScopedKeyStore {
	backend: Arc<dyn StorageBackend>,
}

impl ScopedKeyStore {
	/// Wraps a storage backend.
	pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
		Self { backend }
	}

	/// Persists `value` as a draft record under `key`, best-effort.
	pub fn write<T: Serialize>(&self, key: &ScopedKey, value: &T, schema_version: u32) {
		let record = DraftRecord {
			value,
			saved_at: Utc::now(),
			schema_version,
		};
		let payload = match serde_json::to_string(&record) {
			Ok(payload) => payload,
			Err(err) => {
				tracing::warn!(key = %key, %err, "draft value not serializable, write skipped");
				return;
			}
		};
		if let Err(err) = self.backend.set(&key.storage_key(), &payload) {
			tracing::warn!(key = %key, %err, "draft write failed, continuing without persistence");
		}
	}

	/// Reads the draft record under `key`, or `None`.
	///
	/// Missing, corrupt, and version-mismatched payloads all read as absent;
	/// undecodable payloads are deleted opportunistically so they are not
	/// re-parsed on every mount.
	pub fn read(&self, key: &ScopedKey, expected_version: u32) -> Option<DraftRecord<Value>> {
		let raw = match self.backend.get(&key.storage_key()) {
			Ok(raw) => raw?,
			Err(err) => {
				tracing::warn!(key = %key, %err, "draft read failed, treating as absent");
				return None;
			}
		};
		match DraftRecord::decode(&raw, expected_version) {
			Some(record) => Some(record),
			None => {
				tracing::debug!(key = %key, "stale or corrupt draft discarded");
				self.delete(key);
				None
			}
		}
	}

	/// Deletes the record under `key`, best-effort.
	pub fn delete(&self, key: &ScopedKey) {
		if let Err(err) = self.backend.remove(&key.storage_key()) {
			tracing::warn!(key = %key, %err, "draft delete failed");
		}
	}

	/// Deletes every key in `account`'s namespace.
	pub fn purge_namespace(&self, account: &AccountId) -> Result<(), PurgeError> {
		self.purge_component(&namespace_component(Some(account)))
	}

	/// Deletes every key written while no account was active.
	pub fn purge_anonymous(&self) -> Result<(), PurgeError> {
		self.purge_component(&namespace_component(None))
	}

	fn purge_component(&self, component: &str) -> Result<(), PurgeError> {
		let keys = self
			.backend
			.keys_with_prefix(component)
			.map_err(PurgeError::List)?;
		let prefix = format!("{component}/");
		for key in keys {
			// A segmentless key is the bare component; "acct.u1" must still
			// not sweep "acct.u10/..." along.
			if key != component && !key.starts_with(&prefix) {
				continue;
			}
			self.backend
				.remove(&key)
				.map_err(|source| PurgeError::Delete { key: key.clone(), source })?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;
	use crate::backend::MemoryBackend;
	use crate::resolver::draft_segments;

	fn store_with_backend() -> (ScopedKeyStore, Arc<MemoryBackend>) {
		let backend = Arc::new(MemoryBackend::new());
		(ScopedKeyStore::new(backend.clone()), backend)
	}

	fn event_key(account: &str) -> ScopedKey {
		ScopedKey::for_account(AccountId::new(account), draft_segments("event", Some("e1")))
	}

	#[test]
	fn write_then_read_round_trips() {
		let (store, _) = store_with_backend();
		let key = event_key("u1");
		store.write(&key, &json!({"name": "Salsa Night"}), 1);

		let record = store.read(&key, 1).unwrap();
		assert_eq!(record.value, json!({"name": "Salsa Night"}));
	}

	#[test]
	fn version_mismatch_reads_absent_and_drops_the_payload() {
		let (store, backend) = store_with_backend();
		let key = event_key("u1");
		store.write(&key, &json!({"name": "x"}), 1);

		assert!(store.read(&key, 2).is_none());
		// The incompatible payload was removed, not kept around.
		assert_eq!(backend.get(&key.storage_key()).unwrap(), None);
	}

	#[test]
	fn backend_write_failure_degrades_to_noop() {
		let (store, backend) = store_with_backend();
		let key = event_key("u1");
		backend.set_fail_writes(true);
		store.write(&key, &json!({"name": "x"}), 1);
		backend.set_fail_writes(false);
		assert!(store.read(&key, 1).is_none());
	}

	#[test]
	fn backend_read_failure_reads_absent() {
		let (store, backend) = store_with_backend();
		let key = event_key("u1");
		store.write(&key, &json!(1), 1);
		backend.set_fail_reads(true);
		assert!(store.read(&key, 1).is_none());
	}

	#[test]
	fn purge_namespace_removes_only_that_account() {
		let (store, backend) = store_with_backend();
		store.write(&event_key("u1"), &json!(1), 1);
		store.write(
			&ScopedKey::for_account(AccountId::new("u1"), vec!["role_mode".to_string()]),
			&json!("organizer"),
			1,
		);
		store.write(&event_key("u2"), &json!(2), 1);
		store.write(&ScopedKey::anonymous(draft_segments("event", None)), &json!(3), 1);

		store.purge_namespace(&AccountId::new("u1")).unwrap();

		assert!(store.read(&event_key("u1"), 1).is_none());
		assert_eq!(store.read(&event_key("u2"), 1).unwrap().value, json!(2));
		assert_eq!(backend.len(), 2);
	}

	#[test]
	fn purge_covers_segmentless_keys_without_touching_sibling_accounts() {
		let (store, backend) = store_with_backend();
		store.write(
			&ScopedKey::for_account(AccountId::new("u1"), Vec::new()),
			&json!("bare"),
			1,
		);
		store.write(&event_key("u1"), &json!(1), 1);
		store.write(&event_key("u10"), &json!(2), 1);

		store.purge_namespace(&AccountId::new("u1")).unwrap();

		assert_eq!(backend.len(), 1);
		assert_eq!(store.read(&event_key("u10"), 1).unwrap().value, json!(2));
	}

	#[test]
	fn purge_anonymous_leaves_account_namespaces() {
		let (store, _) = store_with_backend();
		let anon = ScopedKey::anonymous(draft_segments("profile", None));
		store.write(&anon, &json!("pre-login"), 1);
		store.write(&event_key("u1"), &json!(1), 1);

		store.purge_anonymous().unwrap();

		assert!(store.read(&anon, 1).is_none());
		assert!(store.read(&event_key("u1"), 1).is_some());
	}

	#[test]
	fn purge_failure_is_an_error() {
		let (store, backend) = store_with_backend();
		store.write(&event_key("u1"), &json!(1), 1);
		backend.set_fail_removes(true);
		assert!(matches!(
			store.purge_namespace(&AccountId::new("u1")),
			Err(PurgeError::Delete { .. })
		));
	}
}
