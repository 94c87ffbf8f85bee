//! The hydrated form controller.
//!
//! One controller owns one scoped key. It reconciles the authoritative
//! server snapshot, the persisted draft, and in-memory edits into a single
//! [`FormState`], persists edits through a debounced best-effort write, and
//! resets itself after a confirmed remote save.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use pista_store::{DraftRecord, ScopedKey, ScopedKeyStore};

use crate::debounce::PersistTimer;
use crate::path::{FieldPath, get_path, remove_path, set_path, top_level_paths};
use crate::state::{FormSource, FormState};

/// Correlates a deferred storage read with the controller that issued it.
///
/// If the user touches the form, saves, discards, or a newer hydration
/// starts before the read resolves, the ticket goes stale and the resolved
/// draft is dropped instead of regressing state the user has moved past.
#[derive(Debug)]
#[must_use]
pub struct HydrationTicket {
	generation: u64,
}

/// Reconciles server data, a persisted draft, and in-memory edits.
pub struct HydratedFormController {
	store: Arc<ScopedKeyStore>,
	key: ScopedKey,
	schema_version: u32,
	defaults: Value,
	state: FormState,
	last_snapshot: Option<Value>,
	draft_adopted: bool,
	hydration_generation: u64,
	timer: PersistTimer,
	dirty: bool,
}

impl HydratedFormController {
	/// Creates a controller, hydrating synchronously from the store.
	///
	/// If a compatible draft exists under `key` it is adopted wholesale
	/// (`source = Draft`); otherwise the controller starts on `defaults`.
	pub fn new(
		store: Arc<ScopedKeyStore>,
		key: ScopedKey,
		defaults: Value,
		schema_version: u32,
		debounce: Duration,
	) -> Self {
		let mut controller = Self::detached(store, key, defaults, schema_version, debounce);
		if let Some(record) = controller.store.read(&controller.key, schema_version) {
			controller.adopt_draft(record.value);
		}
		controller
	}

	/// Creates a controller without reading storage, for async backends.
	///
	/// The controller starts at `source = Default`; the caller performs the
	/// read and hands the result to [`Self::complete_hydration`] with the
	/// returned ticket.
	pub fn new_deferred(
		store: Arc<ScopedKeyStore>,
		key: ScopedKey,
		defaults: Value,
		schema_version: u32,
		debounce: Duration,
	) -> (Self, HydrationTicket) {
		let controller = Self::detached(store, key, defaults, schema_version, debounce);
		let ticket = HydrationTicket {
			generation: controller.hydration_generation,
		};
		(controller, ticket)
	}

	fn detached(
		store: Arc<ScopedKeyStore>,
		key: ScopedKey,
		defaults: Value,
		schema_version: u32,
		debounce: Duration,
	) -> Self {
		Self {
			store,
			key,
			schema_version,
			state: FormState::new(defaults.clone(), FormSource::Default),
			defaults,
			last_snapshot: None,
			draft_adopted: false,
			hydration_generation: 0,
			timer: PersistTimer::new(debounce),
			dirty: false,
		}
	}

	/// Applies a deferred storage read.
	///
	/// A stale ticket (a touch or a newer hydration happened since it was
	/// issued) drops the record unapplied.
	pub fn complete_hydration(&mut self, ticket: HydrationTicket, record: Option<DraftRecord<Value>>) {
		if ticket.generation != self.hydration_generation {
			tracing::debug!(key = %self.key, "stale hydration read discarded");
			return;
		}
		let Some(record) = record else {
			return;
		};
		self.adopt_draft(record.value);
		if let Some(snapshot) = self.last_snapshot.take() {
			// Re-run reconciliation so a snapshot that raced the read still
			// passes the shape gate against the adopted draft.
			self.apply_server_snapshot(snapshot);
		}
	}

	fn adopt_draft(&mut self, value: Value) {
		self.state = FormState::new(value, FormSource::Draft);
		self.draft_adopted = true;
	}

	/// Reconciles an incoming authoritative snapshot into the form.
	///
	/// Touched fields keep their in-memory values; untouched fields accept
	/// the snapshot. An untouched form with an adopted draft keeps the draft
	/// wholesale unless its shape no longer matches the snapshot, in which
	/// case the draft is discarded rather than partially merged.
	pub fn apply_server_snapshot(&mut self, snapshot: Value) {
		if self.state.is_touched() {
			let mut merged = merged_defaults(&self.defaults, &snapshot);
			for path in &self.state.touched {
				match get_path(&self.state.value, path) {
					Some(kept) => set_path(&mut merged, path, kept.clone()),
					None => remove_path(&mut merged, path),
				}
			}
			self.state.value = merged;
		} else if self.draft_adopted {
			if !shape_compatible(&self.state.value, &snapshot) {
				tracing::debug!(
					key = %self.key,
					"draft shape incompatible with snapshot, discarding draft"
				);
				self.store.delete(&self.key);
				self.draft_adopted = false;
				self.dirty = false;
				self.timer.cancel();
				self.state = FormState::new(merged_defaults(&self.defaults, &snapshot), FormSource::Server);
			}
		} else {
			self.state = FormState::new(merged_defaults(&self.defaults, &snapshot), FormSource::Server);
		}
		self.last_snapshot = Some(snapshot);
	}

	/// Sets a top-level field.
	pub fn set_field(&mut self, field: &str, value: Value) {
		self.apply_edit(FieldPath::field(field), value);
	}

	/// Sets a (possibly nested) field by path.
	pub fn set_nested(&mut self, path: FieldPath, value: Value) {
		self.apply_edit(path, value);
	}

	/// Replaces the whole document.
	///
	/// Touches every top-level field of the old and new documents: a field
	/// the caller removed here is an edit too, and the next snapshot must
	/// not silently reintroduce it.
	pub fn set_all(&mut self, value: Value) {
		self.hydration_generation = self.hydration_generation.wrapping_add(1);
		for path in top_level_paths(&self.state.value) {
			self.state.touched.insert(path);
		}
		for path in top_level_paths(&value) {
			self.state.touched.insert(path);
		}
		if self.state.value != value {
			self.state.value = value;
			self.mark_dirty();
		}
	}

	fn apply_edit(&mut self, path: FieldPath, value: Value) {
		self.hydration_generation = self.hydration_generation.wrapping_add(1);
		if get_path(&self.state.value, &path) != Some(&value) {
			set_path(&mut self.state.value, &path, value);
			self.mark_dirty();
		}
		self.state.touched.insert(path);
	}

	fn mark_dirty(&mut self) {
		self.dirty = true;
		self.timer.arm(Instant::now());
	}

	/// Persists the draft if the debounce deadline has passed.
	///
	/// Called by the host loop; never blocks the interaction path.
	pub fn poll_persist(&mut self) {
		if self.timer.fire_if_due(Instant::now()) {
			self.persist();
		}
	}

	/// Persists any pending draft immediately (teardown path).
	pub fn flush_persist(&mut self) {
		self.timer.cancel();
		self.persist();
	}

	fn persist(&mut self) {
		if !self.dirty {
			return;
		}
		self.store.write(&self.key, &self.state.value, self.schema_version);
		self.dirty = false;
	}

	/// Records a confirmed remote save: the draft is cleared and the next
	/// snapshot is trusted again.
	///
	/// A failed remote save must simply not call this; the draft survives.
	pub fn mark_saved(&mut self) {
		// The draft is dead; an in-flight hydration read must not revive it.
		self.hydration_generation = self.hydration_generation.wrapping_add(1);
		self.timer.cancel();
		self.dirty = false;
		self.draft_adopted = false;
		self.store.delete(&self.key);
		self.state.touched.clear();
		self.state.source = FormSource::Server;
	}

	/// Explicitly abandons the draft and re-adopts server data or defaults.
	pub fn discard(&mut self) {
		self.hydration_generation = self.hydration_generation.wrapping_add(1);
		self.timer.cancel();
		self.dirty = false;
		self.draft_adopted = false;
		self.store.delete(&self.key);
		self.state = match &self.last_snapshot {
			Some(snapshot) => {
				FormState::new(merged_defaults(&self.defaults, snapshot), FormSource::Server)
			}
			None => FormState::new(self.defaults.clone(), FormSource::Default),
		};
	}

	/// The current reconciled form state.
	pub fn state(&self) -> &FormState {
		&self.state
	}

	/// The current form document.
	pub fn value(&self) -> &Value {
		&self.state.value
	}

	/// Origin of the current base value.
	pub fn source(&self) -> FormSource {
		self.state.source
	}

	/// The scoped key this controller owns.
	pub fn key(&self) -> &ScopedKey {
		&self.key
	}

	/// Returns true if an edit has not reached storage yet.
	pub fn is_dirty(&self) -> bool {
		self.dirty
	}
}

impl Drop for HydratedFormController {
	fn drop(&mut self) {
		// Last-known value must reach storage before teardown.
		self.flush_persist();
	}
}

/// Defaults merged under the snapshot; snapshot fields win where present.
fn merged_defaults(defaults: &Value, snapshot: &Value) -> Value {
	let mut merged = defaults.clone();
	merge_over(&mut merged, snapshot);
	merged
}

fn merge_over(base: &mut Value, incoming: &Value) {
	match (base, incoming) {
		(Value::Object(base_map), Value::Object(incoming_map)) => {
			for (field, value) in incoming_map {
				match base_map.get_mut(field) {
					Some(slot) => merge_over(slot, value),
					None => {
						base_map.insert(field.clone(), value.clone());
					}
				}
			}
		}
		(slot, incoming) => *slot = incoming.clone(),
	}
}

/// Structural gate between a draft value and a server snapshot.
///
/// A draft carrying top-level fields the snapshot does not know (a field was
/// renamed upstream) cannot be merged safely and must be discarded whole.
fn shape_compatible(draft: &Value, snapshot: &Value) -> bool {
	match (draft.as_object(), snapshot.as_object()) {
		(Some(draft_map), Some(snapshot_map)) => {
			draft_map.keys().all(|field| snapshot_map.contains_key(field))
		}
		(None, None) => json_kind(draft) == json_kind(snapshot),
		_ => false,
	}
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}
