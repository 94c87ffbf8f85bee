//! Draft record envelope and schema versioning.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A persisted draft: the form value plus write metadata.
///
/// A record is only meaningful inside the account namespace it was written
/// under, and only while its `schema_version` matches what the reader
/// expects. Anything else reads back as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord<T> {
	/// The drafted form value.
	pub value: T,
	/// When the draft was last persisted.
	pub saved_at: DateTime<Utc>,
	/// Schema version of `value` at write time.
	pub schema_version: u32,
}

impl DraftRecord<Value> {
	/// Decodes a stored payload, enforcing the version gate.
	///
	/// Returns `None` for corrupt JSON, for a version mismatch, and for
	/// legacy payloads written before versioning existed (a missing version
	/// is a mismatch, never a wildcard).
	pub(crate) fn decode(raw: &str, expected_version: u32) -> Option<Self> {
		#[derive(Deserialize)]
		struct Envelope {
			value: Value,
			saved_at: DateTime<Utc>,
			#[serde(default)]
			schema_version: Option<u32>,
		}

		let envelope: Envelope = serde_json::from_str(raw).ok()?;
		if envelope.schema_version != Some(expected_version) {
			return None;
		}
		Some(Self {
			value: envelope.value,
			saved_at: envelope.saved_at,
			schema_version: expected_version,
		})
	}

	/// Decodes the drafted value as a typed `T`.
	pub fn value_as<T: DeserializeOwned>(&self) -> Option<T> {
		serde_json::from_value(self.value.clone()).ok()
	}
}
