//! In-memory form state.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::path::FieldPath;

/// Where the form's current base value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormSource {
	/// Caller-supplied defaults; no draft and no snapshot seen yet.
	Default,
	/// A persisted draft was resurrected.
	Draft,
	/// The authoritative server snapshot.
	Server,
}

/// The reconciled form model handed to the UI.
///
/// Never persisted directly; only `value` reaches storage, wrapped in a
/// draft record. Once a path enters `touched`, no server refresh may
/// overwrite that field until an explicit post-save reset or teardown.
#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
	/// The current form document.
	pub value: Value,
	/// Field paths the user has modified this session.
	pub touched: BTreeSet<FieldPath>,
	/// Origin of the base value.
	pub source: FormSource,
}

impl FormState {
	/// An untouched state over `value`.
	pub fn new(value: Value, source: FormSource) -> Self {
		Self {
			value,
			touched: BTreeSet::new(),
			source,
		}
	}

	/// Returns true if the user has modified any field this session.
	pub fn is_touched(&self) -> bool {
		!self.touched.is_empty()
	}
}
