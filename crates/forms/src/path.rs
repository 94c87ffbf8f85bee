//! Field paths into JSON form documents.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from parsing a field path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldPathError {
	/// The path string was empty or contained an empty segment.
	#[error("empty segment in field path '{0}'")]
	EmptySegment(String),
}

/// A dot-separated path into a form document, e.g. `profile.display_name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
	/// Parses a dotted path. Every segment must be non-empty.
	pub fn parse(raw: &str) -> Result<Self, FieldPathError> {
		let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
		if segments.iter().any(String::is_empty) {
			return Err(FieldPathError::EmptySegment(raw.to_string()));
		}
		Ok(Self(segments))
	}

	/// A single-segment path for a top-level field.
	pub fn field(name: impl Into<String>) -> Self {
		Self(vec![name.into()])
	}

	/// The path segments, root first.
	pub fn segments(&self) -> &[String] {
		&self.0
	}
}

impl fmt::Display for FieldPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0.join("."))
	}
}

/// Reads the value at `path`, if present.
pub fn get_path<'a>(doc: &'a Value, path: &FieldPath) -> Option<&'a Value> {
	let mut current = doc;
	for segment in path.segments() {
		current = current.as_object()?.get(segment)?;
	}
	Some(current)
}

/// Writes `value` at `path`, creating intermediate objects as needed.
///
/// A non-object value along the way is replaced by an object; the form model
/// treats paths as authoritative over whatever shape was there before.
pub fn set_path(doc: &mut Value, path: &FieldPath, value: Value) {
	let mut current = doc;
	let (last, parents) = path.segments().split_last().expect("paths are non-empty");
	for segment in parents {
		if !current.is_object() {
			*current = Value::Object(Map::new());
		}
		current = current
			.as_object_mut()
			.expect("just coerced to object")
			.entry(segment.clone())
			.or_insert_with(|| Value::Object(Map::new()));
	}
	if !current.is_object() {
		*current = Value::Object(Map::new());
	}
	current
		.as_object_mut()
		.expect("just coerced to object")
		.insert(last.clone(), value);
}

/// Removes the value at `path`, if present.
pub fn remove_path(doc: &mut Value, path: &FieldPath) {
	let mut current = doc;
	let (last, parents) = path.segments().split_last().expect("paths are non-empty");
	for segment in parents {
		let Some(next) = current.as_object_mut().and_then(|map| map.get_mut(segment)) else {
			return;
		};
		current = next;
	}
	if let Some(map) = current.as_object_mut() {
		map.remove(last);
	}
}

/// The top-level field paths of an object document.
pub fn top_level_paths(doc: &Value) -> Vec<FieldPath> {
	match doc.as_object() {
		Some(map) => map.keys().map(FieldPath::field).collect(),
		None => Vec::new(),
	}
}
