//! Persistent storage primitives wrapped by the scoped store.
//!
//! A [`StorageBackend`] is a plain string key-value capability. Two
//! implementations ship with the crate: an in-memory map for the common
//! embedded case (and for tests, with injectable faults), and a one-file-per-
//! key directory layout that survives process restarts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

/// Errors surfaced by a storage backend.
///
/// Callers above the [`crate::ScopedKeyStore`] never see these on the draft
/// hot path; the store converts them into logged no-ops. Purge is the one
/// operation that propagates them.
#[derive(Debug, Error)]
pub enum BackendError {
	/// The backing medium rejected the operation.
	#[error("storage unavailable: {0}")]
	Unavailable(String),

	/// A filesystem operation failed.
	#[error("I/O error for {path}: {source}")]
	Io {
		/// Path of the file involved.
		path: PathBuf,
		/// The underlying I/O error.
		source: std::io::Error,
	},
}

/// A basic get/set/delete key-value capability.
///
/// Keys are opaque strings produced by [`crate::ScopedKey::storage_key`];
/// the backend never interprets their structure beyond prefix matching.
pub trait StorageBackend: Send + Sync {
	/// Returns the stored value for `key`, or `None` if never written.
	fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

	/// Stores `value` under `key`, replacing any previous value.
	fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;

	/// Removes `key`. Removing an absent key is not an error.
	fn remove(&self, key: &str) -> Result<(), BackendError>;

	/// Lists every stored key starting with `prefix`.
	fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError>;
}

/// In-memory backend.
///
/// The fault flags make storage-degradation paths testable: a flagged
/// operation fails with [`BackendError::Unavailable`] without touching the
/// map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
	entries: Mutex<HashMap<String, String>>,
	fail_reads: AtomicBool,
	fail_writes: AtomicBool,
	fail_removes: AtomicBool,
}

impl MemoryBackend {
	/// Creates an empty backend.
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every subsequent `get` fail until cleared.
	pub fn set_fail_reads(&self, fail: bool) {
		self.fail_reads.store(fail, Ordering::Relaxed);
	}

	/// Makes every subsequent `set` fail until cleared.
	pub fn set_fail_writes(&self, fail: bool) {
		self.fail_writes.store(fail, Ordering::Relaxed);
	}

	/// Makes every subsequent `remove` fail until cleared.
	pub fn set_fail_removes(&self, fail: bool) {
		self.fail_removes.store(fail, Ordering::Relaxed);
	}

	/// Number of stored entries.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns true if nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

impl StorageBackend for MemoryBackend {
	fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
		if self.fail_reads.load(Ordering::Relaxed) {
			return Err(BackendError::Unavailable("injected read fault".into()));
		}
		Ok(self.entries.lock().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
		if self.fail_writes.load(Ordering::Relaxed) {
			return Err(BackendError::Unavailable("injected write fault".into()));
		}
		self.entries.lock().insert(key.to_string(), value.to_string());
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), BackendError> {
		if self.fail_removes.load(Ordering::Relaxed) {
			return Err(BackendError::Unavailable("injected remove fault".into()));
		}
		self.entries.lock().remove(key);
		Ok(())
	}

	fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
		if self.fail_reads.load(Ordering::Relaxed) {
			return Err(BackendError::Unavailable("injected read fault".into()));
		}
		Ok(self
			.entries
			.lock()
			.keys()
			.filter(|k| k.starts_with(prefix))
			.cloned()
			.collect())
	}
}

/// Directory-backed backend: one file per key under a root directory.
///
/// File names are a percent-encoding of the storage key so arbitrary key
/// bytes round-trip through the filesystem.
#[derive(Debug)]
pub struct FileBackend {
	root: PathBuf,
}

impl FileBackend {
	/// Opens (creating if needed) a backend rooted at `root`.
	pub fn open(root: impl Into<PathBuf>) -> Result<Self, BackendError> {
		let root = root.into();
		std::fs::create_dir_all(&root).map_err(|source| BackendError::Io {
			path: root.clone(),
			source,
		})?;
		Ok(Self { root })
	}

	fn path_for(&self, key: &str) -> PathBuf {
		self.root.join(encode_file_name(key))
	}
}

impl StorageBackend for FileBackend {
	fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
		let path = self.path_for(key);
		match std::fs::read_to_string(&path) {
			Ok(value) => Ok(Some(value)),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(source) => Err(BackendError::Io { path, source }),
		}
	}

	fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
		let path = self.path_for(key);
		std::fs::write(&path, value).map_err(|source| BackendError::Io { path, source })
	}

	fn remove(&self, key: &str) -> Result<(), BackendError> {
		let path = self.path_for(key);
		match std::fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(source) => Err(BackendError::Io { path, source }),
		}
	}

	fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
		let entries = std::fs::read_dir(&self.root).map_err(|source| BackendError::Io {
			path: self.root.clone(),
			source,
		})?;
		let mut keys = Vec::new();
		for entry in entries {
			let entry = entry.map_err(|source| BackendError::Io {
				path: self.root.clone(),
				source,
			})?;
			let name = entry.file_name();
			let Some(name) = name.to_str() else {
				continue;
			};
			if let Some(key) = decode_file_name(name)
				&& key.starts_with(prefix)
			{
				keys.push(key);
			}
		}
		Ok(keys)
	}
}

/// Percent-encodes a storage key into a filesystem-safe file name.
fn encode_file_name(key: &str) -> String {
	let mut out = String::with_capacity(key.len());
	for byte in key.bytes() {
		match byte {
			b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' | b'_' => {
				out.push(byte as char);
			}
			_ => out.push_str(&format!("%{byte:02X}")),
		}
	}
	out
}

/// Reverses [`encode_file_name`]. Returns `None` for names this backend did
/// not produce.
fn decode_file_name(name: &str) -> Option<String> {
	let mut bytes = Vec::with_capacity(name.len());
	let mut input = name.bytes();
	while let Some(byte) = input.next() {
		if byte == b'%' {
			let hi = input.next()?;
			let lo = input.next()?;
			let hex = [hi, lo];
			let hex = std::str::from_utf8(&hex).ok()?;
			bytes.push(u8::from_str_radix(hex, 16).ok()?);
		} else {
			bytes.push(byte);
		}
	}
	String::from_utf8(bytes).ok()
}
