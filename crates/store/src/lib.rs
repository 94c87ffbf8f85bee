//! Account-scoped durable key-value storage for local drafts.
//!
//! The [`ScopedKeyStore`] namespaces every record under the signed-in
//! account's identity so that one account's unsaved drafts are never visible
//! to another account on the same device. Storage failures degrade the draft
//! convenience feature to a no-op; they never block the authoritative data
//! path.

pub mod backend;
pub mod key;
pub mod record;
pub mod resolver;
pub mod store;

pub use backend::{BackendError, FileBackend, MemoryBackend, StorageBackend};
pub use key::{AccountId, ScopedKey};
pub use record::DraftRecord;
pub use resolver::draft_segments;
pub use store::{PurgeError, ScopedKeyStore};
