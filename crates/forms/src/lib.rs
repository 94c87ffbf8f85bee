//! Draft-aware form hydration and server-snapshot reconciliation.
//!
//! A [`HydratedFormController`] merges three inputs into one coherent form
//! model: the authoritative server snapshot, a locally persisted draft, and
//! caller-supplied defaults. Fields the user has touched in the current
//! session are never clobbered by a background refetch; unsaved work is
//! resurrected across reloads; a successful save clears the draft and makes
//! the next snapshot authoritative again.

pub mod controller;
mod debounce;
pub mod path;
pub mod state;

pub use controller::{HydratedFormController, HydrationTicket};
pub use path::{FieldPath, FieldPathError};
pub use state::{FormSource, FormState};
