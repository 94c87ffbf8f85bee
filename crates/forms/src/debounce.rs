//! Deadline-based persist debouncing.
//!
//! One timer per controller, armed by the first edit and left alone by
//! subsequent ones; the host loop polls it and teardown flushes it. Nothing
//! here blocks the interaction path.

use std::time::{Duration, Instant};

/// A single in-flight persist deadline.
#[derive(Debug)]
pub(crate) struct PersistTimer {
	interval: Duration,
	deadline: Option<Instant>,
}

impl PersistTimer {
	pub(crate) fn new(interval: Duration) -> Self {
		Self {
			interval,
			deadline: None,
		}
	}

	/// Arms the timer if it is not already armed.
	pub(crate) fn arm(&mut self, now: Instant) {
		if self.deadline.is_none() {
			self.deadline = Some(now + self.interval);
		}
	}

	/// Returns true and disarms if the deadline has passed.
	pub(crate) fn fire_if_due(&mut self, now: Instant) -> bool {
		match self.deadline {
			Some(deadline) if now >= deadline => {
				self.deadline = None;
				true
			}
			_ => false,
		}
	}

	/// Disarms unconditionally, returning whether a deadline was pending.
	pub(crate) fn cancel(&mut self) -> bool {
		self.deadline.take().is_some()
	}
}
