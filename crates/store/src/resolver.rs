//! Deterministic mapping from an entity to its draft key segments.

/// Resolves the namespace segments for a draft of `entity_kind`.
///
/// The optional `discriminator` lets several drafts of the same kind coexist
/// (two different events being edited at once). The discriminator occupies
/// its own trailing segment, so distinct `(entity_kind, discriminator)`
/// pairs always resolve to distinct segment sequences. Pure, no I/O.
pub fn draft_segments(entity_kind: &str, discriminator: Option<&str>) -> Vec<String> {
	let mut segments = vec!["draft".to_string(), entity_kind.to_string()];
	if let Some(discriminator) = discriminator {
		segments.push(discriminator.to_string());
	}
	segments
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn discriminated_drafts_coexist() {
		assert_ne!(
			draft_segments("event", Some("e1")),
			draft_segments("event", Some("e2"))
		);
	}

	#[test]
	fn discriminator_never_folds_into_the_kind() {
		assert_ne!(
			draft_segments("event", Some("x")),
			draft_segments("event/x", None)
		);
		assert_ne!(draft_segments("event", Some("")), draft_segments("event", None));
	}

	#[test]
	fn resolution_is_deterministic() {
		assert_eq!(
			draft_segments("profile", None),
			draft_segments("profile", None)
		);
	}
}
