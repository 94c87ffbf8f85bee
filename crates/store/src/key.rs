//! Scoped storage keys and account namespacing.
//!
//! Every key carries the account it was written under (or the anonymous
//! sentinel). Serialization escapes the separator so two different
//! `(account, segments)` tuples can never collide; that collision-freedom is
//! what makes a namespace purge a complete guarantee rather than a best
//! effort.

use std::fmt;

/// Opaque, stable account identifier supplied by the identity layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(String);

impl AccountId {
	/// Wraps a raw identifier.
	pub fn new(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	/// The raw identifier string.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for AccountId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for AccountId {
	fn from(raw: &str) -> Self {
		Self::new(raw)
	}
}

/// Namespace component used for keys written with no active account.
const ANONYMOUS: &str = "anon";

/// A storage key scoped to an account namespace.
///
/// `account: None` scopes the key to the anonymous namespace; pre-login
/// writes land there and are purged on the next sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedKey {
	/// Owning account, or `None` for the anonymous namespace.
	pub account: Option<AccountId>,
	/// Ordered path segments under the namespace.
	pub segments: Vec<String>,
}

impl ScopedKey {
	/// Key scoped to `account`.
	pub fn for_account(account: AccountId, segments: Vec<String>) -> Self {
		Self {
			account: Some(account),
			segments,
		}
	}

	/// Key scoped to the anonymous namespace.
	pub fn anonymous(segments: Vec<String>) -> Self {
		Self {
			account: None,
			segments,
		}
	}

	/// Serializes to the flat backend key.
	pub fn storage_key(&self) -> String {
		let mut out = namespace_component(self.account.as_ref());
		for segment in &self.segments {
			out.push('/');
			out.push_str(&escape(segment));
		}
		out
	}
}

impl fmt::Display for ScopedKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.storage_key())
	}
}

/// The serialized namespace component on its own, without a trailing
/// separator. `None` addresses the anonymous namespace. A key with no
/// segments serializes to exactly this, so purge matches on the component
/// rather than a slash-terminated prefix.
pub(crate) fn namespace_component(account: Option<&AccountId>) -> String {
	match account {
		Some(account) => format!("acct.{}", escape(account.as_str())),
		None => ANONYMOUS.to_string(),
	}
}

/// Escapes `/` and `%` so segment boundaries stay unambiguous.
fn escape(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());
	for ch in raw.chars() {
		match ch {
			'%' => out.push_str("%25"),
			'/' => out.push_str("%2F"),
			_ => out.push(ch),
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn prefix_for(account: Option<&AccountId>) -> String {
		format!("{}/", namespace_component(account))
	}

	#[test]
	fn distinct_accounts_never_share_a_key() {
		let segments = vec!["draft".to_string(), "event".to_string()];
		let a = ScopedKey::for_account(AccountId::new("u1"), segments.clone());
		let b = ScopedKey::for_account(AccountId::new("u2"), segments.clone());
		let anon = ScopedKey::anonymous(segments);
		assert_ne!(a.storage_key(), b.storage_key());
		assert_ne!(a.storage_key(), anon.storage_key());
	}

	#[test]
	fn separator_in_account_id_cannot_escape_its_namespace() {
		// "u1/draft" as an account must not alias keys under account "u1".
		let tricky = ScopedKey::for_account(
			AccountId::new("u1/draft"),
			vec!["event".to_string()],
		);
		let plain = ScopedKey::for_account(
			AccountId::new("u1"),
			vec!["draft".to_string(), "event".to_string()],
		);
		assert_ne!(tricky.storage_key(), plain.storage_key());
		assert!(!tricky.storage_key().starts_with(&prefix_for(Some(&AccountId::new("u1")))));
	}

	#[test]
	fn namespace_prefix_covers_exactly_its_own_keys() {
		let prefix = prefix_for(Some(&AccountId::new("u1")));
		let own = ScopedKey::for_account(AccountId::new("u1"), vec!["role_mode".to_string()]);
		let other = ScopedKey::for_account(AccountId::new("u10"), vec!["role_mode".to_string()]);
		assert!(own.storage_key().starts_with(&prefix));
		assert!(!other.storage_key().starts_with(&prefix));
	}

	#[test]
	fn anonymous_prefix_is_distinct_from_accounts() {
		// An account literally named "anon" must not collide with the sentinel.
		let prefix = prefix_for(None);
		let named = ScopedKey::for_account(AccountId::new("anon"), vec!["x".to_string()]);
		assert!(!named.storage_key().starts_with(&prefix));
	}

	#[test]
	fn percent_in_segments_round_trips_unambiguously() {
		let a = ScopedKey::anonymous(vec!["a%2Fb".to_string()]);
		let b = ScopedKey::anonymous(vec!["a/b".to_string()]);
		assert_ne!(a.storage_key(), b.storage_key());
	}
}
