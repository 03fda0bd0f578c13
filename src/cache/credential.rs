// self
use crate::{_prelude::*, auth::TokenSecret};

/// Access token held by the cache together with its validity window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedCredential {
	/// Opaque bearer token.
	pub value: TokenSecret,
	/// Clock reading when the acquisition settled.
	pub issued_at: OffsetDateTime,
	/// Instant from which the value must no longer be served.
	pub expires_at: OffsetDateTime,
}
impl CachedCredential {
	/// Builds a credential whose validity ends `safety_margin` before the issuer-reported TTL.
	///
	/// A TTL that does not exceed the margin yields a credential that is already expired.
	pub fn new(
		value: TokenSecret,
		issued_at: OffsetDateTime,
		ttl: Duration,
		safety_margin: Duration,
	) -> Self {
		let expires_at = issued_at.saturating_add(ttl.saturating_sub(safety_margin));

		Self { value, issued_at, expires_at }
	}

	/// Returns `true` while `now` is strictly before [`expires_at`](Self::expires_at).
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		now < self.expires_at
	}

	/// Time left before expiry, clamped at zero.
	pub fn remaining(&self, now: OffsetDateTime) -> Duration {
		(self.expires_at - now).max(Duration::ZERO)
	}
}
