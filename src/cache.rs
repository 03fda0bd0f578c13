//! Single-flight, TTL-bounded token cache.
//!
//! [`TokenCache::get_token`] serves the cached credential while it is valid, otherwise it joins
//! the acquisition already in flight or starts a new one. Every caller that arrives while an
//! acquisition is outstanding awaits the same [`Shared`] future and observes the same outcome,
//! so the issuer sees at most one outstanding call per cache.
//!
//! The settle step runs inside the shared future, before it resolves: by the time any caller
//! sees a value, the credential is installed and the in-flight marker is cleared. Failures leave
//! a previously installed credential untouched and are never cached. A panicking issuer counts
//! as a failure ([`Error::IssuerPanicked`]).

mod credential;

pub use credential::*;

// std
use std::{any::Any, panic::AssertUnwindSafe, sync::Weak};
// crates.io
use futures::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	clock::{Clock, SystemClock},
	error::AcquisitionError,
	issuer::{IssuedToken, TokenIssuer},
	obs::{self, CacheEvent},
};

type FlightFuture = Shared<BoxFuture<'static, Result<TokenSecret, AcquisitionError>>>;

/// Observable state of a [`TokenCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheState {
	/// No credential has been installed and nothing is in flight.
	Empty,
	/// A credential is installed and still valid.
	Valid,
	/// A credential is installed but no longer valid; the next call re-acquires.
	Expired,
	/// An acquisition is in flight.
	Refreshing,
}

/// Shared access-token cache with single-flight acquisition.
///
/// Clones share the same credential and in-flight acquisition.
#[derive(Clone)]
pub struct TokenCache {
	issuer: Arc<dyn TokenIssuer>,
	clock: Arc<dyn Clock>,
	safety_margin: Duration,
	slot: Arc<Mutex<CacheSlot>>,
}
impl TokenCache {
	/// Margin subtracted from every issuer-reported TTL.
	pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::seconds(60);

	/// Creates an empty cache backed by `issuer`, the system clock, and the default margin.
	pub fn new(issuer: Arc<dyn TokenIssuer>) -> Self {
		Self {
			issuer,
			clock: Arc::new(SystemClock),
			safety_margin: Self::DEFAULT_SAFETY_MARGIN,
			slot: Default::default(),
		}
	}

	/// Replaces the time source used for expiry decisions.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the early-expiry buffer (defaults to 60 seconds); negative values are treated as
	/// zero.
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = margin.max(Duration::ZERO);

		self
	}

	/// Early-expiry buffer applied to new credentials.
	pub fn safety_margin(&self) -> Duration {
		self.safety_margin
	}

	/// Returns a valid access token, acquiring one when necessary.
	///
	/// At most one acquisition is outstanding at any time. Callers that join an acquisition
	/// receive its value, or the same [`AcquisitionError`] wrapped in
	/// [`Error::Acquisition`]. No retry happens here; the next call starts a fresh attempt.
	///
	/// Dropping the returned future never cancels the acquisition: it stays in flight and the
	/// next caller joins it.
	pub async fn get_token(&self) -> Result<TokenSecret> {
		let flight = {
			let mut slot = self.slot.lock();
			let now = self.clock.now();

			if let Some(credential) = slot.credential.as_ref().filter(|c| c.is_valid_at(now)) {
				record(CacheEvent::Hit, Some(credential.expires_at));

				return Ok(credential.value.clone());
			}

			match &slot.flight {
				Some(flight) => {
					record(CacheEvent::Joined, None);

					flight.future.clone()
				},
				None => {
					let id = slot.next_flight_id;

					slot.next_flight_id = id.wrapping_add(1);

					let future = self.start_flight(id);

					slot.flight = Some(Flight { id, future: future.clone() });
					record(CacheEvent::Acquire, None);

					future
				},
			}
		};

		flight.await.map_err(Error::from)
	}

	/// Reports whether the cache is empty, valid, expired, or refreshing.
	pub fn state(&self) -> CacheState {
		let slot = self.slot.lock();

		if slot.flight.is_some() {
			return CacheState::Refreshing;
		}

		match &slot.credential {
			None => CacheState::Empty,
			Some(credential) if credential.is_valid_at(self.clock.now()) => CacheState::Valid,
			Some(_) => CacheState::Expired,
		}
	}

	/// Expiry instant of the installed credential, if any.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.slot.lock().credential.as_ref().map(|credential| credential.expires_at)
	}

	fn start_flight(&self, id: u64) -> FlightFuture {
		let issuer = self.issuer.clone();
		let clock = self.clock.clone();
		let safety_margin = self.safety_margin;
		let slot = Arc::downgrade(&self.slot);

		async move {
			let outcome = AssertUnwindSafe(async { issuer.acquire().await })
				.catch_unwind()
				.await
				.unwrap_or_else(|payload| Err(panic_error(payload.as_ref())));

			settle(&slot, id, clock.now(), safety_margin, outcome)
		}
		.boxed()
		.shared()
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("state", &self.state())
			.field("expires_at", &self.expires_at())
			.field("safety_margin", &self.safety_margin)
			.finish()
	}
}

#[derive(Default)]
struct CacheSlot {
	credential: Option<CachedCredential>,
	flight: Option<Flight>,
	next_flight_id: u64,
}

struct Flight {
	id: u64,
	future: FlightFuture,
}

fn settle(
	slot: &Weak<Mutex<CacheSlot>>,
	id: u64,
	now: OffsetDateTime,
	safety_margin: Duration,
	outcome: Result<IssuedToken>,
) -> Result<TokenSecret, AcquisitionError> {
	let outcome = outcome.map_err(AcquisitionError::new);
	// Cache dropped while the acquisition was running; hand the outcome to the remaining waiters.
	let Some(slot) = slot.upgrade() else {
		return outcome.map(|token| token.value);
	};
	let mut slot = slot.lock();

	if slot.flight.as_ref().is_some_and(|flight| flight.id == id) {
		slot.flight = None;
	}

	match outcome {
		Ok(token) => {
			let credential = CachedCredential::new(token.value, now, token.ttl, safety_margin);
			let value = credential.value.clone();

			record(CacheEvent::Acquired, Some(credential.expires_at));

			slot.credential = Some(credential);

			Ok(value)
		},
		Err(err) => {
			record(CacheEvent::Failed, None);

			Err(err)
		},
	}
}

fn panic_error(payload: &(dyn Any + Send)) -> Error {
	let message = payload
		.downcast_ref::<&str>()
		.map(|text| (*text).to_owned())
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "non-string panic payload".into());

	Error::IssuerPanicked { message }
}

fn record(event: CacheEvent, expires_at: Option<OffsetDateTime>) {
	obs::record_cache_event(event);
	obs::trace_cache_event(event, expires_at);
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{clock::ManualClock, error::TransientError, issuer::IssuerFuture};

	struct ScriptedIssuer {
		calls: AtomicUsize,
		fail: bool,
		panic_on_first: bool,
	}
	impl TokenIssuer for ScriptedIssuer {
		fn acquire(&self) -> IssuerFuture<'_> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
			let fail = self.fail;
			let panic = self.panic_on_first && call == 1;

			Box::pin(async move {
				if panic {
					panic!("issuer blew up on attempt {call}");
				}
				if fail {
					Err(TransientError::TokenEndpoint {
						message: format!("attempt {call}"),
						status: Some(503),
						retry_after: None,
						details: None,
					}
					.into())
				} else {
					Ok(IssuedToken::new(format!("tok-{call}"), Duration::hours(1)))
				}
			})
		}
	}

	fn cache(fail: bool) -> (TokenCache, Arc<ScriptedIssuer>, ManualClock) {
		scripted(ScriptedIssuer { calls: AtomicUsize::new(0), fail, panic_on_first: false })
	}

	fn scripted(issuer: ScriptedIssuer) -> (TokenCache, Arc<ScriptedIssuer>, ManualClock) {
		let issuer = Arc::new(issuer);
		let clock = ManualClock::default();
		let cache = TokenCache::new(issuer.clone()).with_clock(Arc::new(clock.clone()));

		(cache, issuer, clock)
	}

	#[tokio::test]
	async fn state_walks_through_empty_valid_and_expired() {
		let (cache, issuer, clock) = cache(false);

		assert_eq!(cache.state(), CacheState::Empty);
		assert_eq!(cache.expires_at(), None);

		let token = cache.get_token().await.expect("First acquisition should succeed.");

		assert_eq!(token.expose(), "tok-1");
		assert_eq!(cache.state(), CacheState::Valid);
		assert_eq!(cache.expires_at(), Some(clock.now() + Duration::seconds(3_540)));

		clock.advance(Duration::seconds(3_540));

		assert_eq!(cache.state(), CacheState::Expired);

		let token = cache.get_token().await.expect("Re-acquisition should succeed.");

		assert_eq!(token.expose(), "tok-2");
		assert_eq!(issuer.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn pending_flight_reports_refreshing_and_is_driven_by_a_joiner() {
		let (cache, issuer, _clock) = cache(false);
		// Futures are lazy: an unpolled call leaves no trace.
		let abandoned = cache.get_token();

		drop(abandoned);

		assert_eq!(cache.state(), CacheState::Empty);

		{
			let mut slot = cache.slot.lock();
			let future = cache.start_flight(7);

			slot.flight = Some(Flight { id: 7, future });
		}

		assert_eq!(cache.state(), CacheState::Refreshing);

		let token = cache.get_token().await.expect("Joined caller should drive the flight.");

		assert_eq!(token.expose(), "tok-1");
		assert_eq!(cache.state(), CacheState::Valid);
		assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn failures_are_not_cached() {
		let (cache, issuer, _clock) = cache(true);
		let first = cache.get_token().await.expect_err("Scripted failure should surface.");
		let second = cache.get_token().await.expect_err("Failures must not be cached.");

		assert!(first.to_string().contains("attempt 1"));
		assert!(second.to_string().contains("attempt 2"));
		assert_eq!(first.upstream_status(), Some(503));
		assert_eq!(cache.state(), CacheState::Empty);
		assert_eq!(issuer.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn panicking_issuer_does_not_wedge_the_cache() {
		let (cache, issuer, _clock) = scripted(ScriptedIssuer {
			calls: AtomicUsize::new(0),
			fail: false,
			panic_on_first: true,
		});
		let err = cache.get_token().await.expect_err("A panicking issuer should surface an error.");

		match &err {
			Error::Acquisition(inner) => match inner.inner() {
				Error::IssuerPanicked { message } =>
					assert_eq!(message, "issuer blew up on attempt 1"),
				other => panic!("Unexpected issuer failure: {other:?}."),
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
		assert_ne!(cache.state(), CacheState::Refreshing);
		assert_eq!(cache.state(), CacheState::Empty);

		let token = cache.get_token().await.expect("The next call should start a fresh attempt.");

		assert_eq!(token.expose(), "tok-2");
		assert_eq!(issuer.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn settle_after_cache_drop_still_resolves() {
		let (cache, _issuer, _clock) = cache(false);
		let future = cache.start_flight(0);

		drop(cache);

		let token = future.await.expect("Orphaned flight should still deliver its value.");

		assert_eq!(token.expose(), "tok-1");
	}

	#[test]
	fn negative_margin_is_clamped() {
		let (cache, _issuer, _clock) = cache(false);
		let cache = cache.with_safety_margin(Duration::seconds(-5));

		assert_eq!(cache.safety_margin(), Duration::ZERO);
	}
}
