// std
use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use parking_lot::Mutex;
use time::Duration;
// self
use aps_broker::{
	cache::{CacheState, TokenCache},
	clock::{Clock, ManualClock},
	error::{Error, TransientError},
	issuer::{IssuedToken, IssuerFuture, TokenIssuer},
};

enum Step {
	Token(&'static str, i64),
	Fail(&'static str),
}

/// Issuer that replays scripted outcomes after a fixed latency and counts its invocations.
struct ScriptedIssuer {
	calls: AtomicUsize,
	latency: std::time::Duration,
	script: Mutex<VecDeque<Step>>,
}
impl ScriptedIssuer {
	fn new(latency_ms: u64, script: impl IntoIterator<Item = Step>) -> Arc<Self> {
		Arc::new(Self {
			calls: AtomicUsize::new(0),
			latency: std::time::Duration::from_millis(latency_ms),
			script: Mutex::new(script.into_iter().collect()),
		})
	}

	fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl TokenIssuer for ScriptedIssuer {
	fn acquire(&self) -> IssuerFuture<'_> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
		let step = self.script.lock().pop_front();
		let latency = self.latency;

		Box::pin(async move {
			tokio::time::sleep(latency).await;

			match step {
				Some(Step::Token(value, ttl)) =>
					Ok(IssuedToken::new(value, Duration::seconds(ttl))),
				Some(Step::Fail(message)) => Err(TransientError::TokenEndpoint {
					message: message.into(),
					status: Some(503),
					retry_after: None,
					details: None,
				}
				.into()),
				None => Ok(IssuedToken::new(format!("tok-{call}"), Duration::hours(1))),
			}
		})
	}
}

fn cache_with(issuer: &Arc<ScriptedIssuer>) -> (TokenCache, ManualClock) {
	let clock = ManualClock::default();
	let cache = TokenCache::new(issuer.clone()).with_clock(Arc::new(clock.clone()));

	(cache, clock)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_acquisition() {
	let issuer = ScriptedIssuer::new(100, []);
	let (cache, _clock) = cache_with(&issuer);
	let handles = (0..16)
		.map(|_| {
			let cache = cache.clone();

			tokio::spawn(async move { cache.get_token().await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let token = handle
			.await
			.expect("Caller task should not panic.")
			.expect("Every concurrent caller should receive the token.");

		assert_eq!(token.expose(), "tok-1");
	}

	assert_eq!(issuer.calls(), 1);
	assert_eq!(cache.state(), CacheState::Valid);
}

#[tokio::test]
async fn valid_credential_is_served_without_the_issuer() {
	let issuer = ScriptedIssuer::new(0, []);
	let (cache, clock) = cache_with(&issuer);

	for _ in 0..5 {
		let token = cache.get_token().await.expect("Cached token should be served.");

		assert_eq!(token.expose(), "tok-1");

		clock.advance(Duration::minutes(10));
	}

	assert_eq!(issuer.calls(), 1);
}

#[tokio::test]
async fn expiry_honours_the_default_safety_margin() {
	let issuer =
		ScriptedIssuer::new(0, [Step::Token("first", 3_600), Step::Token("second", 3_600)]);
	let (cache, clock) = cache_with(&issuer);
	let start = clock.now();
	let token = cache.get_token().await.expect("Initial acquisition should succeed.");

	assert_eq!(token.expose(), "first");
	assert_eq!(cache.expires_at(), Some(start + Duration::seconds(3_540)));

	clock.set(start + Duration::seconds(3_539));

	assert_eq!(cache.get_token().await.expect("Token should still be valid.").expose(), "first");
	assert_eq!(issuer.calls(), 1);

	clock.set(start + Duration::seconds(3_540));

	assert_eq!(cache.state(), CacheState::Expired);

	let token = cache.get_token().await.expect("Expired token should be replaced.");

	assert_eq!(token.expose(), "second");
	assert_eq!(issuer.calls(), 2);
}

#[tokio::test]
async fn custom_safety_margin_moves_the_expiry() {
	let issuer = ScriptedIssuer::new(0, [Step::Token("short", 600)]);
	let (cache, clock) = cache_with(&issuer);
	let cache = cache.with_safety_margin(Duration::seconds(120));
	let start = clock.now();

	cache.get_token().await.expect("Acquisition should succeed.");

	assert_eq!(cache.expires_at(), Some(start + Duration::seconds(480)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn joined_callers_share_one_failure_and_the_next_call_retries() {
	let issuer =
		ScriptedIssuer::new(50, [Step::Fail("maintenance"), Step::Token("recovered", 3_600)]);
	let (cache, _clock) = cache_with(&issuer);
	let (first, second, third) =
		tokio::join!(cache.get_token(), cache.get_token(), cache.get_token());
	let failures = [first, second, third].map(|result| match result {
		Err(Error::Acquisition(err)) => err,
		other => panic!("Every joined caller should see the acquisition failure, got {other:?}."),
	});

	assert!(failures[0].same_attempt(&failures[1]));
	assert!(failures[0].same_attempt(&failures[2]));
	assert!(failures[0].to_string().contains("maintenance"));
	assert_eq!(issuer.calls(), 1);
	assert_eq!(cache.state(), CacheState::Empty);

	let token = cache.get_token().await.expect("A fresh attempt should follow the failure.");

	assert_eq!(token.expose(), "recovered");
	assert_eq!(issuer.calls(), 2);
}

#[tokio::test]
async fn failed_refresh_keeps_the_expired_credential() {
	let issuer = ScriptedIssuer::new(0, [
		Step::Token("first", 3_600),
		Step::Fail("token endpoint down"),
		Step::Token("second", 3_600),
	]);
	let (cache, clock) = cache_with(&issuer);

	cache.get_token().await.expect("Initial acquisition should succeed.");

	let expires_at = cache.expires_at();

	clock.advance(Duration::hours(1));

	let err = cache.get_token().await.expect_err("Refresh failure should surface.");

	assert_eq!(err.upstream_status(), Some(503));
	assert_eq!(cache.state(), CacheState::Expired);
	assert_eq!(cache.expires_at(), expires_at);
	assert_eq!(cache.get_token().await.expect("Retry should succeed.").expose(), "second");
	assert_eq!(issuer.calls(), 3);
}

#[tokio::test]
async fn ttl_within_the_margin_is_served_once_then_reacquired() {
	let issuer = ScriptedIssuer::new(0, [Step::Token("brief", 45), Step::Token("next", 45)]);
	let (cache, _clock) = cache_with(&issuer);

	assert_eq!(cache.get_token().await.expect("Brief token should be returned.").expose(), "brief");
	assert_eq!(cache.state(), CacheState::Expired);
	assert_eq!(cache.get_token().await.expect("Next call should re-acquire.").expose(), "next");
	assert_eq!(issuer.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn aborted_initiator_does_not_cancel_the_acquisition() {
	let issuer = ScriptedIssuer::new(200, []);
	let (cache, _clock) = cache_with(&issuer);
	let initiator = {
		let cache = cache.clone();

		tokio::spawn(async move { cache.get_token().await })
	};

	tokio::time::sleep(std::time::Duration::from_millis(50)).await;
	initiator.abort();

	assert!(initiator.await.is_err_and(|err| err.is_cancelled()));
	assert_eq!(cache.state(), CacheState::Refreshing);

	let token = cache.get_token().await.expect("Joiner should finish the abandoned acquisition.");

	assert_eq!(token.expose(), "tok-1");
	assert_eq!(issuer.calls(), 1);
}
