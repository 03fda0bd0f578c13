//! Time sources consulted by the token cache for expiry decisions.

// crates.io
use time::macros;
// self
use crate::_prelude::*;

/// Source of "now" for freshness checks.
///
/// The cache never schedules timers; it reads the clock lazily on every lookup, so a manual
/// implementation is enough to drive every expiry transition in tests.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall clock backed by [`OffsetDateTime::now_utc`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually advanced clock shared between clones.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	/// Moves the clock forward by `delta`.
	pub fn advance(&self, delta: Duration) {
		*self.0.lock() += delta;
	}

	/// Jumps to an absolute instant.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(macros::datetime!(2025-01-01 00:00 UTC))
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn manual_clock_clones_share_time() {
		let clock = ManualClock::default();
		let observer = clock.clone();
		let start = observer.now();

		clock.advance(Duration::seconds(100));

		assert_eq!(observer.now() - start, Duration::seconds(100));

		clock.set(macros::datetime!(2030-06-01 12:00 UTC));

		assert_eq!(observer.now(), macros::datetime!(2030-06-01 12:00 UTC));
	}
}
