//! Optional observability helpers for token acquisitions, cache decisions, and Data API calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `aps_broker.flow` with the `flow` and `stage`
//!   (call site) fields, plus debug events for every cache decision.
//! - Enable `metrics` to increment the `aps_broker_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and the
//!   `aps_broker_token_cache_total` counter labeled by `event`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Client-credentials exchange against the token endpoint.
	TokenAcquisition,
	/// Data Management pass-through request.
	DataApi,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::TokenAcquisition => "token_acquisition",
			FlowKind::DataApi => "data_api",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an instrumented operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Decisions taken by the token cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEvent {
	/// A valid credential was served without contacting the issuer.
	Hit,
	/// The caller joined an acquisition that was already in flight.
	Joined,
	/// The caller started a new acquisition.
	Acquire,
	/// An acquisition settled successfully and installed a credential.
	Acquired,
	/// An acquisition settled with a failure.
	Failed,
}
impl CacheEvent {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheEvent::Hit => "hit",
			CacheEvent::Joined => "joined",
			CacheEvent::Acquire => "acquire",
			CacheEvent::Acquired => "acquired",
			CacheEvent::Failed => "failed",
		}
	}
}
impl Display for CacheEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
