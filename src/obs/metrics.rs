// self
use crate::obs::{CacheEvent, FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"aps_broker_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a cache decision via the global metrics recorder (when enabled).
pub fn record_cache_event(event: CacheEvent) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("aps_broker_token_cache_total", "event" => event.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = event;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_metrics() {
		record_flow_outcome(FlowKind::DataApi, FlowOutcome::Failure);
		record_cache_event(CacheEvent::Joined);
	}
}
