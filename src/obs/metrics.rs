// self
use crate::{
	limit::FailureMode,
	obs::{GatewayOp, OpOutcome},
};

/// Increments `credgate_op_total{op, outcome}` when the `metrics` feature is enabled.
pub fn record_op_outcome(op: GatewayOp, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("credgate_op_total", "op" => op.as_str(), "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	let _ = (op, outcome);
}

/// Increments `credgate_counter_store_failures_total{mode}` when the counting store is
/// unreachable.
pub fn record_counter_store_failure(mode: FailureMode) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"credgate_counter_store_failures_total",
			"mode" => failure_mode_label(mode)
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	let _ = failure_mode_label(mode);
}

fn failure_mode_label(mode: FailureMode) -> &'static str {
	match mode {
		FailureMode::FailClosed => "fail_closed",
		FailureMode::FailOpen => "fail_open",
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn failure_modes_have_distinct_labels() {
		assert_eq!(failure_mode_label(FailureMode::FailClosed), "fail_closed");
		assert_eq!(failure_mode_label(FailureMode::FailOpen), "fail_open");

		record_counter_store_failure(FailureMode::FailOpen);
		record_op_outcome(GatewayOp::RateLimit, OpOutcome::Attempt);
	}
}
