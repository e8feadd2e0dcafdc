//! Optional observability helpers for gateway operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `credgate.op` with the `op` (operation) and
//!   `stage` (call site or issuance stage) fields.
//! - Enable `metrics` to increment the `credgate_op_total` counter for every
//!   attempt/success/failure/rejection, labeled by `op` + `outcome`, and
//!   `credgate_counter_store_failures_total{mode}` whenever the counting store is unreachable.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Gateway operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GatewayOp {
	/// Quota admission.
	RateLimit,
	/// Password grant relayed to the identity provider.
	Login,
	/// User provisioning at the identity provider.
	RegisterUser,
	/// Credential issuance plus offer fetch.
	IssueCredential,
	/// Presentation verification.
	VerifyCredential,
	/// Issuer onboarding.
	OnboardIssuer,
}
impl GatewayOp {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GatewayOp::RateLimit => "rate_limit",
			GatewayOp::Login => "login",
			GatewayOp::RegisterUser => "register_user",
			GatewayOp::IssueCredential => "issue_credential",
			GatewayOp::VerifyCredential => "verify_credential",
			GatewayOp::OnboardIssuer => "onboard_issuer",
		}
	}
}
impl Display for GatewayOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a gateway operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Request refused by policy (quota or role).
	Rejected,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
			OpOutcome::Rejected => "rejected",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
