//! Fixed-window rate limiting keyed on caller identity.
//!
//! Each admission performs one atomic increment on the shared [`CounterStore`]. The window opens
//! on the first hit for a key and closes when the store expires it; the next hit opens a fresh
//! window. Counts above the quota are rejected until then.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	obs::{self, GatewayOp, OpOutcome, OpSpan},
	store::CounterStore,
};

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::seconds(60);
/// Default number of admitted requests per window.
pub const DEFAULT_QUOTA: u64 = 5;

/// How counter keys are scoped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitScope {
	/// One counter per identity and request path: `rate:<identity>:<path>`.
	PerPath,
	/// One counter per identity under a fixed namespace: `<namespace>:<identity>`.
	Fixed(String),
}
impl RateLimitScope {
	/// Builds the counter key for `identity` on `path`.
	pub fn key(&self, identity: &str, path: &str) -> String {
		match self {
			Self::PerPath => format!("rate:{identity}:{path}"),
			Self::Fixed(namespace) => format!("{namespace}:{identity}"),
		}
	}
}

/// Behaviour when the counting store cannot be reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailureMode {
	/// Reject the request with [`Error::LimiterUnavailable`].
	#[default]
	FailClosed,
	/// Admit the request unmetered and log a warning.
	FailOpen,
}

/// Limiter configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
	/// Window length armed on the first hit.
	pub window: Duration,
	/// Admitted requests per window.
	pub quota: u64,
	/// Counter key scoping.
	pub scope: RateLimitScope,
	/// Store failure behaviour.
	pub failure_mode: FailureMode,
}
impl RateLimitPolicy {
	/// Per-path policy with default window and quota.
	pub fn per_path() -> Self {
		Self {
			window: DEFAULT_WINDOW,
			quota: DEFAULT_QUOTA,
			scope: RateLimitScope::PerPath,
			failure_mode: FailureMode::default(),
		}
	}

	/// Login-only policy keyed `login_rate:<username>`.
	pub fn login() -> Self {
		Self { scope: RateLimitScope::Fixed("login_rate".into()), ..Self::per_path() }
	}

	/// Overrides the window length.
	pub fn with_window(mut self, window: Duration) -> Self {
		self.window = window;

		self
	}

	/// Overrides the quota.
	pub fn with_quota(mut self, quota: u64) -> Self {
		self.quota = quota;

		self
	}

	/// Overrides the store failure behaviour.
	pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
		self.failure_mode = failure_mode;

		self
	}

	/// Ensures the window is positive and the quota admits at least one request.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.window.is_positive() {
			return Err(ConfigError::InvalidRateLimit { reason: "window must be positive" });
		}
		if self.quota == 0 {
			return Err(ConfigError::InvalidRateLimit { reason: "quota must be at least 1" });
		}

		Ok(())
	}
}
impl Default for RateLimitPolicy {
	fn default() -> Self {
		Self::per_path()
	}
}

/// Successful admission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
	/// Request counted against the quota.
	Counted {
		/// Post-increment count.
		count: u64,
		/// Requests left in the current window.
		remaining: u64,
	},
	/// Store was unreachable and the policy fails open.
	Unmetered,
}

/// Identity-keyed fixed-window limiter.
#[derive(Clone)]
pub struct RateLimiter {
	store: Arc<dyn CounterStore>,
	policy: RateLimitPolicy,
}
impl RateLimiter {
	/// Creates a limiter over `store`.
	pub fn new(store: Arc<dyn CounterStore>, policy: RateLimitPolicy) -> Self {
		Self { store, policy }
	}

	/// Active policy.
	pub fn policy(&self) -> &RateLimitPolicy {
		&self.policy
	}

	/// Counts one request for `identity` on `path` and decides whether to admit it.
	pub async fn admit(&self, identity: &str, path: &str) -> Result<Admission> {
		const OP: GatewayOp = GatewayOp::RateLimit;

		let span = OpSpan::new(OP, "admit");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let key = self.policy.scope.key(identity, path);
		let hit = match span.instrument(self.store.hit(&key, self.policy.window)).await {
			Ok(hit) => hit,
			Err(source) => {
				obs::record_op_outcome(OP, OpOutcome::Failure);
				obs::record_counter_store_failure(self.policy.failure_mode);

				return match self.policy.failure_mode {
					FailureMode::FailClosed => Err(Error::LimiterUnavailable { source }),
					FailureMode::FailOpen => {
						span.warn(&format_args!("counting store unavailable, admitting: {source}"));

						Ok(Admission::Unmetered)
					},
				};
			},
		};

		if hit.count > self.policy.quota {
			obs::record_op_outcome(OP, OpOutcome::Rejected);

			return Err(Error::RateLimited { retry_after: Some(hit.ttl) });
		}

		obs::record_op_outcome(OP, OpOutcome::Success);

		Ok(Admission::Counted { count: hit.count, remaining: self.policy.quota - hit.count })
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter").field("policy", &self.policy).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::{CounterHit, MemoryCounterStore, StoreError, StoreFuture};

	struct UnreachableStore;
	impl CounterStore for UnreachableStore {
		fn hit<'a>(&'a self, _: &'a str, _: Duration) -> StoreFuture<'a, CounterHit> {
			Box::pin(async { Err(StoreError::backend("connection refused")) })
		}
	}

	#[test]
	fn scope_builds_expected_keys() {
		assert_eq!(RateLimitScope::PerPath.key("alice", "/login"), "rate:alice:/login");
		assert_eq!(RateLimitPolicy::login().scope.key("alice", "/login"), "login_rate:alice");
	}

	#[test]
	fn policy_validation_rejects_degenerate_values() {
		assert!(RateLimitPolicy::default().validate().is_ok());
		assert!(RateLimitPolicy::default().with_quota(0).validate().is_err());
		assert!(RateLimitPolicy::default().with_window(Duration::ZERO).validate().is_err());
	}

	#[tokio::test]
	async fn sixth_request_in_window_is_rejected() {
		let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::default()), RateLimitPolicy::default());

		for expected in 1..=5 {
			let admission =
				limiter.admit("alice", "/credential/issue").await.expect("Request within quota should pass.");

			assert_eq!(admission, Admission::Counted { count: expected, remaining: 5 - expected });
		}

		let err = limiter
			.admit("alice", "/credential/issue")
			.await
			.expect_err("Sixth request must exceed the quota.");

		match err {
			Error::RateLimited { retry_after: Some(retry_after) } => {
				assert!(retry_after.is_positive() && retry_after <= DEFAULT_WINDOW);
			},
			other => panic!("Expected a rate limit rejection, got {other:?}."),
		}
	}

	#[tokio::test]
	async fn quotas_are_independent_per_identity_and_path() {
		let limiter = RateLimiter::new(
			Arc::new(MemoryCounterStore::default()),
			RateLimitPolicy::default().with_quota(1),
		);

		limiter.admit("alice", "/a").await.expect("First alice request should pass.");
		limiter.admit("bob", "/a").await.expect("Each identity should get a separate counter.");
		limiter.admit("alice", "/b").await.expect("Each path should get a separate counter.");
		assert!(limiter.admit("alice", "/a").await.is_err());
	}

	#[tokio::test]
	async fn store_failure_follows_failure_mode() {
		let closed = RateLimiter::new(Arc::new(UnreachableStore), RateLimitPolicy::default());
		let open = RateLimiter::new(
			Arc::new(UnreachableStore),
			RateLimitPolicy::default().with_failure_mode(FailureMode::FailOpen),
		);

		assert!(matches!(
			closed.admit("alice", "/login").await,
			Err(Error::LimiterUnavailable { .. })
		));
		assert_eq!(
			open.admit("alice", "/login").await.expect("Fail-open limiter should admit."),
			Admission::Unmetered
		);
	}
}
