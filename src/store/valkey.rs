//! Redis/Valkey-backed [`CounterStore`] shared by every gateway instance.

// std
use std::time::Duration as StdDuration;
// crates.io
use async_lock::OnceCell;
use redis::{Client, Script, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	store::{CounterHit, CounterStore, StoreError, StoreFuture},
};

// Re-arms keys that lost their expiry so a window never becomes permanent.
const HIT_SCRIPT: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 or redis.call('PTTL', KEYS[1]) < 0 then
	redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return { count, redis.call('PTTL', KEYS[1]) }
";

/// Default bound on a single counter hit, connection setup included.
pub const DEFAULT_HIT_TIMEOUT: StdDuration = StdDuration::from_secs(2);

/// Counting store backed by a Redis-protocol server.
///
/// The connection is opened lazily on the first hit and re-established by the connection manager
/// after failures, so a server that is down at boot does not prevent the gateway from starting.
/// Every hit, including a pending connection attempt, is bounded by the hit timeout.
#[derive(Clone)]
pub struct ValkeyCounterStore {
	client: Client,
	connection: Arc<OnceCell<ConnectionManager>>,
	script: Arc<Script>,
	hit_timeout: StdDuration,
}
impl ValkeyCounterStore {
	/// Parses `url` (for example `redis://localhost:6379`) without connecting.
	pub fn open(url: &str) -> Result<Self, StoreError> {
		Ok(Self::with_client(Client::open(url).map_err(StoreError::backend)?))
	}

	/// Wraps an existing client.
	pub fn with_client(client: Client) -> Self {
		Self {
			client,
			connection: Arc::new(OnceCell::new()),
			script: Arc::new(Script::new(HIT_SCRIPT)),
			hit_timeout: DEFAULT_HIT_TIMEOUT,
		}
	}

	/// Overrides the bound applied to each hit.
	pub fn with_hit_timeout(mut self, hit_timeout: StdDuration) -> Self {
		self.hit_timeout = hit_timeout;

		self
	}

	async fn connection(&self) -> Result<ConnectionManager, StoreError> {
		self.connection
			.get_or_try_init(|| ConnectionManager::new(self.client.clone()))
			.await
			.cloned()
			.map_err(StoreError::backend)
	}

	async fn hit_unbounded(&self, key: &str, window_ms: i64) -> Result<CounterHit, StoreError> {
		let mut conn = self.connection().await?;
		let (count, ttl_ms): (u64, i64) = self
			.script
			.key(key)
			.arg(window_ms)
			.invoke_async(&mut conn)
			.await
			.map_err(StoreError::backend)?;

		Ok(CounterHit { count, ttl: Duration::milliseconds(ttl_ms.max(0)) })
	}
}
impl Debug for ValkeyCounterStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ValkeyCounterStore")
			.field("connected", &self.connection.is_initialized())
			.field("hit_timeout", &self.hit_timeout)
			.finish_non_exhaustive()
	}
}
impl CounterStore for ValkeyCounterStore {
	fn hit<'a>(&'a self, key: &'a str, window: Duration) -> StoreFuture<'a, CounterHit> {
		let window_ms = i64::try_from(window.whole_milliseconds()).unwrap_or(i64::MAX).max(1);

		Box::pin(async move {
			tokio::time::timeout(self.hit_timeout, self.hit_unbounded(key, window_ms))
				.await
				.map_err(|_| {
					StoreError::backend(format!(
						"counter hit timed out after {}ms",
						self.hit_timeout.as_millis()
					))
				})?
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn open_rejects_malformed_urls() {
		let err = ValkeyCounterStore::open("not a url").expect_err("Malformed URL must be rejected.");

		assert!(matches!(err, StoreError::Backend { .. }));
	}

	#[tokio::test]
	async fn unreachable_server_fails_within_hit_timeout() {
		let store = ValkeyCounterStore::open("redis://127.0.0.1:1")
			.expect("Well-formed URL should parse without connecting.")
			.with_hit_timeout(StdDuration::from_millis(500));
		let started = std::time::Instant::now();

		for _ in 0..2 {
			let err = store
				.hit("rate:alice:/login", Duration::seconds(60))
				.await
				.expect_err("Hit against a closed port must fail.");

			assert!(matches!(err, StoreError::Backend { .. }));
		}

		assert!(
			started.elapsed() < StdDuration::from_secs(5),
			"Unreachable store took {:?} to fail.",
			started.elapsed()
		);
		assert!(format!("{store:?}").contains("connected: false"));
	}
}
