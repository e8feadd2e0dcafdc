//! Storage contracts: the shared counting store behind the rate limiter and the user-record store.

pub mod memory;
#[cfg(feature = "redis")] pub mod valkey;

pub use memory::{MemoryCounterStore, MemoryUserStore};
#[cfg(feature = "redis")] pub use valkey::ValkeyCounterStore;

// crates.io
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	user::{UserProfile, UserRecord},
};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Atomic counting store shared by every gateway instance.
pub trait CounterStore
where
	Self: Send + Sync,
{
	/// Atomically increments `key` and arms its expiry to `window` when the increment created the
	/// counter.
	///
	/// Counters never live forever: a counter observed without an expiry is re-armed.
	fn hit<'a>(&'a self, key: &'a str, window: Duration) -> StoreFuture<'a, CounterHit>;
}

/// Counter state observed right after an increment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterHit {
	/// Post-increment count for the current window.
	pub count: u64,
	/// Time left until the window closes.
	pub ttl: Duration,
}

/// Persistence contract for local user records.
pub trait UserStore
where
	Self: Send + Sync,
{
	/// Persists a new record.
	fn insert(&self, record: UserRecord) -> StoreFuture<'_, UserRecord>;

	/// Persists `record` unless one with the same username exists, and returns the stored record.
	///
	/// The check and the write happen atomically.
	fn insert_if_absent(&self, record: UserRecord) -> StoreFuture<'_, UserRecord>;

	/// Fetches a record by id.
	fn fetch(&self, id: Uuid) -> StoreFuture<'_, Option<UserRecord>>;

	/// Fetches a record by username.
	fn fetch_by_username<'a>(&'a self, username: &'a str) -> StoreFuture<'a, Option<UserRecord>>;

	/// Lists every record.
	fn list(&self) -> StoreFuture<'_, Vec<UserRecord>>;

	/// Replaces the profile of an existing record.
	fn update(&self, id: Uuid, profile: UserProfile) -> StoreFuture<'_, Option<UserRecord>>;

	/// Deletes a record, returning `true` when it existed.
	fn delete(&self, id: Uuid) -> StoreFuture<'_, bool>;
}

/// Error type produced by [`CounterStore`] and [`UserStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl StoreError {
	/// Wraps any displayable backend failure.
	pub fn backend(err: impl Display) -> Self {
		Self::Backend { message: err.to_string() }
	}
}
