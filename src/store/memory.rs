//! Thread-safe in-memory store implementations for single-instance deployments and tests.

// crates.io
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	store::{CounterHit, CounterStore, StoreError, StoreFuture, UserStore},
	user::{UserProfile, UserRecord},
};

type CounterMap = Arc<Mutex<CounterTable>>;
type UserMap = Arc<RwLock<HashMap<Uuid, UserRecord>>>;

#[derive(Clone, Copy, Debug)]
struct CounterSlot {
	count: u64,
	expires_at: OffsetDateTime,
}

// Closed windows are swept once every this many hits.
const SWEEP_EVERY: u64 = 256;

#[derive(Debug, Default)]
struct CounterTable {
	slots: HashMap<String, CounterSlot>,
	hits_since_sweep: u64,
}
impl CounterTable {
	fn sweep(&mut self, now: OffsetDateTime) {
		self.slots.retain(|_, slot| slot.expires_at > now);
		self.hits_since_sweep = 0;
	}
}

/// Process-local counting store. Counters are not shared across instances.
///
/// Closed windows are dropped periodically while hits arrive, or on demand through
/// [`MemoryCounterStore::purge_expired`].
#[derive(Clone, Debug, Default)]
pub struct MemoryCounterStore(CounterMap);
impl MemoryCounterStore {
	/// Drops counters whose window has closed.
	pub fn purge_expired(&self) {
		let now = OffsetDateTime::now_utc();

		self.0.lock().sweep(now);
	}

	/// Number of live or stale counters currently held.
	pub fn len(&self) -> usize {
		self.0.lock().slots.len()
	}

	/// Returns `true` when no counter is held.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn hit_at(map: &CounterMap, key: &str, window: Duration, now: OffsetDateTime) -> CounterHit {
		let mut table = map.lock();

		table.hits_since_sweep += 1;

		if table.hits_since_sweep >= SWEEP_EVERY {
			table.sweep(now);
		}

		let slot =
			table.slots.entry(key.to_owned()).or_insert(CounterSlot { count: 0, expires_at: now });

		if slot.expires_at <= now {
			*slot = CounterSlot { count: 0, expires_at: now + window };
		}

		slot.count = slot.count.saturating_add(1);

		CounterHit { count: slot.count, ttl: slot.expires_at - now }
	}
}
impl CounterStore for MemoryCounterStore {
	fn hit<'a>(&'a self, key: &'a str, window: Duration) -> StoreFuture<'a, CounterHit> {
		let hit = Self::hit_at(&self.0, key, window, OffsetDateTime::now_utc());

		Box::pin(async move { Ok(hit) })
	}
}

/// Process-local user-record store.
#[derive(Clone, Debug, Default)]
pub struct MemoryUserStore(UserMap);
impl MemoryUserStore {
	fn insert_now(map: UserMap, record: UserRecord) -> Result<UserRecord, StoreError> {
		let mut guard = map.write();

		if guard.contains_key(&record.id) {
			return Err(StoreError::Backend { message: format!("user {} already exists", record.id) });
		}

		guard.insert(record.id, record.clone());

		Ok(record)
	}

	fn insert_if_absent_now(map: UserMap, record: UserRecord) -> UserRecord {
		let mut guard = map.write();

		if let Some(existing) =
			guard.values().find(|existing| existing.profile.username == record.profile.username)
		{
			return existing.clone();
		}

		guard.insert(record.id, record.clone());

		record
	}

	fn fetch_by_username_now(map: UserMap, username: &str) -> Option<UserRecord> {
		map.read().values().find(|record| record.profile.username == username).cloned()
	}

	fn list_now(map: UserMap) -> Vec<UserRecord> {
		let mut records = map.read().values().cloned().collect::<Vec<_>>();

		records.sort_by(|a, b| a.profile.username.cmp(&b.profile.username));

		records
	}

	fn update_now(map: UserMap, id: Uuid, profile: UserProfile) -> Option<UserRecord> {
		let mut guard = map.write();
		let record = guard.get_mut(&id)?;

		record.profile = profile;

		Some(record.clone())
	}
}
impl UserStore for MemoryUserStore {
	fn insert(&self, record: UserRecord) -> StoreFuture<'_, UserRecord> {
		let map = self.0.clone();

		Box::pin(async move { Self::insert_now(map, record) })
	}

	fn insert_if_absent(&self, record: UserRecord) -> StoreFuture<'_, UserRecord> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::insert_if_absent_now(map, record)) })
	}

	fn fetch(&self, id: Uuid) -> StoreFuture<'_, Option<UserRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(&id).cloned()) })
	}

	fn fetch_by_username<'a>(&'a self, username: &'a str) -> StoreFuture<'a, Option<UserRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::fetch_by_username_now(map, username)) })
	}

	fn list(&self) -> StoreFuture<'_, Vec<UserRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::list_now(map)) })
	}

	fn update(&self, id: Uuid, profile: UserProfile) -> StoreFuture<'_, Option<UserRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::update_now(map, id, profile)) })
	}

	fn delete(&self, id: Uuid) -> StoreFuture<'_, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(&id).is_some()) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn profile(username: &str) -> UserProfile {
		UserProfile { username: username.into(), ..Default::default() }
	}

	#[test]
	fn counter_arms_window_on_first_hit_only() {
		let map = CounterMap::default();
		let start = datetime!(2025-01-01 00:00 UTC);
		let window = Duration::seconds(60);
		let first = MemoryCounterStore::hit_at(&map, "rate:alice:/login", window, start);
		let second = MemoryCounterStore::hit_at(
			&map,
			"rate:alice:/login",
			window,
			start + Duration::seconds(20),
		);

		assert_eq!(first, CounterHit { count: 1, ttl: window });
		assert_eq!(second, CounterHit { count: 2, ttl: Duration::seconds(40) });
	}

	#[test]
	fn counter_resets_after_window_closes() {
		let map = CounterMap::default();
		let start = datetime!(2025-01-01 00:00 UTC);
		let window = Duration::seconds(60);

		for _ in 0..5 {
			MemoryCounterStore::hit_at(&map, "k", window, start);
		}

		let reopened = MemoryCounterStore::hit_at(&map, "k", window, start + window);

		assert_eq!(reopened, CounterHit { count: 1, ttl: window });
	}

	#[test]
	fn counters_are_independent_per_key() {
		let map = CounterMap::default();
		let now = datetime!(2025-01-01 00:00 UTC);

		MemoryCounterStore::hit_at(&map, "rate:alice:/a", Duration::seconds(60), now);

		let other = MemoryCounterStore::hit_at(&map, "rate:alice:/b", Duration::seconds(60), now);

		assert_eq!(other.count, 1);
	}

	#[test]
	fn closed_windows_are_swept_while_hits_arrive() {
		let store = MemoryCounterStore::default();
		let start = datetime!(2025-01-01 00:00 UTC);

		for i in 1..SWEEP_EVERY {
			let key = format!("rate:caller-{i}:/a");

			MemoryCounterStore::hit_at(&store.0, &key, Duration::seconds(1), start);
		}

		assert_eq!(store.len(), (SWEEP_EVERY - 1) as usize);

		MemoryCounterStore::hit_at(
			&store.0,
			"rate:live:/a",
			Duration::seconds(60),
			start + Duration::seconds(2),
		);

		assert_eq!(store.len(), 1);
	}

	#[tokio::test]
	async fn purge_drops_closed_windows() {
		let store = MemoryCounterStore::default();

		store.hit("short", Duration::ZERO).await.expect("Memory counter hit should succeed.");
		store.hit("long", Duration::minutes(5)).await.expect("Memory counter hit should succeed.");
		store.purge_expired();

		assert_eq!(store.len(), 1);
	}

	#[tokio::test]
	async fn user_store_crud_cycle() {
		let store = MemoryUserStore::default();
		let created = store
			.insert(UserRecord::new(profile("alice")))
			.await
			.expect("Insert should succeed for a fresh record.");

		store.insert(UserRecord::new(profile("bob"))).await.expect("Second insert should succeed.");

		let by_name = store
			.fetch_by_username("alice")
			.await
			.expect("Lookup should succeed.")
			.expect("Inserted user should be found by username.");

		assert_eq!(by_name.id, created.id);
		assert_eq!(
			store
				.list()
				.await
				.expect("Listing should succeed.")
				.iter()
				.map(|record| record.profile.username.as_str())
				.collect::<Vec<_>>(),
			vec!["alice", "bob"]
		);

		let updated = store
			.update(created.id, profile("alice2"))
			.await
			.expect("Update should succeed.")
			.expect("Existing record should be updated.");

		assert_eq!(updated.profile.username, "alice2");
		assert!(store.delete(created.id).await.expect("Delete should succeed."));
		assert!(!store.delete(created.id).await.expect("Second delete should succeed."));
		assert_eq!(store.fetch(created.id).await.expect("Fetch should succeed."), None);
	}

	#[tokio::test]
	async fn insert_if_absent_keeps_one_record_per_username() {
		let store = MemoryUserStore::default();
		let (first, second) = tokio::join!(
			store.insert_if_absent(UserRecord::new(profile("alice"))),
			store.insert_if_absent(UserRecord::new(profile("alice"))),
		);
		let first = first.expect("First conditional insert should succeed.");
		let second = second.expect("Second conditional insert should succeed.");

		assert_eq!(first.id, second.id);
		assert_eq!(store.list().await.expect("Listing should succeed.").len(), 1);
	}

	#[tokio::test]
	async fn duplicate_ids_are_rejected() {
		let store = MemoryUserStore::default();
		let record = UserRecord::new(profile("alice"));

		store.insert(record.clone()).await.expect("First insert should succeed.");

		let err = store.insert(record).await.expect_err("Duplicate id must be rejected.");

		assert!(matches!(err, StoreError::Backend { .. }));
	}
}
