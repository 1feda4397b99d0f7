//! A bounded memo store with a time-to-live and single-flight producers.

use crate::fingerprint::CacheKey;
use log::debug;
use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::{sync::OnceCell, time::Instant};

/// Default time a stored value stays fresh.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default maximum number of entries.
pub const DEFAULT_CAPACITY: usize = 128;

#[derive(Debug)]
struct Stamped<V> {
    value: V,
    stored_at: Instant,
}

struct Slot<V> {
    cell: Arc<OnceCell<Stamped<V>>>,
    last_used: u64,
}

struct Slots<V> {
    entries: HashMap<CacheKey, Slot<V>>,
    clock: u64,
}

/// Held by every caller of [`PointCache::get_or_try_compute`]. On drop,
/// whether after a failure or because the caller's future was dropped,
/// removes the slot if it is still empty and no other caller holds it.
struct SlotGuard<'a, V: Clone> {
    cache: &'a PointCache<V>,
    key: &'a CacheKey,
    cell: Arc<OnceCell<Stamped<V>>>,
}

impl<V: Clone> Drop for SlotGuard<'_, V> {
    fn drop(&mut self) {
        self.cache.discard_if_empty(self.key, &self.cell);
    }
}

/// Memoizes values by [`CacheKey`].
///
/// Every key maps to at most one entry. The first caller for a missing or
/// expired key runs its producer; concurrent callers for the same key wait
/// for that producer instead of running their own. A producer that fails,
/// or whose caller stops waiting, leaves nothing behind. When the store is
/// full the least recently used entry is evicted.
pub struct PointCache<V> {
    ttl: Duration,
    capacity: usize,
    slots: Mutex<Slots<V>>,
}

impl<V: Clone> PointCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> PointCache<V> {
        PointCache {
            ttl,
            capacity: capacity.max(1),
            slots: Mutex::new(Slots {
                entries: HashMap::new(),
                clock: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<V>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, cell: &OnceCell<Stamped<V>>, now: Instant) -> bool {
        cell.get()
            .is_some_and(|stamped| now.duration_since(stamped.stored_at) >= self.ttl)
    }

    /// The cell for `key`, creating it (and evicting if needed) when the
    /// key is absent or its value has expired.
    fn cell_for(&self, key: &CacheKey) -> Arc<OnceCell<Stamped<V>>> {
        let now = Instant::now();
        let mut slots = self.lock();
        slots.clock += 1;
        let tick = slots.clock;

        if let Some(slot) = slots.entries.get_mut(key) {
            if !self.is_expired(&slot.cell, now) {
                slot.last_used = tick;
                return slot.cell.clone();
            }
            debug!("Cache entry {} expired", key);
        }

        let cell = Arc::new(OnceCell::new());
        slots.entries.insert(
            key.clone(),
            Slot {
                cell: cell.clone(),
                last_used: tick,
            },
        );
        // Empty slots go first, then the least recently used.
        while slots.entries.len() > self.capacity {
            let oldest = slots
                .entries
                .iter()
                .filter(|(k, _)| *k != key)
                .min_by_key(|(_, slot)| (slot.cell.initialized(), slot.last_used))
                .map(|(k, _)| k.clone());
            match oldest {
                Some(oldest) => {
                    debug!("Evicting cache entry {}", oldest);
                    slots.entries.remove(&oldest);
                }
                None => break,
            }
        }
        cell
    }

    /// Drop the entry for `key` if it is still `cell`, never got a value
    /// and no caller other than the one discarding is waiting on it.
    fn discard_if_empty(&self, key: &CacheKey, cell: &Arc<OnceCell<Stamped<V>>>) {
        let mut slots = self.lock();
        // One reference from the map, one from the discarding caller.
        let unfilled = slots.entries.get(key).is_some_and(|slot| {
            Arc::ptr_eq(&slot.cell, cell)
                && !slot.cell.initialized()
                && Arc::strong_count(cell) <= 2
        });
        if unfilled {
            slots.entries.remove(key);
        }
    }

    /// Return the fresh value for `key`, or run `producer` once to make it.
    ///
    /// Errors from `producer` are returned to the caller and nothing is
    /// stored. Neither is anything stored when the returned future is
    /// dropped before it completes.
    pub async fn get_or_try_compute<F, Fut, E>(&self, key: &CacheKey, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let guard = SlotGuard {
            cache: self,
            key,
            cell: self.cell_for(key),
        };
        let mut computed = false;
        let outcome = guard
            .cell
            .get_or_try_init(|| {
                computed = true;
                async move {
                    let value = producer().await?;
                    Ok::<_, E>(Stamped {
                        value,
                        stored_at: Instant::now(),
                    })
                }
            })
            .await;
        let value = outcome?.value.clone();
        debug!(
            "Cache {} for {}",
            if computed { "miss" } else { "hit" },
            key
        );
        Ok(value)
    }

    /// Whether a fresh value is stored for `key`. Does not touch recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        self.lock()
            .entries
            .get(key)
            .is_some_and(|slot| slot.cell.initialized() && !self.is_expired(&slot.cell, now))
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Number of entries, including ones whose producer is still running.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for PointCache<V> {
    fn default() -> Self {
        PointCache::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use cpt_core::params::{QueryParameters, Scenario};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(lat: f64) -> CacheKey {
        fingerprint(&QueryParameters::new(lat, 0.0, 2010, 2050, Scenario::Ssp585).unwrap())
    }

    async fn counted(counter: &AtomicUsize, value: u32) -> Result<u32, String> {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(value)
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_runs_once_per_key() {
        let cache = PointCache::default();
        let counter = AtomicUsize::new(0);

        let first = cache.get_or_try_compute(&key(1.0), || counted(&counter, 7)).await;
        let second = cache.get_or_try_compute(&key(1.0), || counted(&counter, 8)).await;

        assert_eq!(first, Ok(7));
        assert_eq!(second, Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&key(1.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_producer() {
        let cache = PointCache::default();
        let counter = AtomicUsize::new(0);

        let (first_key, same_key) = (key(1.0), key(1.0));
        let (a, b) = tokio::join!(
            cache.get_or_try_compute(&first_key, || counted(&counter, 1)),
            cache.get_or_try_compute(&same_key, || counted(&counter, 2)),
        );

        assert_eq!(a, b);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_do_not_wait_on_each_other() {
        let cache = PointCache::default();
        let counter = AtomicUsize::new(0);

        let (one, two) = (key(1.0), key(2.0));
        let (a, b) = tokio::join!(
            cache.get_or_try_compute(&one, || counted(&counter, 1)),
            cache.get_or_try_compute(&two, || counted(&counter, 2)),
        );

        assert_eq!((a, b), (Ok(1), Ok(2)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_producer_leaves_no_entry() {
        let cache: PointCache<u32> = PointCache::default();
        let counter = AtomicUsize::new(0);

        let failed = cache
            .get_or_try_compute(&key(1.0), || async { Err::<u32, _>("gateway down".to_string()) })
            .await;
        assert_eq!(failed, Err("gateway down".to_string()));
        assert!(cache.is_empty());

        let retried = cache.get_or_try_compute(&key(1.0), || counted(&counter, 3)).await;
        assert_eq!(retried, Ok(3));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_producer_leaves_no_value() {
        let cache = PointCache::default();
        let counter = AtomicUsize::new(0);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cache.get_or_try_compute(&key(1.0), || counted(&counter, 1)),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(!cache.contains(&key(1.0)));
        assert!(cache.is_empty());

        let fresh = cache.get_or_try_compute(&key(1.0), || counted(&counter, 2)).await;
        assert_eq!(fresh, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_producers_do_not_evict_stored_values() {
        let cache = PointCache::new(DEFAULT_TTL, 2);
        let counter = AtomicUsize::new(0);
        cache.get_or_try_compute(&key(1.0), || counted(&counter, 1)).await.unwrap();

        for lat in [2.0, 3.0] {
            let cancelled = tokio::time::timeout(
                Duration::from_millis(10),
                cache.get_or_try_compute(&key(lat), || counted(&counter, 0)),
            )
            .await;
            assert!(cancelled.is_err());
            assert_eq!(cache.len(), 1);
        }

        assert!(cache.contains(&key(1.0)));
        let cached = cache.get_or_try_compute(&key(1.0), || counted(&counter, 9)).await;
        assert_eq!(cached, Ok(1));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_takes_over_a_cancelled_producer() {
        let cache = PointCache::default();
        let counter = AtomicUsize::new(0);

        let (first_key, same_key) = (key(1.0), key(1.0));
        let (cancelled, waited) = tokio::join!(
            tokio::time::timeout(
                Duration::from_millis(10),
                cache.get_or_try_compute(&first_key, || counted(&counter, 1)),
            ),
            cache.get_or_try_compute(&same_key, || counted(&counter, 2)),
        );

        assert!(cancelled.is_err());
        assert_eq!(waited, Ok(2));
        assert!(cache.contains(&key(1.0)));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_slots_are_evicted_before_stored_values() {
        let cache = PointCache::new(DEFAULT_TTL, 2);
        let counter = AtomicUsize::new(0);
        cache.get_or_try_compute(&key(1.0), || counted(&counter, 1)).await.unwrap();

        let (pending_key, newest_key) = (key(2.0), key(3.0));
        let (pending, newest) = tokio::join!(
            cache.get_or_try_compute(&pending_key, || counted(&counter, 2)),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                cache.get_or_try_compute(&newest_key, || counted(&counter, 3)).await
            },
        );

        // The in-flight slot for 2.0 was the one evicted, so its value is
        // returned but not kept.
        assert_eq!((pending, newest), (Ok(2), Ok(3)));
        assert!(cache.contains(&key(1.0)));
        assert!(!cache.contains(&key(2.0)));
        assert!(cache.contains(&key(3.0)));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_recomputed() {
        let cache = PointCache::new(Duration::from_secs(60), 8);
        let counter = AtomicUsize::new(0);

        cache.get_or_try_compute(&key(1.0), || counted(&counter, 1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let cached = cache.get_or_try_compute(&key(1.0), || counted(&counter, 2)).await;
        assert_eq!(cached, Ok(1));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!cache.contains(&key(1.0)));
        let refreshed = cache.get_or_try_compute(&key(1.0), || counted(&counter, 3)).await;
        assert_eq!(refreshed, Ok(3));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_least_recently_used_entry_is_evicted() {
        let cache = PointCache::new(DEFAULT_TTL, 2);
        let counter = AtomicUsize::new(0);

        cache.get_or_try_compute(&key(1.0), || counted(&counter, 1)).await.unwrap();
        cache.get_or_try_compute(&key(2.0), || counted(&counter, 2)).await.unwrap();
        // touch 1.0 so 2.0 becomes the oldest
        cache.get_or_try_compute(&key(1.0), || counted(&counter, 0)).await.unwrap();
        cache.get_or_try_compute(&key(3.0), || counted(&counter, 3)).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&key(1.0)));
        assert!(!cache.contains(&key(2.0)));
        assert!(cache.contains(&key(3.0)));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_and_clear() {
        let cache = PointCache::default();
        let counter = AtomicUsize::new(0);
        cache.get_or_try_compute(&key(1.0), || counted(&counter, 1)).await.unwrap();
        cache.get_or_try_compute(&key(2.0), || counted(&counter, 2)).await.unwrap();

        assert!(cache.invalidate(&key(1.0)));
        assert!(!cache.invalidate(&key(1.0)));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
