//! Time-to-live result cache.
//!
//! A generic keyed store whose entries expire `ttl` after their last write.
//! Expiry is observed lazily on read and, when a Tokio runtime is available,
//! eagerly by a per-key timer task. Eager expiry needs the runtime's time
//! driver (`enable_time` or `enable_all`); on a runtime built without it the
//! timer task fails on its first sleep, its handle is reaped, and the cache
//! falls back to lazy expiry. Both paths use the same liveness
//! predicate ([`CacheEntry::is_expired_at`]) against the injected [`Clock`],
//! so they never disagree about whether an entry is alive.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Slack added to timer sleeps so that the timer wakes strictly after the
/// entry's expiry instant.
const EXPIRY_GRACE: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache TTL must be at least one millisecond")]
    InvalidTtl,
}

/// Source of "now" for expiry decisions, in milliseconds since the epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Stored value plus the metadata needed to decide liveness
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub data: V,
    /// Write time, milliseconds since the epoch
    pub created_at: i64,
    pub ttl_millis: u64,
    generation: u64,
}

impl<V> CacheEntry<V> {
    /// Expired once strictly more than `ttl_millis` have elapsed since the write.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        u64::try_from(now_millis.saturating_sub(self.created_at))
            .map(|age| age > self.ttl_millis)
            .unwrap_or(false)
    }
}

/// Hit/miss counters and current size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerOutcome {
    Expired,
    /// Entry was removed or rewritten since the timer was armed
    Superseded,
    /// The clock says the entry is still live for this long
    NotYet(Duration),
}

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    timers: HashMap<K, ArmedTimer>,
    next_generation: u64,
    hits: u64,
    misses: u64,
}

impl<K: Eq + Hash, V> Inner<K, V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            timers: HashMap::new(),
            next_generation: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Drop the entry and cancel its timer. Safe to call on absent keys.
    fn purge(&mut self, key: &K) -> Option<CacheEntry<V>> {
        if let Some(timer) = self.timers.remove(key) {
            timer.handle.abort();
        }
        self.entries.remove(key)
    }

    /// Timer callback: remove the entry only if it is still the write the
    /// timer was armed for and the clock agrees it has expired.
    fn expire_from_timer(&mut self, key: &K, generation: u64, now_millis: i64) -> TimerOutcome {
        let outcome = match self.entries.get(key) {
            Some(entry) if entry.generation == generation => {
                if entry.is_expired_at(now_millis) {
                    TimerOutcome::Expired
                } else {
                    let age =
                        u64::try_from(now_millis.saturating_sub(entry.created_at)).unwrap_or(0);
                    let remaining = entry.ttl_millis.saturating_sub(age);
                    TimerOutcome::NotYet(Duration::from_millis(remaining))
                }
            }
            _ => TimerOutcome::Superseded,
        };

        match outcome {
            TimerOutcome::Expired => {
                self.entries.remove(key);
                self.release_timer(key, generation);
            }
            TimerOutcome::Superseded => self.release_timer(key, generation),
            TimerOutcome::NotYet(_) => {}
        }
        outcome
    }

    /// Forget the timer handle for `key` if it belongs to `generation`.
    fn release_timer(&mut self, key: &K, generation: u64) {
        if self
            .timers
            .get(key)
            .is_some_and(|timer| timer.generation == generation)
        {
            self.timers.remove(key);
        }
    }

    /// Forget handles whose task has already ended, including tasks that
    /// panicked because the runtime has no time driver.
    fn reap_finished_timers(&mut self) {
        self.timers.retain(|_, timer| !timer.handle.is_finished());
    }

    fn abort_timers(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
    }
}

/// Generic TTL cache keyed by `K`.
///
/// All state sits behind a single mutex, so `set`, `get` and `clear` are
/// atomic with respect to each other.
pub struct TtlCache<K, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
    clock: Arc<dyn Clock>,
    eager_expiry: bool,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Cache on the wall clock with eager expiry enabled.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Cache on an injected clock with eager expiry enabled.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::new())),
            clock,
            eager_expiry: true,
        }
    }

    /// Enable or disable timer-based expiry. Lazy expiry always applies.
    pub fn eager_expiry(mut self, enabled: bool) -> Self {
        self.eager_expiry = enabled;
        self
    }

    /// Insert or overwrite `key`. Overwriting resets the expiry clock and
    /// cancels the timer armed by the previous write.
    pub fn set(&self, key: K, value: V, ttl: Duration) -> Result<(), CacheError> {
        let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        if ttl_millis == 0 {
            return Err(CacheError::InvalidTtl);
        }

        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();

        inner.next_generation += 1;
        let generation = inner.next_generation;

        if let Some(previous) = inner.timers.remove(&key) {
            previous.handle.abort();
        }
        inner.reap_finished_timers();

        inner.entries.insert(
            key.clone(),
            CacheEntry {
                data: value,
                created_at: now,
                ttl_millis,
                generation,
            },
        );

        if self.eager_expiry {
            if let Some(handle) = self.arm_timer(key.clone(), generation, ttl) {
                inner.timers.insert(key, ArmedTimer { generation, handle });
            }
        }

        Ok(())
    }

    /// Insert with a TTL expressed in whole seconds.
    pub fn set_secs(&self, key: K, value: V, ttl_seconds: u64) -> Result<(), CacheError> {
        self.set(key, value, Duration::from_secs(ttl_seconds))
    }

    /// Live value for `key`. Expired entries are purged on the way out.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                inner.misses += 1;
                return None;
            }
        };

        if expired {
            inner.purge(key);
            inner.misses += 1;
            trace!("Purged expired cache entry on read");
            return None;
        }

        inner.hits += 1;
        inner.entries.get(key).map(|entry| entry.data.clone())
    }

    /// Equivalent to `get(key).is_some()`.
    pub fn has(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Remove `key` regardless of liveness, returning the stored value.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().purge(key).map(|entry| entry.data)
    }

    /// Remove every entry and cancel every pending timer. Idempotent.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.abort_timers();
    }

    /// Sweep out all expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();

        let expired: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.purge(key);
        }
        expired.len()
    }

    /// Physically stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timers armed and not yet fired or cancelled
    pub fn pending_timers(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.reap_finished_timers();
        inner.timers.len()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }

    /// Spawn the eager-expiry task for one write. Without a runtime, or on a
    /// runtime without a time driver, only lazy expiry applies.
    fn arm_timer(&self, key: K, generation: u64, ttl: Duration) -> Option<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let inner: Weak<Mutex<Inner<K, V>>> = Arc::downgrade(&self.inner);
        let clock = Arc::clone(&self.clock);

        Some(runtime.spawn(async move {
            let mut wait = ttl;
            loop {
                tokio::time::sleep(wait + EXPIRY_GRACE).await;

                let Some(inner) = inner.upgrade() else {
                    return;
                };
                let outcome = inner
                    .lock()
                    .expire_from_timer(&key, generation, clock.now_millis());
                match outcome {
                    TimerOutcome::Expired => {
                        debug!(generation, "Cache entry expired by timer");
                        return;
                    }
                    TimerOutcome::Superseded => return,
                    TimerOutcome::NotYet(remaining) => wait = remaining,
                }
            }
        }))
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for TtlCache<K, V> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        for (_, timer) in inner.timers.drain() {
            timer.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct TxKey(&'static str);

    fn manual_cache() -> (Arc<ManualClock>, TtlCache<TxKey, u32>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = TtlCache::with_clock(clock.clone()).eager_expiry(false);
        (clock, cache)
    }

    #[test]
    fn test_set_then_get() {
        let (_, cache) = manual_cache();
        cache.set(TxKey("a"), 1, Duration::from_secs(5)).unwrap();

        assert_eq!(cache.get(&TxKey("a")), Some(1));
        assert!(cache.has(&TxKey("a")));
        assert_eq!(cache.get(&TxKey("b")), None);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (clock, cache) = manual_cache();
        cache.set(TxKey("a"), 1, Duration::from_millis(500)).unwrap();

        clock.advance(Duration::from_millis(500));
        assert_eq!(cache.get(&TxKey("a")), Some(1), "live at exactly ttl");

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get(&TxKey("a")), None);
        assert_eq!(cache.len(), 0, "expired entry purged on read");
    }

    #[test]
    fn test_overwrite_resets_expiry() {
        let (clock, cache) = manual_cache();
        cache.set(TxKey("a"), 1, Duration::from_millis(1000)).unwrap();

        clock.advance(Duration::from_millis(600));
        cache.set(TxKey("a"), 2, Duration::from_millis(1000)).unwrap();

        clock.advance(Duration::from_millis(600));
        assert_eq!(cache.get(&TxKey("a")), Some(2));

        clock.advance(Duration::from_millis(401));
        assert_eq!(cache.get(&TxKey("a")), None);
    }

    #[test]
    fn test_clear_removes_everything() {
        let (_, cache) = manual_cache();
        for key in ["a", "b", "c"] {
            cache.set_secs(TxKey(key), 7, 60).unwrap();
        }

        cache.clear();
        for key in ["a", "b", "c"] {
            assert!(!cache.has(&TxKey(key)));
        }

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let (_, cache) = manual_cache();
        assert_eq!(
            cache.set(TxKey("a"), 1, Duration::ZERO),
            Err(CacheError::InvalidTtl)
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let (clock, cache) = manual_cache();
        cache.set(TxKey("short"), 1, Duration::from_millis(100)).unwrap();
        cache.set(TxKey("long"), 2, Duration::from_secs(60)).unwrap();

        clock.advance(Duration::from_millis(200));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&TxKey("long")), Some(2));
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let (_, cache) = manual_cache();
        cache.set_secs(TxKey("a"), 1, 60).unwrap();

        cache.get(&TxKey("a"));
        cache.get(&TxKey("a"));
        cache.get(&TxKey("missing"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_timers_without_runtime() {
        let cache: TtlCache<TxKey, u32> = TtlCache::new();
        cache.set_secs(TxKey("a"), 1, 60).unwrap();
        assert_eq!(cache.pending_timers(), 0);
        assert_eq!(cache.get(&TxKey("a")), Some(1));
    }

    #[test]
    fn test_runtime_without_time_driver_falls_back_to_lazy_expiry() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let cache: TtlCache<TxKey, u32> = TtlCache::with_clock(clock.clone());

        runtime.block_on(async {
            cache.set(TxKey("a"), 1, Duration::from_millis(10)).unwrap();
            for _ in 0..16 {
                if cache.pending_timers() == 0 {
                    break;
                }
                tokio::task::yield_now().await;
            }
        });

        assert_eq!(cache.pending_timers(), 0);
        assert_eq!(cache.get(&TxKey("a")), Some(1));

        clock.advance(Duration::from_millis(11));
        assert_eq!(cache.get(&TxKey("a")), None);
    }

    #[tokio::test]
    async fn test_timer_expires_entry_eagerly() {
        let cache: TtlCache<TxKey, u32> = TtlCache::new();
        cache.set(TxKey("a"), 1, Duration::from_millis(20)).unwrap();
        assert_eq!(cache.pending_timers(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.pending_timers(), 0);
    }

    #[tokio::test]
    async fn test_overwrite_cancels_stale_timer() {
        let cache: TtlCache<TxKey, u32> = TtlCache::new();
        cache.set(TxKey("a"), 1, Duration::from_millis(30)).unwrap();
        cache.set(TxKey("a"), 2, Duration::from_secs(60)).unwrap();
        assert_eq!(cache.pending_timers(), 1);

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&TxKey("a")), Some(2));
    }

    #[tokio::test]
    async fn test_clear_cancels_timers() {
        let cache: TtlCache<TxKey, u32> = TtlCache::new();
        cache.set_secs(TxKey("a"), 1, 60).unwrap();
        cache.set_secs(TxKey("b"), 2, 60).unwrap();
        assert_eq!(cache.pending_timers(), 2);

        cache.clear();
        assert_eq!(cache.pending_timers(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_timer_defers_to_clock() {
        let clock = Arc::new(ManualClock::new(0));
        let cache: TtlCache<TxKey, u32> = TtlCache::with_clock(clock.clone());
        cache.set(TxKey("a"), 1, Duration::from_millis(10)).unwrap();

        // The timer fires, but the injected clock has not moved.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&TxKey("a")), Some(1));

        clock.advance(Duration::from_millis(11));
        assert_eq!(cache.get(&TxKey("a")), None);
    }
}
