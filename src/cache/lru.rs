//! LRU Cache with TTL
//!
//! Bounded, time-expiring key-value store.
//!
//! # Design
//!
//! - Single `Mutex` guarding the map and the recency index, so every
//!   get/put is linearizable per key
//! - Recency index is a `BTreeMap` from a monotonically increasing access
//!   tick to the key; the first entry is the least recently used
//! - Deadline index orders keys by expiry, so dropping expired entries only
//!   visits the expired ones
//! - Lazy expiry on read, plus [`LruCache::purge_expired`] for sweeping

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::entry::CacheEntry;
use super::metrics::{CacheCounters, CacheStats};
use crate::domain::{Order, OrderCache};
use crate::error::{Error, Result};

/// Longest accepted entry lifetime (ten years)
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub capacity: usize,
    /// Lifetime of an entry after insert or refresh
    pub ttl: Duration,
}

impl CacheConfig {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self { capacity, ttl }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Config("cache capacity must be positive".into()));
        }
        if self.ttl.is_zero() {
            return Err(Error::Config("cache ttl must be positive".into()));
        }
        if self.ttl > MAX_TTL {
            return Err(Error::Config(format!(
                "cache ttl must be at most {}s, got {}s",
                MAX_TTL.as_secs(),
                self.ttl.as_secs()
            )));
        }
        Ok(())
    }
}

struct Inner<K, V> {
    map: HashMap<K, CacheEntry<V>>,
    recency: BTreeMap<u64, K>,
    deadlines: BTreeMap<(Instant, u64), K>,
    clock: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn unlink<Q>(&mut self, key: &Q) -> Option<CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.map.remove(key)?;
        self.recency.remove(&entry.tick());
        self.deadlines.remove(&entry.deadline());
        Some(entry)
    }

    /// Pop entries off the front of the deadline index while they are due.
    fn drop_expired(&mut self, now: Instant) -> usize {
        let mut dropped = 0;
        while let Some(first) = self.deadlines.first_entry() {
            if first.key().0 > now {
                break;
            }
            let key = first.remove();
            if let Some(entry) = self.map.remove(&key) {
                self.recency.remove(&entry.tick());
            }
            dropped += 1;
        }
        dropped
    }

    fn pop_lru(&mut self) -> Option<(K, CacheEntry<V>)> {
        let (_, key) = self.recency.pop_first()?;
        let entry = self.map.remove(&key)?;
        self.deadlines.remove(&entry.deadline());
        Some((key, entry))
    }
}

/// Thread-safe LRU cache with a per-entry TTL.
pub struct LruCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    config: CacheConfig,
    counters: CacheCounters,
}

/// The cache the order service runs with.
pub type OrderLruCache = LruCache<String, Arc<Order>>;

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache; fails when capacity or ttl is zero, or ttl exceeds [`MAX_TTL`].
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Mutex::new(Inner {
                map: HashMap::with_capacity(config.capacity),
                recency: BTreeMap::new(),
                deadlines: BTreeMap::new(),
                clock: 0,
            }),
            config,
            counters: CacheCounters::new(),
        })
    }

    /// Get a live entry, marking it most recently used.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let expired = match inner.map.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.counters.record_miss();
                return None;
            }
        };

        if expired {
            inner.unlink(key);
            self.counters.record_expirations(1);
            self.counters.record_miss();
            return None;
        }

        let tick = inner.next_tick();
        let (owned_key, entry) = inner.map.get_key_value(key)?;
        let (owned_key, old_tick) = (owned_key.clone(), entry.tick());
        inner.recency.remove(&old_tick);
        inner.recency.insert(tick, owned_key);

        let entry = inner.map.get_mut(key)?;
        entry.touch(tick);
        self.counters.record_hit();
        Some(entry.value().clone())
    }

    /// Insert or replace an entry, restarting its TTL and recency.
    ///
    /// A new key arriving at a full cache first drops expired entries and,
    /// if the cache is still full, evicts the least recently used one.
    pub fn put(&self, key: K, value: V) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(self.config.ttl)
            .unwrap_or_else(|| now + MAX_TTL);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let tick = inner.next_tick();

        if let Some(entry) = inner.map.get_mut(&key) {
            inner.recency.remove(&entry.tick());
            inner.deadlines.remove(&entry.deadline());
            entry.refresh(value, expires_at, tick);
            inner.recency.insert(tick, key.clone());
            inner.deadlines.insert(entry.deadline(), key);
            return;
        }

        if inner.map.len() >= self.config.capacity {
            let expired = inner.drop_expired(now);
            self.counters.record_expirations(expired as u64);
        }
        if inner.map.len() >= self.config.capacity && inner.pop_lru().is_some() {
            self.counters.record_eviction();
        }

        let entry = CacheEntry::new(value, expires_at, tick);
        inner.recency.insert(tick, key.clone());
        inner.deadlines.insert(entry.deadline(), key.clone());
        inner.map.insert(key, entry);
    }

    /// True if a live entry exists. Does not count as an access.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.inner
            .lock()
            .map
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Remove an entry, returning its value if it was still live.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let entry = self.inner.lock().unlink(key)?;
        (!entry.is_expired(now)).then(|| entry.into_value())
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let purged = self.inner.lock().drop_expired(Instant::now());
        self.counters.record_expirations(purged as u64);
        purged
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.recency.clear();
        inner.deadlines.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.config.capacity,
            hits: self.counters.hits(),
            misses: self.counters.misses(),
            evictions: self.counters.evictions(),
            expirations: self.counters.expirations(),
        }
    }
}

impl OrderCache for OrderLruCache {
    fn get_order(&self, order_uid: &str) -> Option<Arc<Order>> {
        self.get(order_uid)
    }

    fn save_order(&self, order_uid: &str, order: Arc<Order>) {
        self.put(order_uid.to_string(), order);
    }
}

// =============================================================================
// Tests
// =============================================================================
