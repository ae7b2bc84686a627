//! Order Cache Engine
//!
//! Bounded-capacity, TTL-based in-memory cache with least-recently-used
//! eviction, fronting the durable order store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     LruCache<K, V>                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  Mutex ┌──────────────────┐   ┌───────────────────────┐  │
//! │        │ HashMap<K, Entry>│   │ BTreeMap<tick, K>     │  │
//! │        │ value + deadline │◀─▶│ recency (first = LRU) │  │
//! │        └──────────────────┘   └───────────────────────┘  │
//! │                                                           │
//! │  Counters: hits / misses / evictions / expirations        │
//! └──────────────────────────────────────────────────────────┘
//!            ▲                                  ▲
//!            │ get / put                        │ purge_expired
//!      OrderService                          Janitor task
//! ```
//!
//! Expired entries are never served: `get` checks the deadline under the
//! lock and drops the entry on a late read.

mod entry;
mod janitor;
mod lru;
mod metrics;

pub use entry::CacheEntry;
pub use janitor::spawn_janitor;
pub use lru::{CacheConfig, LruCache, OrderLruCache, MAX_TTL};
pub use metrics::{CacheCounters, CacheStats};

/// Default number of cached orders
pub const DEFAULT_CAPACITY: usize = 1000;
