//! Order Lookup Service
//!
//! Consumes order records from a message source, persists them durably and
//! serves point lookups by `order_uid` over HTTP. An in-memory LRU cache with
//! per-entry TTL sits in front of the store: reads go through it, writes go
//! to it first and then to the store.
//!
//! # Architecture
//!
//! ```text
//! OrderSource ─▶ ingest ─▶ ┌──────────────────┐ ─▶ OrderCache (LruCache)
//!                          │ CachedOrderService│
//! HTTP API ──────────────▶ └──────────────────┘ ─▶ OrderRepository (Postgres)
//! ```
//!
//! On startup the cache is warmed with the newest stored orders before the
//! API starts answering.
//!
//! # Modules
//!
//! - [`adapters`] - Infrastructure adapters implementing domain ports
//! - [`cache`] - Bounded LRU cache with TTL expiry
//! - [`config`] - YAML configuration
//! - [`domain`] - Order entity, validation and ports
//! - [`error`] - Error types
//! - [`ingest`] - Message ingestion loop
//! - [`server`] - HTTP API and ops endpoints
//! - [`service`] - Read-through / write-through order service

pub mod adapters;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod server;
pub mod service;

// Re-export commonly used types
pub use cache::{CacheConfig, LruCache, OrderLruCache};
pub use config::Config;
pub use domain::{Order, OrderRepository, OrderService};
pub use error::{Error, Result};
pub use service::CachedOrderService;
