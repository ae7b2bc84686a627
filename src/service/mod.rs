//! Order Service
//!
//! Orchestrates the cache and the durable store: read-through lookups,
//! write-through saves, and cache repopulation at startup.

mod order_service;

pub use order_service::CachedOrderService;
