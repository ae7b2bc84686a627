//! Domain Ports (Port/Adapter Pattern)
//!
//! Trait abstractions the order service depends on. Infrastructure adapters
//! implement them; tests substitute counting doubles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │  OrderCache │ OrderRepository │ OrderSource │ ...   │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  LruCache │ PostgresOrderRepository │ SpoolSource   │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::order::Order;
use crate::error::Result;

// =============================================================================
// Cache Port
// =============================================================================

/// In-memory order cache keyed by `order_uid`.
///
/// Implementations synchronize internally; callers share them by reference.
pub trait OrderCache: Send + Sync {
    /// Look up an order. A hit counts as an access for eviction purposes.
    fn get_order(&self, order_uid: &str) -> Option<Arc<Order>>;

    /// Insert or replace an order, resetting its expiry and recency.
    fn save_order(&self, order_uid: &str, order: Arc<Order>);
}

// =============================================================================
// Repository Port
// =============================================================================

/// Durable order storage.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Fetch one order. Fails with `Error::OrderNotFound` when absent.
    async fn get_order(&self, order_uid: &str) -> Result<Order>;

    /// Fetch up to `limit` orders, newest `date_created` first.
    ///
    /// Fails with `Error::OrdersNotFound` when the store is empty.
    async fn get_orders(&self, limit: usize) -> Result<Vec<Order>>;

    /// Persist an order atomically (header, delivery, payment and items).
    ///
    /// Saving an identifier that already exists is a silent no-op.
    async fn save_order(&self, order: &Order) -> Result<()>;
}

// =============================================================================
// Service Port
// =============================================================================

/// Lookup and save operations exposed to the API layer and ingestion.
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn get_order(&self, ctx: &CancellationToken, order_uid: &str) -> Result<Arc<Order>>;

    async fn save_order(&self, ctx: &CancellationToken, order: Order) -> Result<()>;
}

// =============================================================================
// Ingestion Source Port
// =============================================================================

/// A raw message handed out by an [`OrderSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    /// Source-specific message identity (file name, offset, ...)
    pub id: String,
    /// Undecoded payload
    pub payload: Vec<u8>,
}

/// At-least-once message source feeding the ingestion loop.
///
/// A fetched message that is never committed is delivered again by a later
/// consumer of the same source.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Next available message, or `None` if nothing is pending right now.
    async fn fetch(&self) -> Result<Option<SourceMessage>>;

    /// Acknowledge a message so it is not delivered again.
    async fn commit(&self, message: &SourceMessage) -> Result<()>;
}

// =============================================================================
// HTTP Metrics Port
// =============================================================================

/// Request accounting for the read API.
pub trait HttpMetrics: Send + Sync {
    fn inc_request(&self);

    fn observe_request(&self, start: Instant);
}
