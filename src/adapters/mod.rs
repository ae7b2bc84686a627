//! Infrastructure Adapters
//!
//! Adapter implementations for the domain ports, following the
//! Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  OrderRepository │ OrderSource │ HttpMetrics               │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ PostgresOrderRepository │ InMemoryOrderRepository          │ │
//! │  │ SpoolDirectorySource │ MemorySource │ PrometheusHttpMetrics│ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod memory;
mod postgres;
mod prometheus;
mod spool;

pub use self::prometheus::{encode_registry, CacheMetricsExporter, PrometheusHttpMetrics};
pub use memory::{InMemoryOrderRepository, MemorySource};
pub use postgres::PostgresOrderRepository;
pub use spool::SpoolDirectorySource;
