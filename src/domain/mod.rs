//! Domain Layer
//!
//! The order aggregate, its entry validation, and the ports the service
//! depends on.
//!
//! - **Order** (`order.rs`) - aggregate root with delivery, payment and items
//! - **Validation** (`validate.rs`) - structural entry invariants
//! - **Ports** (`ports.rs`) - trait abstractions for cache, storage, source and metrics

pub mod order;
pub mod ports;
pub mod validate;

pub use order::{Delivery, Item, Order, Payment};
pub use ports::{
    HttpMetrics, OrderCache, OrderRepository, OrderService, OrderSource, SourceMessage,
};
pub use validate::{validate_order, ValidationError};
