//! Structural entry checks for incoming orders.
//!
//! Applied once, before an order enters the system. Rules are checked in a
//! fixed order and the first violation is reported.

use thiserror::Error;

use super::order::Order;

/// Reasons an order is rejected at the door.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("order_uid is required")]
    OrderUidRequired,

    #[error("customer_id is required")]
    CustomerIdRequired,

    #[error("track_number is required")]
    TrackNumberRequired,

    #[error("transaction is required")]
    TransactionRequired,

    #[error("payment amount must be positive")]
    InvalidPaymentAmount,

    #[error("order must have at least one item")]
    NoItems,

    #[error("item chrt_id must be positive")]
    InvalidItemId,

    #[error("item price must be positive")]
    InvalidItemPrice,
}

/// Check the structural invariants of an order.
pub fn validate_order(order: &Order) -> Result<(), ValidationError> {
    if order.order_uid.is_empty() {
        return Err(ValidationError::OrderUidRequired);
    }
    if order.customer_id.is_empty() {
        return Err(ValidationError::CustomerIdRequired);
    }
    if order.payment.amount <= 0 {
        return Err(ValidationError::InvalidPaymentAmount);
    }
    if order.items.is_empty() {
        return Err(ValidationError::NoItems);
    }
    if order.track_number.is_empty() {
        return Err(ValidationError::TrackNumberRequired);
    }
    if order.payment.transaction.is_empty() {
        return Err(ValidationError::TransactionRequired);
    }

    for item in &order.items {
        if item.chrt_id <= 0 {
            return Err(ValidationError::InvalidItemId);
        }
        if item.price <= 0 {
            return Err(ValidationError::InvalidItemPrice);
        }
    }

    Ok(())
}
