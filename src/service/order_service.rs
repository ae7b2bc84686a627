//! Cached order service
//!
//! Consistency contract between the cache and the durable store:
//!
//! - lookups try the cache first and only fall back to the repository on a
//!   miss, populating the cache with what the repository returned
//! - saves update the cache first, unconditionally, then the repository; a
//!   failed repository write leaves the new value cached (no rollback)
//! - at startup the newest orders are loaded into the cache before traffic
//!   is accepted

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Order, OrderCache, OrderRepository, OrderService};
use crate::error::{Error, Result};

/// Read-through / write-through order service.
pub struct CachedOrderService {
    cache: Arc<dyn OrderCache>,
    repo: Arc<dyn OrderRepository>,
}

impl CachedOrderService {
    /// Create a service over the given cache and repository.
    pub fn new(cache: Arc<dyn OrderCache>, repo: Arc<dyn OrderRepository>) -> Self {
        debug!("Initializing order service");
        Self { cache, repo }
    }

    /// Warm the cache with up to `capacity` of the newest stored orders.
    ///
    /// Returns how many orders were cached. An empty store is not an error.
    /// Cancellation is checked before every insert; entries cached before
    /// the cancellation was observed stay cached.
    #[instrument(skip(self, ctx))]
    pub async fn restore_cache(&self, ctx: &CancellationToken, capacity: usize) -> Result<usize> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled("cache restoration"));
        }

        info!("Restoring cache...");

        let orders = match cancellable(ctx, "cache restoration", self.repo.get_orders(capacity)).await
        {
            Ok(orders) => orders,
            Err(Error::OrdersNotFound) => Vec::new(),
            Err(e) => return Err(wrap(e, "failed to get orders")),
        };

        if orders.is_empty() {
            info!("No orders found for cache restoration");
            return Ok(0);
        }

        let mut restored = 0;
        for order in orders {
            if ctx.is_cancelled() {
                warn!(restored, "Cache restoration cancelled");
                return Err(Error::Cancelled("cache restoration"));
            }
            let order_uid = order.order_uid.clone();
            self.cache.save_order(&order_uid, Arc::new(order));
            restored += 1;
        }

        info!(restored, "Successfully restored cache");
        Ok(restored)
    }
}

#[async_trait]
impl OrderService for CachedOrderService {
    async fn get_order(&self, ctx: &CancellationToken, order_uid: &str) -> Result<Arc<Order>> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled("getting order"));
        }

        if let Some(order) = self.cache.get_order(order_uid) {
            debug!(order_uid = %order_uid, "Order served from cache");
            return Ok(order);
        }

        let order = cancellable(ctx, "getting order", self.repo.get_order(order_uid))
            .await
            .map_err(|e| wrap(e, "failed to get order"))?;

        let order = Arc::new(order);
        self.cache.save_order(order_uid, Arc::clone(&order));

        info!(order_uid = %order_uid, "Successfully received order");
        Ok(order)
    }

    async fn save_order(&self, ctx: &CancellationToken, order: Order) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled("saving order"));
        }

        let order = Arc::new(order);
        self.cache.save_order(&order.order_uid, Arc::clone(&order));

        cancellable(ctx, "saving order", self.repo.save_order(&order))
            .await
            .map_err(|e| wrap(e, "failed to save order"))?;

        info!(order_uid = %order.order_uid, "Successfully saved order");
        Ok(())
    }
}

/// Run a repository call, giving up as soon as `ctx` is cancelled.
async fn cancellable<T>(
    ctx: &CancellationToken,
    operation: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(Error::Cancelled(operation)),
        result = fut => result,
    }
}

/// Not-found and cancellation pass through untouched so callers can match
/// on them; everything else gets the operation as context.
fn wrap(err: Error, context: &'static str) -> Error {
    match err {
        Error::OrderNotFound | Error::OrdersNotFound | Error::Cancelled(_) => err,
        other => other.context(context),
    }
}

// =============================================================================
// Tests
// =============================================================================
