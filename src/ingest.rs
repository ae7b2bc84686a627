//! Ingestion loop
//!
//! Drains an [`OrderSource`] on a fixed tick: every message is decoded,
//! validated and handed to the order service, then committed.
//!
//! ```text
//! tick ─▶ fetch ─▶ decode ─▶ validate ─▶ save_order ─▶ commit
//!                    │           │            │
//!                    └── reject ─┘            └── failed: left uncommitted
//!                    (commit, drop)               (redelivered later)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{validate_order, Order, OrderService, OrderSource, SourceMessage};
use crate::error::{Error, Result};

/// Message counters for one run of the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Messages fetched from the source
    pub received: u64,
    /// Orders persisted and committed
    pub saved: u64,
    /// Undecodable or invalid messages, committed and dropped
    pub rejected: u64,
    /// Messages whose save failed, left uncommitted
    pub failed: u64,
}

enum Outcome {
    Saved,
    Rejected(Error),
    Failed(Error),
    Cancelled,
}

/// Run the loop until `ctx` is cancelled.
pub async fn run(
    source: Arc<dyn OrderSource>,
    service: Arc<dyn OrderService>,
    poll_interval: Duration,
    ctx: CancellationToken,
) -> IngestStats {
    info!(?poll_interval, "Starting ingestion loop");

    let mut stats = IngestStats::default();
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => break,
            _ = ticker.tick() => {
                drain(&*source, &*service, &ctx, &mut stats).await;
            }
        }
    }

    info!(
        received = stats.received,
        saved = stats.saved,
        rejected = stats.rejected,
        failed = stats.failed,
        "Ingestion loop stopped"
    );
    stats
}

/// Process every message the source has available right now.
pub async fn drain(
    source: &dyn OrderSource,
    service: &dyn OrderService,
    ctx: &CancellationToken,
    stats: &mut IngestStats,
) {
    while !ctx.is_cancelled() {
        let message = match source.fetch().await {
            Ok(Some(message)) => message,
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "Error reading message");
                return;
            }
        };
        stats.received += 1;

        match process(service, ctx, &message).await {
            Outcome::Saved => {
                stats.saved += 1;
                commit(source, &message).await;
            }
            Outcome::Rejected(e) => {
                stats.rejected += 1;
                warn!(message = %message.id, error = %e, "Invalid order, dropping message");
                commit(source, &message).await;
            }
            Outcome::Failed(e) => {
                stats.failed += 1;
                error!(message = %message.id, error = %e, "Error saving order");
            }
            Outcome::Cancelled => return,
        }
    }
}

async fn process(
    service: &dyn OrderService,
    ctx: &CancellationToken,
    message: &SourceMessage,
) -> Outcome {
    let order = match decode(&message.payload) {
        Ok(order) => order,
        Err(e) => return Outcome::Rejected(e),
    };

    match service.save_order(ctx, order).await {
        Ok(()) => Outcome::Saved,
        Err(e) if e.is_cancelled() => Outcome::Cancelled,
        Err(e) => Outcome::Failed(e),
    }
}

fn decode(payload: &[u8]) -> Result<Order> {
    let order = Order::from_json(payload)?;
    validate_order(&order)?;
    Ok(order)
}

async fn commit(source: &dyn OrderSource, message: &SourceMessage) {
    match source.commit(message).await {
        Ok(()) => debug!(message = %message.id, "Message committed"),
        Err(e) => error!(message = %message.id, error = %e, "Error committing message"),
    }
}
