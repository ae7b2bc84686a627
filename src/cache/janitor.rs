//! Background sweeper for expired cache entries.
//!
//! Lazy expiry on read already keeps stale orders from being served; the
//! janitor only returns memory held by entries nobody asks for again.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::lru::LruCache;

/// Spawn a task that purges expired entries every `interval` until `token`
/// is cancelled.
pub fn spawn_janitor<K, V>(
    cache: Arc<LruCache<K, V>>,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Cache janitor stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let purged = cache.purge_expired();
                    if purged > 0 {
                        debug!(purged, remaining = cache.len(), "Purged expired cache entries");
                    }
                }
            }
        }
    })
}
