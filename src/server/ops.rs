//! Ops endpoints: liveness, readiness and Prometheus scrape.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use prometheus::Registry;
use tracing::error;

use super::{respond, text};
use crate::adapters::{encode_registry, CacheMetricsExporter};
use crate::cache::CacheStats;

/// Shared state of the ops handler
pub struct OpsState {
    ready: AtomicBool,
    registry: Registry,
    cache_metrics: CacheMetricsExporter,
    cache_stats: Box<dyn Fn() -> CacheStats + Send + Sync>,
}

impl OpsState {
    /// `cache_stats` is sampled on every scrape.
    pub fn new(
        registry: Registry,
        cache_metrics: CacheMetricsExporter,
        cache_stats: impl Fn() -> CacheStats + Send + Sync + 'static,
    ) -> Self {
        Self {
            ready: AtomicBool::new(false),
            registry,
            cache_metrics,
            cache_stats: Box::new(cache_stats),
        }
    }

    /// Flip `/readyz` to 200 once startup has finished.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

pub async fn handle<B>(state: Arc<OpsState>, req: Request<B>) -> Response<Full<Bytes>> {
    match req.uri().path() {
        "/healthz" | "/livez" => text(StatusCode::OK, "ok"),
        "/readyz" if state.is_ready() => text(StatusCode::OK, "ok"),
        "/readyz" => text(StatusCode::SERVICE_UNAVAILABLE, "not ready"),
        "/metrics" => {
            state.cache_metrics.update(&(state.cache_stats)());
            match encode_registry(&state.registry) {
                Ok((content_type, body)) => {
                    let mut response = respond(StatusCode::OK, "text/plain", body);
                    if let Ok(value) = content_type.parse() {
                        response.headers_mut().insert(hyper::header::CONTENT_TYPE, value);
                    }
                    response
                }
                Err(e) => {
                    error!(error = %e, "Failed to encode metrics");
                    text(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics")
                }
            }
        }
        _ => text(StatusCode::NOT_FOUND, "not found"),
    }
}
