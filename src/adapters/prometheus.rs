//! Prometheus Metrics Adapter
//!
//! Implements the `HttpMetrics` port and exports cache statistics, all on a
//! dedicated registry served by the ops server.

use std::time::Instant;

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

use crate::cache::CacheStats;
use crate::domain::HttpMetrics;
use crate::error::{Error, Result};

fn register_err(e: prometheus::Error) -> Error {
    Error::Internal(format!("failed to register metric: {}", e))
}

/// Request counter and latency histogram for the read API.
#[derive(Clone)]
pub struct PrometheusHttpMetrics {
    requests_total: IntCounter,
    request_duration: Histogram,
}

impl PrometheusHttpMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let requests_total = IntCounter::new("app_requests_total", "Total number of API requests")
            .map_err(register_err)?;
        let request_duration = Histogram::with_opts(HistogramOpts::new(
            "app_request_duration_seconds",
            "API request handling time",
        ))
        .map_err(register_err)?;

        registry
            .register(Box::new(requests_total.clone()))
            .map_err(register_err)?;
        registry
            .register(Box::new(request_duration.clone()))
            .map_err(register_err)?;

        Ok(Self {
            requests_total,
            request_duration,
        })
    }

    pub fn requests(&self) -> u64 {
        self.requests_total.get()
    }

    pub fn observations(&self) -> u64 {
        self.request_duration.get_sample_count()
    }
}

impl std::fmt::Debug for PrometheusHttpMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusHttpMetrics")
            .field("requests", &self.requests())
            .finish()
    }
}

impl HttpMetrics for PrometheusHttpMetrics {
    fn inc_request(&self) {
        self.requests_total.inc();
    }

    fn observe_request(&self, start: Instant) {
        self.request_duration
            .observe(start.elapsed().as_secs_f64());
    }
}

/// Cache gauges, refreshed from [`CacheStats`] at scrape time.
#[derive(Clone)]
pub struct CacheMetricsExporter {
    entries: IntGauge,
    hits: IntGauge,
    misses: IntGauge,
    evictions: IntGauge,
    expirations: IntGauge,
    hit_ratio: Gauge,
    utilization: Gauge,
}

impl CacheMetricsExporter {
    pub fn new(registry: &Registry) -> Result<Self> {
        let gauge = |name: &str, help: &str| -> Result<IntGauge> {
            let gauge = IntGauge::new(name, help).map_err(register_err)?;
            registry
                .register(Box::new(gauge.clone()))
                .map_err(register_err)?;
            Ok(gauge)
        };

        let ratio = |name: &str, help: &str| -> Result<Gauge> {
            let gauge = Gauge::new(name, help).map_err(register_err)?;
            registry
                .register(Box::new(gauge.clone()))
                .map_err(register_err)?;
            Ok(gauge)
        };

        Ok(Self {
            entries: gauge("order_cache_entries", "Orders currently cached")?,
            hits: gauge("order_cache_hits", "Cache lookups served from memory")?,
            misses: gauge("order_cache_misses", "Cache lookups that fell through")?,
            evictions: gauge("order_cache_evictions", "Entries evicted for capacity")?,
            expirations: gauge("order_cache_expirations", "Entries dropped after their TTL")?,
            hit_ratio: ratio("order_cache_hit_ratio", "Share of lookups served from memory")?,
            utilization: ratio("order_cache_utilization", "Cached entries over capacity")?,
        })
    }

    pub fn update(&self, stats: &CacheStats) {
        self.entries.set(stats.entries as i64);
        self.hits.set(stats.hits as i64);
        self.misses.set(stats.misses as i64);
        self.evictions.set(stats.evictions as i64);
        self.expirations.set(stats.expirations as i64);
        self.hit_ratio.set(stats.hit_ratio());
        self.utilization.set(stats.utilization());
    }
}

/// Encode every metric in `registry` in the Prometheus text format.
pub fn encode_registry(registry: &Registry) -> Result<(String, Vec<u8>)> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| Error::Internal(format!("failed to encode metrics: {}", e)))?;
    Ok((encoder.format_type().to_string(), buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_metrics_recorded() {
        let registry = Registry::new();
        let metrics = PrometheusHttpMetrics::new(&registry).unwrap();

        metrics.inc_request();
        metrics.inc_request();
        metrics.observe_request(Instant::now());

        assert_eq!(metrics.requests(), 2);
        assert_eq!(metrics.observations(), 1);
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        PrometheusHttpMetrics::new(&registry).unwrap();
        assert!(PrometheusHttpMetrics::new(&registry).is_err());
    }

    #[test]
    fn test_encoded_output_contains_cache_gauges() {
        let registry = Registry::new();
        let exporter = CacheMetricsExporter::new(&registry).unwrap();
        exporter.update(&CacheStats {
            entries: 3,
            capacity: 10,
            hits: 3,
            misses: 1,
            ..Default::default()
        });

        let (content_type, body) = encode_registry(&registry).unwrap();
        let text = String::from_utf8(body).unwrap();

        assert!(content_type.starts_with("text/plain"));
        assert!(text.contains("order_cache_entries 3"));
        assert!(text.contains("order_cache_hits 3"));
        assert!(text.contains("order_cache_hit_ratio 0.75"));
        assert!(text.contains("order_cache_utilization 0.3"));
    }
}
