//! Order Lookup Service Integration Tests
//!
//! End-to-end flows over the public API:
//! - Cache eviction through the service
//! - Lookup, not-found and cancellation semantics
//! - Spool ingestion into the store and cache
//! - Startup restore followed by HTTP lookups

use std::sync::Arc;
use std::time::Duration;

use order_lookup::adapters::{InMemoryOrderRepository, MemorySource, SpoolDirectorySource};
use order_lookup::cache::{CacheConfig, OrderLruCache};
use order_lookup::domain::{Delivery, Item, Order, OrderRepository, OrderService, Payment};
use order_lookup::service::CachedOrderService;
use tokio_util::sync::CancellationToken;

fn sample_order(uid: &str, date_created: &str) -> Order {
    Order {
        order_uid: uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: uid.to_string(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1637907727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            ..Default::default()
        },
        items: vec![Item {
            chrt_id: 9934930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2389212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shard_key: "9".to_string(),
        sm_id: 99,
        date_created: date_created.to_string(),
        oof_shard: "1".to_string(),
        ..Default::default()
    }
}

struct Harness {
    cache: Arc<OrderLruCache>,
    repo: Arc<InMemoryOrderRepository>,
    service: Arc<CachedOrderService>,
}

fn harness(capacity: usize) -> Harness {
    let cache = Arc::new(
        OrderLruCache::new(CacheConfig::new(capacity, Duration::from_secs(3600))).unwrap(),
    );
    let repo = Arc::new(InMemoryOrderRepository::new());
    let service = Arc::new(CachedOrderService::new(cache.clone(), repo.clone()));
    Harness {
        cache,
        repo,
        service,
    }
}

// =============================================================================
// Service Scenarios
// =============================================================================

mod service_tests {
    use super::*;
    use assert_matches::assert_matches;
    use order_lookup::Error;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_capacity_eviction_through_service() {
        let h = harness(2);
        let ctx = CancellationToken::new();

        for uid in ["o1", "o2", "o3"] {
            assert_ok!(
                h.service
                    .save_order(&ctx, sample_order(uid, "2021-11-26T06:22:19Z"))
                    .await
            );
        }

        assert!(!h.cache.contains("o1"));
        assert!(h.cache.contains("o2"));
        assert!(h.cache.contains("o3"));
        assert_eq!(h.cache.len(), 2);

        // Evicted entry is still served, from the store
        let reads = h.repo.reads();
        let order = assert_ok!(h.service.get_order(&ctx, "o1").await);
        assert_eq!(order.order_uid, "o1");
        assert_eq!(h.repo.reads(), reads + 1);
        assert!(!h.cache.contains("o2"));
    }

    #[tokio::test]
    async fn test_missing_order_not_found() {
        let h = harness(4);

        let err = assert_err!(h.service.get_order(&CancellationToken::new(), "missing").await);
        assert!(err.is_not_found());
        assert_matches!(err, Error::OrderNotFound);
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_lookup_touches_nothing() {
        let h = harness(4);
        let ctx = CancellationToken::new();
        ctx.cancel();

        let err = assert_err!(h.service.get_order(&ctx, "o1").await);
        assert!(err.is_cancelled());
        assert_eq!(h.repo.reads(), 0);

        let err = assert_err!(h.service.save_order(&ctx, sample_order("o1", "x")).await);
        assert!(err.is_cancelled());
        assert_eq!(h.repo.writes(), 0);
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn test_restore_warms_newest_orders() {
        let h = harness(2);
        for (uid, created) in [
            ("old", "2021-01-01T00:00:00Z"),
            ("mid", "2022-01-01T00:00:00Z"),
            ("new", "2023-01-01T00:00:00Z"),
        ] {
            h.repo.save_order(&sample_order(uid, created)).await.unwrap();
        }

        let restored = assert_ok!(h.service.restore_cache(&CancellationToken::new(), 2).await);

        assert_eq!(restored, 2);
        assert!(h.cache.contains("new"));
        assert!(h.cache.contains("mid"));
        assert!(!h.cache.contains("old"));
    }

    #[tokio::test]
    async fn test_restore_from_empty_store() {
        let h = harness(2);
        let restored = assert_ok!(h.service.restore_cache(&CancellationToken::new(), 2).await);
        assert_eq!(restored, 0);
        assert!(h.cache.is_empty());
    }
}

// =============================================================================
// Ingestion
// =============================================================================

mod ingest_tests {
    use super::*;
    use order_lookup::ingest::{self, IngestStats};

    #[tokio::test]
    async fn test_spool_files_ingested_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let valid = serde_json::to_vec(&sample_order("o1", "2021-11-26T06:22:19Z")).unwrap();
        std::fs::write(dir.path().join("001.json"), valid).unwrap();
        std::fs::write(dir.path().join("002.json"), b"{\"order_uid\": \"\"}").unwrap();

        let h = harness(8);
        let source = SpoolDirectorySource::new(dir.path());
        let mut stats = IngestStats::default();
        ingest::drain(&source, &*h.service, &CancellationToken::new(), &mut stats).await;

        assert_eq!(stats.received, 2);
        assert_eq!(stats.saved, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        assert!(h.cache.contains("o1"));
        assert_eq!(h.repo.get_order("o1").await.unwrap().customer_id, "test");
    }

    #[tokio::test]
    async fn test_redelivered_message_is_idempotent() {
        let h = harness(8);
        let source = MemorySource::new();
        let order = sample_order("o1", "2021-11-26T06:22:19Z");
        source.push_order(&order).unwrap();
        source.push_order(&order).unwrap();

        let mut stats = IngestStats::default();
        ingest::drain(&source, &*h.service, &CancellationToken::new(), &mut stats).await;

        assert_eq!(stats.saved, 2);
        assert_eq!(h.repo.len(), 1);
        assert_eq!(h.repo.writes(), 2);
    }
}

// =============================================================================
// HTTP
// =============================================================================

mod http_tests {
    use super::*;
    use hyper::body::Incoming;
    use hyper::Request;
    use order_lookup::domain::HttpMetrics;
    use order_lookup::server::{self, api, ApiState, ServeOptions};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    struct NoMetrics;

    impl HttpMetrics for NoMetrics {
        fn inc_request(&self) {}

        fn observe_request(&self, _start: std::time::Instant) {}
    }

    async fn request(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        raw
    }

    #[tokio::test]
    async fn test_restore_then_serve_lookups() {
        let h = harness(8);
        h.repo
            .save_order(&sample_order("b563feb7b2b84b6test", "2021-11-26T06:22:19Z"))
            .await
            .unwrap();

        let ctx = CancellationToken::new();
        h.service.restore_cache(&ctx, 8).await.unwrap();
        let reads_after_restore = h.repo.reads();

        let state = Arc::new(ApiState::new(h.service.clone(), Arc::new(NoMetrics), ctx.clone()));
        let listener = server::bind("127.0.0.1:0", "API").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(server::serve(
            listener,
            "API",
            move |req: Request<Incoming>| api::handle(state.clone(), req),
            ServeOptions::default(),
            ctx.clone(),
        ));

        let found = request(addr, "/api/v1/order/b563feb7b2b84b6test").await;
        assert!(found.starts_with("HTTP/1.1 200 OK"), "{}", found);
        assert!(found.contains("\"order_uid\":\"b563feb7b2b84b6test\""));
        assert!(found.contains("\"shardkey\":\"9\""));
        // Served from the warmed cache
        assert_eq!(h.repo.reads(), reads_after_restore);

        let missing = request(addr, "/api/v1/order/nope").await;
        assert!(missing.starts_with("HTTP/1.1 404 Not Found"), "{}", missing);
        assert!(missing.contains("{\"error\":\"order not found\"}"));

        ctx.cancel();
        server.await.unwrap().unwrap();
    }
}
