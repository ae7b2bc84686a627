//! Order Lookup Service
//!
//! Queue-fed order store with an HTTP lookup API and a read-through /
//! write-through LRU cache.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Order Lookup Service                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │    Spool     │───▶│    Order     │───▶│  PostgreSQL  │       │
//! │  │  (ingest)    │    │   Service    │    │ (repository) │       │
//! │  └──────────────┘    └──────┬───────┘    └──────────────┘       │
//! │  ┌──────────────┐           │            ┌──────────────┐       │
//! │  │   HTTP API   │───────────┴───────────▶│  LRU Cache   │       │
//! │  └──────────────┘                        └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures::future::join_all;
use hyper::body::Incoming;
use hyper::Request;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_lookup::adapters::{
    CacheMetricsExporter, InMemoryOrderRepository, PostgresOrderRepository, PrometheusHttpMetrics,
    SpoolDirectorySource,
};
use order_lookup::cache::{spawn_janitor, OrderLruCache};
use order_lookup::config::Config;
use order_lookup::domain::OrderRepository;
use order_lookup::error::Result;
use order_lookup::ingest;
use order_lookup::server::{self, api, ops, ApiState, OpsState, ServeOptions};
use order_lookup::service::CachedOrderService;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Order Lookup Service - cached order store with an HTTP lookup API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, env = "CONFIG_PATH", default_value = "config/config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); defaults to debug in debug mode
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Force debug mode (cache TTL in seconds, verbose logging)
    #[arg(long, env = "DEBUG")]
    debug: bool,

    /// Keep orders in process memory instead of PostgreSQL
    #[arg(long, env = "IN_MEMORY_STORE")]
    in_memory_store: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = Config::load(&args.config);
    let debug = args.debug || loaded.as_ref().map(|c| c.server.debug).unwrap_or(false);

    // Initialize logging
    init_logging(&args, debug);

    let mut config = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    config.server.debug = debug;

    // Bind outside the tracing macros, which import `tracing::field::debug`
    // and would otherwise shadow the local `debug`.
    let cache_ttl = config.cache.ttl(debug);
    let debug_mode = debug;

    info!("Starting Order Service");
    info!("  Config: {}", args.config.display());
    info!("  API address: {}", config.server.addr());
    info!("  Ops address: {}", config.ops.addr);
    info!("  Cache capacity: {}", config.cache.capacity);
    info!("  Cache TTL: {:?}", cache_ttl);
    info!("  Spool directory: {}", config.ingest.spool_dir.display());
    info!("  Debug mode: {}", debug_mode);

    let root = CancellationToken::new();

    // Storage
    let repo: Arc<dyn OrderRepository> = if args.in_memory_store {
        warn!("Using in-memory order store, orders are lost on exit");
        Arc::new(InMemoryOrderRepository::new())
    } else {
        let repo = PostgresOrderRepository::from_config(&config.postgres)?;
        repo.ensure_schema().await.map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;
        info!("Connected to PostgreSQL at {}:{}", config.postgres.host, config.postgres.port);
        Arc::new(repo)
    };

    // Cache and service
    let cache = Arc::new(OrderLruCache::new(config.cache.cache_config(debug))?);
    let service = Arc::new(CachedOrderService::new(cache.clone(), repo));

    // Metrics
    let registry = Registry::new();
    let http_metrics = Arc::new(PrometheusHttpMetrics::new(&registry)?);
    let cache_metrics = CacheMetricsExporter::new(&registry)?;
    let stats_source = cache.clone();
    let ops_state = Arc::new(OpsState::new(registry, cache_metrics, move || {
        stats_source.stats()
    }));

    let options = ServeOptions {
        read_timeout: config.server.read_timeout(),
        shutdown_timeout: config.server.shutdown_timeout(),
    };

    // Ops server comes up first so liveness answers during the restore
    let ops_listener = server::bind(&config.ops.addr, "Ops").await?;
    let ops_handler = {
        let state = ops_state.clone();
        move |req: Request<Incoming>| ops::handle(state.clone(), req)
    };
    let ops_server = tokio::spawn(server::serve(
        ops_listener,
        "Ops",
        ops_handler,
        options,
        root.clone(),
    ));

    // Warm the cache before serving reads
    match service.restore_cache(&root, config.cache.capacity).await {
        Ok(restored) => info!("Cache restored with {} orders", restored),
        Err(e) => error!("Error restoring cache: {}", e),
    }
    ops_state.set_ready(true);

    let janitor = spawn_janitor(cache.clone(), config.cache.purge_interval(), root.clone());

    // Ingestion
    let source = SpoolDirectorySource::new(&config.ingest.spool_dir);
    source.ensure_dir().await?;
    let ingestion = tokio::spawn(ingest::run(
        Arc::new(source),
        service.clone(),
        config.ingest.poll_interval(),
        root.clone(),
    ));

    // API server
    let api_listener = server::bind(&config.server.addr(), "API").await?;
    let api_state = Arc::new(ApiState::new(service.clone(), http_metrics, root.clone()));
    let api_handler = move |req: Request<Incoming>| api::handle(api_state.clone(), req);
    let api_server = tokio::spawn(server::serve(
        api_listener,
        "API",
        api_handler,
        options,
        root.clone(),
    ));

    info!("Order Service is running");

    shutdown_signal().await;
    info!("Order Service is stopping");
    ops_state.set_ready(false);
    root.cancel();

    for result in join_all([api_server, ops_server]).await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Server shutdown error: {}", e),
            Err(e) => error!("Server task failed: {}", e),
        }
    }

    if let Err(e) = janitor.await {
        error!("Cache janitor task failed: {}", e);
    }

    match ingestion.await {
        Ok(stats) => info!(
            received = stats.received,
            saved = stats.saved,
            rejected = stats.rejected,
            failed = stats.failed,
            "Ingestion finished"
        ),
        Err(e) => error!("Ingestion task failed: {}", e),
    }

    info!("Order Service is stopped");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args, debug: bool) {
    let level = match args.log_level.as_deref().map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ if debug => "debug",
        _ => "info",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},hyper=warn,tokio_postgres=warn", level))
    });

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Signals
// =============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
