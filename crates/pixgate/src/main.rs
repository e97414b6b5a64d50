//! Pixgate - caching forwarding proxy for a single upstream image host

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::Config;
use pixgate_api::{AppState, MetricsHandle, create_router};
use pixgate_core::{
    CacheConfig, CacheStore, ProxyService, RateLimiter, RateLimiterConfig, ResolverConfig,
};
use pixgate_origin::{OriginClient, OriginClientConfig};
use pixgate_storage::{LocalStorage, MemoryStorage, StorageBackend};

/// Pixgate - caching forwarding proxy for a single upstream image host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "PIXGATE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "PIXGATE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting Pixgate v{}", env!("CARGO_PKG_VERSION"));

    // Install the Prometheus recorder
    let metrics_handle = Arc::new(MetricsHandle::new(
        PrometheusBuilder::new().install_recorder()?,
    ));

    // Initialize body storage
    let storage: Arc<dyn StorageBackend> = match config.storage.backend.as_str() {
        "memory" => Arc::new(MemoryStorage::new()),
        _ => Arc::new(LocalStorage::new(&config.storage.local.path).await?),
    };

    // Initialize the origin client
    let fetcher = Arc::new(OriginClient::new(OriginClientConfig {
        base_url: config.upstream.base_url.clone(),
        referer: config.upstream.referer.clone(),
        timeout_secs: config.upstream.timeout_secs,
    })?);

    // Initialize the cache store and rate limiter
    let cache = Arc::new(CacheStore::new(
        storage,
        CacheConfig {
            ttl_secs: config.cache.ttl_secs,
        },
    ));
    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
        window_secs: config.limit.window_secs,
        max_requests: config.limit.max_requests,
    }));

    // Initialize the response resolver
    let resolver = Arc::new(ProxyService::new(
        limiter,
        cache,
        fetcher,
        ResolverConfig {
            stale_if_error: config.upstream.stale_if_error,
        },
    ));

    // Create application state and router
    let state = AppState::new(resolver);
    let app = create_router(state, Some(metrics_handle)).layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);
    info!("Upstream: {}", config.upstream.base_url);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
