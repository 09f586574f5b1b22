use anyhow::Context;
use clap::Parser;
use ferrumgate::config::AppConfig;
use ferrumgate::dispatch::Dispatcher;
use ferrumgate::pubsub::Broker;
use ferrumgate::store::ConnectorRegistry;
use ferrumgate::{gateway, server, web, Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ferrumgate", about = "Redis-compatible gateway over SQL databases", version)]
struct Args {
    #[arg(short, long, env = "FERRUMGATE_CONFIG")]
    config: Option<String>,
    #[arg(long, env = "FERRUMGATE_REDIS_LISTEN")]
    redis_listen: Option<String>,
    #[arg(long, env = "FERRUMGATE_HTTP_LISTEN")]
    http_listen: Option<String>,
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load config: explicit path > auto-detect > defaults
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path).with_context(|| format!("loading {}", path))?,
        None => AppConfig::find_and_load()?.unwrap_or_default(),
    };

    // CLI args override config file
    if let Some(listen) = args.redis_listen {
        config.server.redis.listen = listen;
    }
    if let Some(listen) = args.http_listen {
        config.server.http.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("{} starting...", config.service_name);

    let shutdown = CancellationToken::new();
    let broker = Arc::new(Broker::new());
    let registry = ConnectorRegistry::with_defaults();

    let cache = if config.cache.enabled() {
        Some(registry.connect_cache(&config.cache.connect, config.cache.options())?)
    } else {
        info!("Cache disabled");
        None
    };

    let store: Arc<dyn Store> = gateway::build(
        &config.sources,
        &registry,
        broker.clone(),
        cache.clone(),
        &shutdown,
    )
    .await
    .context("assembling sources")?;
    info!("{} source(s) ready", config.sources.len());

    // Handle shutdown signals (SIGINT, SIGTERM)
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    let redis = async {
        let listener = &config.server.redis;
        if !listener.enabled() {
            return Ok(());
        }
        let dispatcher = Dispatcher::new(store.clone(), broker.clone())
            .with_request_timeout(Duration::from_millis(listener.request_timeout_ms));
        let result = server::run(&listener.listen, Arc::new(dispatcher), shutdown.clone()).await;
        if let Err(e) = &result {
            error!("RESP server error: {:#}", e);
            shutdown.cancel();
        }
        result
    };

    let http = async {
        let listener = &config.server.http;
        if !listener.enabled() {
            return Ok(());
        }
        let result = web::run_web_server(
            &listener.listen,
            store.clone(),
            listener.request_timeout(),
            shutdown.clone(),
        )
        .await;
        if let Err(e) = &result {
            error!("REST mirror error: {:#}", e);
            shutdown.cancel();
        }
        result
    };

    if !config.server.redis.enabled() && !config.server.http.enabled() {
        warn!("No server enabled, nothing to serve");
    }
    let (redis_result, http_result): (anyhow::Result<()>, anyhow::Result<()>) = tokio::join!(redis, http);

    // Teardown: sources first, then the shared cache
    let mut errors = Vec::new();
    if let Err(e) = store.close().await {
        errors.push(e);
    }
    if let Some(cache) = cache {
        if let Err(e) = cache.close().await {
            errors.push(e);
        }
    }
    if let Err(e) = StoreError::combine(errors) {
        error!("Closing backends: {}", e);
    }

    redis_result?;
    http_result?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
