use std::sync::Arc;

use axum::Router;
use clap::Parser;
use thiserror::Error;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

mod auth;
mod cache;
mod config;
mod ledger;
mod lock;
mod models;
mod normalize;
mod pipeline;
mod providers;
mod routes;
mod services;


use crate::{
    cache::{Cache, CacheError},
    config::{AppConfig, ConfigError},
    ledger::{LedgerError, QuotaLedger},
    lock::ConcurrencyGuard,
    pipeline::{AnalysisPipeline, PipelineLimits},
    providers::{DiscoveryClient, ProviderError, SocialApiClient},
    services::{ConfigSubscriptionStore, RequestCoordinator},
};

#[derive(Parser, Debug)]
#[command(name = "trendscope", about = "Social trend analysis service")]
struct Args {
    /// Path to config file. Missing file means built-in defaults.
    #[arg(short, long, default_value = "trendscope.toml")]
    config: String,

    /// Override the listen host from the config file.
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port from the config file.
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("cache: {0}")]
    Cache(#[from] CacheError),

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("provider client: {0}")]
    Provider(#[from] ProviderError),

    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server: {0}")]
    Serve(std::io::Error),
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<dyn Cache>,
    pub ledger: Arc<dyn QuotaLedger>,
    pub coordinator: Arc<RequestCoordinator>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let mut config = if std::path::Path::new(&args.config).exists() {
        AppConfig::from_file(&args.config)?
    } else {
        tracing::info!(path = %args.config, "no config file found, using defaults");
        AppConfig::default()
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;
    Ok(config)
}

async fn build_state(config: AppConfig) -> Result<AppState, StartupError> {
    let config = Arc::new(config);

    let cache = cache::build(&config.cache).await?;
    let ledger = ledger::build(&config.database).await?;

    let social = Arc::new(SocialApiClient::new(&config.providers.social)?);
    let discovery = Arc::new(DiscoveryClient::new(&config.providers.discovery)?);

    let pipeline = Arc::new(AnalysisPipeline::new(
        social.clone(),
        social.clone(),
        discovery,
        social,
        PipelineLimits::from_config(&config.providers.social, &config.limits.ttl),
    ));

    let coordinator = Arc::new(RequestCoordinator::new(
        cache.clone(),
        ledger.clone(),
        Arc::new(ConfigSubscriptionStore::new(&config.limits)),
        ConcurrencyGuard::new(cache.clone(), &config.limits.lock),
        pipeline,
        config.limits.daily_free_analyses,
        config.limits.ttl.result_ttl(),
    ));

    Ok(AppState {
        config,
        cache,
        ledger,
        coordinator,
    })
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let parsed: Vec<_> = origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    routes::api_routes()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn run(args: Args) -> Result<(), StartupError> {
    let config = load_config(&args)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = build_state(config).await?;
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;
    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::error!("failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!(error = %e, "startup failed");
        std::process::exit(1);
    }
}
