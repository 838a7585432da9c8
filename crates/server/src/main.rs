//! easel server binary.

use anyhow::{Context, Result};
use clap::Parser;
use easel_core::config::AppConfig;
use easel_server::{AppState, create_router};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// easel - streaming mockup-image upload server
#[derive(Parser, Debug)]
#[command(name = "easeld")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "EASEL_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("easel v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration. The file is optional and env vars override it;
    // the defaults alone are a runnable filesystem-backed setup.
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("EASEL_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    if config.server.metrics_enabled {
        easel_server::metrics::register_metrics();
        tracing::info!("Prometheus metrics registered");
    }

    // Initialize the storage backend and verify connectivity before
    // accepting requests, so configuration errors surface at startup.
    let storage = easel_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(
        backend = storage.backend_name(),
        "Storage backend initialized"
    );

    // Create application state and router
    let state = AppState::new(config.clone(), storage);
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
