mod cli;

use crate::cli::{LogFormat, CLI};
use anyhow::Context;
use burrow_gateway::auth::AuthKeys;
use burrow_gateway::{App, AppState};
use burrow_storage::{StorageEngine, Sweeper};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "burrow=info,burrow_gateway=info,burrow_storage=info,tower_http=info";

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
    }
    info!("shutdown requested");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::try_parse()?;
    init_tracing(config.log_format);

    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        log_format = %config.log_format,
        "starting burrow"
    );

    let storage = StorageEngine::open(&config.storage_config())
        .await
        .context("failed to open storage backend")?;
    info!(backend = storage.backend(), "storage ready");

    let shutdown = CancellationToken::new();
    let sweeper = Sweeper::new(
        storage.clone(),
        config.sweeper_settings(),
        shutdown.clone(),
    )
    .spawn();

    let state = AppState::builder()
        .storage(storage)
        .base_url(config.base_url.as_str())
        .auth(AuthKeys::new(config.secret_key.as_bytes()))
        .shutdown(shutdown.clone())
        .build();

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "serving http");

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    sweeper.await?;
    info!("burrow stopped");
    Ok(())
}
