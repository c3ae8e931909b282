#![forbid(unsafe_code)]

//! Dispatch daemon: serves the coordination engine over HTTP.

use std::sync::Arc;

use clap::Parser;
use dispatch_daemon::build_dispatcher;
use dispatch_daemon::config::{Cli, DaemonConfig};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = DaemonConfig::from_cli(&cli)?;

    fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log)),
        )
        .init();

    let addr = cfg.listen_addr()?;
    let dispatcher = Arc::new(build_dispatcher(&cfg).await?);

    let app = dispatch_daemon::http::router(dispatcher)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(
        listen = %addr,
        webhook = cfg.webhook_url.as_deref().unwrap_or("-"),
        "dispatch daemon starting"
    );
    axum::serve(TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    tracing::info!("shutdown requested");
}
