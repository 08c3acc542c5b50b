mod approvals;
mod bootstrap;
mod car_management;
mod cars;
mod error;
mod health;
mod human_input;
mod routes;

use std::time::Duration;

use anyhow::{Context, Result};
use carfleet_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use carfleet_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    let router = routes::router(app.state.clone()).merge(health::router(app.db_pool.clone()));
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        approval_timeout_secs = app.config.approval.timeout_secs,
        "carfleet-server listening"
    );

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        waiting_cars = app.state.approvals.waiting_cars().len(),
        grace_secs = grace.as_secs(),
        "carfleet-server stopping"
    );
    let _ = stop_tx.send(());

    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined.context("server task panicked")??,
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not finish within the grace period"
        ),
    }
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
