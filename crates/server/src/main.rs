mod bootstrap;
mod health;
mod promo;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use promobundle_core::bundles::PromoEngine;
use promobundle_core::config::{AppConfig, LoadOptions};
use promobundle_db::SqlPromoCatalog;
use tokio::sync::Notify;

fn init_logging(config: &AppConfig) {
    use promobundle_core::config::LogFormat::*;
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
    let engine = PromoEngine::new(
        SqlPromoCatalog::new(app.db_pool.clone()),
        app.config.promo.rules(),
        app.config.promo.retrieval_limits(),
    );
    let router: Router =
        health::router(app.db_pool.clone()).merge(promo::router(Arc::new(engine)));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "promobundle-server listening"
    );

    let shutdown = Arc::new(Notify::new());
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let serve = axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown(Arc::clone(&shutdown)))
        .into_future();

    tokio::select! {
        result = serve => result?,
        _ = drain_deadline(shutdown, grace) => {
            tracing::warn!(
                event_name = "system.server.drain_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "in-flight requests did not finish before the shutdown deadline"
            );
        }
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "promobundle-server stopping"
    );
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown(shutdown: Arc<Notify>) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
    shutdown.notify_one();
}

async fn drain_deadline(shutdown: Arc<Notify>, grace: Duration) {
    shutdown.notified().await;
    tokio::time::sleep(grace).await;
}
