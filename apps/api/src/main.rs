//! # Bazaar API Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        API Server Process                               │
//! │                                                                         │
//! │  Client ───► HTTP (8080) ───► Routes ───► bazaar-market ───► SQLite     │
//! │                                                 │                       │
//! │                  OrderScheduler task ◄──────────┤                       │
//! │                  NotificationDispatcher task ◄──┘                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bazaar_api::{router, ApiConfig, AppState, JwtManager};
use bazaar_db::Database;
use bazaar_market::{LogSink, Market, ProfileDirectory, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting Bazaar API server...");

    let config = ApiConfig::load().context("loading configuration")?;
    if config.uses_dev_secrets() {
        warn!("Using development secrets; set BAZAAR__AUTH__JWT_SECRET and BAZAAR__AUTH__WEBHOOK_SECRET");
    }
    info!(
        address = %config.bind_address(),
        database = %config.database.path.display(),
        "Configuration loaded"
    );

    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;

    let directory = Arc::new(ProfileDirectory::new(db.clone()));
    let market = Market::new(db.clone(), Arc::new(SystemClock), directory, config.lookup_timeout());

    // Background tasks
    let (scheduler, sweeps) = market.order_scheduler(config.scheduler_config());
    let scheduler_task = tokio::spawn(scheduler.run());

    let (dispatcher, dispatch) = market.notification_dispatcher(Arc::new(LogSink), config.dispatcher_config());
    let dispatcher_task = tokio::spawn(dispatcher.run());

    let jwt = JwtManager::new(&config.auth.jwt_secret, config.auth.access_token_lifetime_secs);
    let state = AppState::new(market, jwt, &config.auth.webhook_secret, sweeps.clone());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("binding {}", config.bind_address()))?;
    info!(address = %config.bind_address(), "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    sweeps.shutdown().await;
    dispatch.shutdown().await;
    if let Err(e) = scheduler_task.await {
        warn!(error = %e, "Order scheduler task ended abnormally");
    }
    if let Err(e) = dispatcher_task.await {
        warn!(error = %e, "Notification dispatcher task ended abnormally");
    }
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
