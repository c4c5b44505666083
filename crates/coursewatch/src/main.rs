//! coursewatch entry point.
//!
//! Boots the HTTP API, the cached catalog service, and the background
//! enrollment watcher, then serves until a shutdown signal arrives.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::timetable::{CatalogService, TimetableScraper};
use crate::types::AppState;
use crate::watcher::{EnrollmentWatcher, HttpMailer, SubscriptionStore};

mod config;
mod server;
mod timetable;
mod types;
mod watcher;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env();
    if !config.mailer.is_configured() {
        warn!("mailer credentials not configured, seat notifications will fail to send");
    }

    let scraper = Arc::new(TimetableScraper::new(config.timetable.clone())?);
    let catalog = CatalogService::new(scraper.clone(), config.cache_ttl);
    let registry = Arc::new(SubscriptionStore::open(&config.subscriptions_db)?);
    let notifier = Arc::new(HttpMailer::new(config.mailer.clone())?);

    let watcher = Arc::new(EnrollmentWatcher::new(
        registry.clone(),
        scraper,
        notifier,
        config.watcher.clone(),
    ));
    let watcher_handle = watcher.start();

    let state = Arc::new(AppState { catalog, registry });
    let app = server::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "coursewatch listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    watcher_handle.stop().await;
    info!("coursewatch shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
