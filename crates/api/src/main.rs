//! Beacon daemon entrypoint: polling scheduler plus local control API.

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use beacon_common::config::AppConfig;
use beacon_engine::store::NOTIFICATIONS_FILE;
use beacon_engine::{NotificationStore, Scheduler, default_monitors};
use beacon_notifier::{DeliveryGuard, DeliverySink, LogSink, WebhookSink};

use beacon_api::routes::create_router;
use beacon_api::state::AppState;
use beacon_api::telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;
    init_tracing(&config);

    tracing::info!(
        data_dir = %config.data_dir.display(),
        poll_interval_secs = config.poll_interval_secs,
        "Starting Beacon..."
    );

    let store = Arc::new(NotificationStore::load(
        config.data_dir.join(NOTIFICATIONS_FILE),
    ));

    let sink: Arc<dyn DeliverySink> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Delivering notifications to webhook");
            Arc::new(WebhookSink::new(url.clone())?)
        }
        None => Arc::new(LogSink),
    };
    let guard = Arc::new(DeliveryGuard::new(sink));

    let scheduler = Arc::new(Scheduler::new(
        config.clone(),
        store,
        guard,
        Box::new(default_monitors),
    ));
    scheduler.start();

    // Build router
    let app = create_router(AppState::new(scheduler.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.api_bind_addr).await?;
    tracing::info!("API server listening on {}", config.api_bind_addr);

    // Run with graceful shutdown on Ctrl+C
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    tracing::info!("Beacon stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal, stopping gracefully...");
}
