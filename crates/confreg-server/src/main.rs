//! Main entry point for the Confreg server.
//!
//! Loads configuration, builds the storage backend and serves the registry
//! over HTTP until Ctrl+C or SIGTERM.

use std::sync::Arc;

use confreg_config::ConfigRegistry;
use confreg_server::{
    metrics,
    middleware::rate_limit::AdmissionController,
    model::{AppConfiguration, AppState},
    startup::{self, GracefulShutdown},
};
use tracing::{error, info};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let configuration = AppConfiguration::new()?;

    let _logging_guard = startup::init_logging(&configuration.logging_config())?;

    let metrics_handle = if configuration.metrics_enabled() {
        let handle = metrics::install_prometheus()?;
        metrics::init_metrics();
        Some(handle)
    } else {
        None
    };

    let storage_mode = configuration.storage_mode()?;
    info!("Storage mode: {}", storage_mode);

    let store = confreg_persistence::create_store(storage_mode, configuration.consul_config())?;
    if let Err(e) = store.health_check().await {
        error!(error = %e, "Storage backend is not reachable");
        return Err(e.into());
    }

    let rate_limit_config = configuration.rate_limit_config()?;
    info!(
        enabled = rate_limit_config.enabled,
        max_events = rate_limit_config.max_events,
        window_secs = rate_limit_config.window_duration.as_secs(),
        "Admission control configured"
    );
    let controller = Arc::new(AdmissionController::new(rate_limit_config));

    let app_state = AppState::new(ConfigRegistry::new(store), metrics_handle);

    let address = configuration.server_address();
    let port = configuration.server_port();
    let shutdown_timeout = configuration.shutdown_timeout();

    let server = startup::main_server(
        app_state,
        controller,
        address.clone(),
        port,
        shutdown_timeout,
    )?;
    info!("Confreg server listening on {}:{}", address, port);

    let graceful = GracefulShutdown::new(startup::wait_for_shutdown_signal(), shutdown_timeout);
    let handle = server.handle();
    actix_web::rt::spawn(async move { graceful.drive(handle).await });

    server.await?;
    info!("Server stopped");

    Ok(())
}
