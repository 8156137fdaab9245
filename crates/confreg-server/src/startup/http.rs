//! HTTP server setup

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, dev::Server, middleware::Logger, web};

use crate::{
    api::route,
    middleware::{rate_limit::AdmissionController, request_metrics::RequestMetrics},
    model::AppState,
};

/// Creates and binds the registry HTTP server.
///
/// Signal handling is left to [`super::GracefulShutdown`], which stops the
/// returned server through its handle.
pub fn main_server(
    app_state: AppState,
    controller: Arc<AdmissionController>,
    address: String,
    port: u16,
    shutdown_timeout: Duration,
) -> Result<Server, std::io::Error> {
    let app_state = web::Data::new(app_state);

    Ok(HttpServer::new(move || {
        let controller = controller.clone();
        App::new()
            .wrap(RequestMetrics)
            .wrap(Logger::default())
            .app_data(app_state.clone())
            .configure(|cfg| route::configure(cfg, controller))
    })
    .disable_signals()
    .shutdown_timeout(shutdown_timeout.as_secs())
    .bind((address, port))?
    .run())
}
