//! Health and metrics endpoints

use actix_web::{HttpResponse, get, web};
use serde::Serialize;

use confreg_common::error::DATA_ACCESS_ERROR;

use crate::model::{AppState, response::Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthStatus {
    status: &'static str,
    storage: String,
}

/// Reports whether the storage backend answers.
#[get("/health")]
pub async fn health(data: web::Data<AppState>) -> HttpResponse {
    let storage = data.registry.storage_mode().to_string();

    match data.registry.health_check().await {
        Ok(()) => Result::http_success(HealthStatus {
            status: "UP",
            storage,
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            Result::http_response(
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                DATA_ACCESS_ERROR.code,
                e.to_string(),
                HealthStatus {
                    status: "DOWN",
                    storage,
                },
            )
        }
    }
}

/// Prometheus text exposition.
#[get("/metrics")]
pub async fn metrics(data: web::Data<AppState>) -> HttpResponse {
    match &data.metrics_handle {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NotFound().finish(),
    }
}
