//! Labeled configuration handlers
//!
//! - GET    /configs2                   - List labeled configurations
//! - POST   /configs2                   - Create labeled configuration
//! - GET    /configs2/{name}/{version}  - Get labeled configuration
//! - PUT    /configs2/{name}/{version}  - Replace parameters and labels
//! - DELETE /configs2/{name}/{version}  - Delete labeled configuration

use actix_web::{HttpRequest, HttpResponse, delete, get, post, put, web};
use tracing::info;

use confreg_common::parse_version;
use confreg_config::LabeledConfiguration;

use crate::{error::AppResult, model::AppState, model::response::Result};

use super::{ensure_path_identity, idempotency_key};

#[get("")]
pub async fn get_all(data: web::Data<AppState>) -> AppResult<HttpResponse> {
    let configs = data.registry.labeled().get_all().await?;
    Ok(Result::http_success(configs))
}

#[post("")]
pub async fn create(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<LabeledConfiguration>,
) -> AppResult<HttpResponse> {
    let config = body.into_inner();
    let token = idempotency_key(&req)?;

    data.registry
        .create_labeled_configuration(&config, token.as_deref())
        .await?;

    info!(
        name = %config.name,
        version = config.version,
        labels = config.labels.len(),
        "Labeled configuration created"
    );
    Ok(Result::http_created(config))
}

#[get("/{name}/{version}")]
pub async fn get(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (name, version) = path.into_inner();
    let version = parse_version(&version)?;

    let config = data.registry.labeled().get(&name, version).await?;
    Ok(Result::http_success(config))
}

#[put("/{name}/{version}")]
pub async fn update(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<LabeledConfiguration>,
) -> AppResult<HttpResponse> {
    let (name, version) = path.into_inner();
    let version = parse_version(&version)?;
    let config = body.into_inner();
    ensure_path_identity(&config, &name, version)?;

    data.registry.labeled().update(&config).await?;

    info!(name = %name, version, "Labeled configuration updated");
    Ok(Result::http_success(config))
}

#[delete("/{name}/{version}")]
pub async fn delete(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (name, version) = path.into_inner();
    let version = parse_version(&version)?;

    data.registry.labeled().delete(&name, version).await?;

    info!(name = %name, version, "Labeled configuration deleted");
    Ok(HttpResponse::NoContent().finish())
}
