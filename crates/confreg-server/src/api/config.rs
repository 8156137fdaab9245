//! Plain configuration handlers
//!
//! - GET    /configs                   - List configurations
//! - POST   /configs                   - Create configuration
//! - GET    /configs/{name}/{version}  - Get configuration
//! - PUT    /configs/{name}/{version}  - Replace parameters
//! - DELETE /configs/{name}/{version}  - Delete configuration

use actix_web::{HttpRequest, HttpResponse, delete, get, post, put, web};
use tracing::info;

use confreg_common::parse_version;
use confreg_config::Configuration;

use crate::{error::AppResult, model::AppState, model::response::Result};

use super::{ensure_path_identity, idempotency_key};

#[get("")]
pub async fn get_all(data: web::Data<AppState>) -> AppResult<HttpResponse> {
    let configs = data.registry.configs().get_all().await?;
    Ok(Result::http_success(configs))
}

#[post("")]
pub async fn create(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<Configuration>,
) -> AppResult<HttpResponse> {
    let config = body.into_inner();
    let token = idempotency_key(&req)?;

    data.registry
        .create_configuration(&config, token.as_deref())
        .await?;

    info!(name = %config.name, version = config.version, "Configuration created");
    Ok(Result::http_created(config))
}

#[get("/{name}/{version}")]
pub async fn get(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (name, version) = path.into_inner();
    let version = parse_version(&version)?;

    let config = data.registry.configs().get(&name, version).await?;
    Ok(Result::http_success(config))
}

#[put("/{name}/{version}")]
pub async fn update(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<Configuration>,
) -> AppResult<HttpResponse> {
    let (name, version) = path.into_inner();
    let version = parse_version(&version)?;
    let config = body.into_inner();
    ensure_path_identity(&config, &name, version)?;

    data.registry.configs().update(&config).await?;

    info!(name = %name, version, "Configuration updated");
    Ok(Result::http_success(config))
}

#[delete("/{name}/{version}")]
pub async fn delete(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (name, version) = path.into_inner();
    let version = parse_version(&version)?;

    data.registry.configs().delete(&name, version).await?;

    info!(name = %name, version, "Configuration deleted");
    Ok(HttpResponse::NoContent().finish())
}
