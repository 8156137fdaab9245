//! Configuration group handlers
//!
//! - GET    /configGroups                                  - List groups
//! - POST   /configGroups                                  - Create group
//! - GET    /configGroups/{name}/{version}                 - Get group
//! - DELETE /configGroups/{name}/{version}                 - Delete group
//! - PUT    /configGroups/{name}/{version}                 - Add a member
//! - DELETE /configGroups/{name}/{version}/{cname}/{cver}  - Remove a member
//! - GET    /configGroups/{name}/{version}/configs2/{filter} - Members matching labels
//! - DELETE /configGroups/{name}/{version}/{filter}        - Remove members matching labels

use actix_web::{HttpRequest, HttpResponse, delete, get, post, put, web};
use serde::Serialize;
use tracing::info;

use confreg_common::parse_version;
use confreg_config::{ConfigurationGroup, LabeledConfiguration, Labels};

use crate::{error::AppResult, model::AppState, model::response::Result};

use super::idempotency_key;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemovedMembers {
    removed: usize,
}

#[get("")]
pub async fn get_all(data: web::Data<AppState>) -> AppResult<HttpResponse> {
    let groups = data.registry.groups().get_all().await?;
    Ok(Result::http_success(groups))
}

#[post("")]
pub async fn create(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<ConfigurationGroup>,
) -> AppResult<HttpResponse> {
    let group = body.into_inner();
    let token = idempotency_key(&req)?;

    data.registry.create_group(&group, token.as_deref()).await?;

    info!(
        name = %group.name,
        version = group.version,
        members = group.configuration.len(),
        "Configuration group created"
    );
    Ok(Result::http_created(group))
}

#[get("/{name}/{version}")]
pub async fn get(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (name, version) = path.into_inner();
    let version = parse_version(&version)?;

    let group = data.registry.groups().get(&name, version).await?;
    Ok(Result::http_success(group))
}

#[delete("/{name}/{version}")]
pub async fn delete(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (name, version) = path.into_inner();
    let version = parse_version(&version)?;

    data.registry.groups().delete(&name, version).await?;

    info!(name = %name, version, "Configuration group deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[put("/{name}/{version}")]
pub async fn add_config(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<LabeledConfiguration>,
) -> AppResult<HttpResponse> {
    let (name, version) = path.into_inner();
    let version = parse_version(&version)?;
    let member = body.into_inner();

    data.registry
        .groups()
        .add_config(&name, version, member.clone())
        .await?;

    Ok(Result::http_success(member))
}

#[delete("/{name}/{version}/{config_name}/{config_version}")]
pub async fn remove_config(
    data: web::Data<AppState>,
    path: web::Path<(String, String, String, String)>,
) -> AppResult<HttpResponse> {
    let (name, version, config_name, config_version) = path.into_inner();
    let version = parse_version(&version)?;
    let config_version = parse_version(&config_version)?;

    let removed = data
        .registry
        .groups()
        .remove_config(&name, version, &config_name, config_version)
        .await?;

    Ok(Result::http_success(removed))
}

#[get("/{name}/{version}/configs2/{filter}")]
pub async fn get_filtered_configs(
    data: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> AppResult<HttpResponse> {
    let (name, version, filter) = path.into_inner();
    let version = parse_version(&version)?;
    let filter: Labels = filter.parse()?;

    let members = data
        .registry
        .groups()
        .get_filtered_configs(&name, version, &filter)
        .await?;

    Ok(Result::http_success(members))
}

#[delete("/{name}/{version}/{filter}")]
pub async fn remove_by_labels(
    data: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> AppResult<HttpResponse> {
    let (name, version, filter) = path.into_inner();
    let version = parse_version(&version)?;
    let filter: Labels = filter.parse()?;

    let removed = data
        .registry
        .groups()
        .remove_by_labels(&name, version, &filter)
        .await?;

    Ok(Result::http_success(RemovedMembers { removed }))
}
