//! Route table
//!
//! Registry routes sit behind admission control; `/health` and `/metrics`
//! are always served so operators can observe a saturated server.

use std::sync::Arc;

use actix_web::{HttpRequest, error::JsonPayloadError, web};

use confreg_common::ConfregError;

use crate::error::AppError;
use crate::middleware::rate_limit::{AdmissionController, RateLimiter};

use super::{config, group, labeled_config, system};

pub fn config_routes() -> actix_web::Scope {
    web::scope("/configs")
        .service(config::get_all)
        .service(config::create)
        .service(config::get)
        .service(config::update)
        .service(config::delete)
}

pub fn labeled_config_routes() -> actix_web::Scope {
    web::scope("/configs2")
        .service(labeled_config::get_all)
        .service(labeled_config::create)
        .service(labeled_config::get)
        .service(labeled_config::update)
        .service(labeled_config::delete)
}

pub fn group_routes() -> actix_web::Scope {
    web::scope("/configGroups")
        .service(group::get_all)
        .service(group::create)
        .service(group::get_filtered_configs)
        .service(group::get)
        .service(group::delete)
        .service(group::add_config)
        .service(group::remove_config)
        .service(group::remove_by_labels)
}

/// Malformed JSON bodies use the same error envelope as every other failure.
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::from(ConfregError::validation(format!("invalid request body: {}", err))).into()
}

/// Register every route on an app or scope.
///
/// The admission controller is shared across workers so the request budget
/// is global to the process. Each registry scope is gated on its own, so
/// paths outside them fall through to the 404 default without spending budget.
pub fn configure(cfg: &mut web::ServiceConfig, controller: Arc<AdmissionController>) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(system::health)
        .service(system::metrics)
        .service(config_routes().wrap(RateLimiter::new(controller.clone())))
        .service(labeled_config_routes().wrap(RateLimiter::new(controller.clone())))
        .service(group_routes().wrap(RateLimiter::new(controller)));
}
