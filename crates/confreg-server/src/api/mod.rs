//! HTTP API handlers
//!
//! - `config`: plain configurations under `/configs`
//! - `labeled_config`: labeled configurations under `/configs2`
//! - `group`: configuration groups under `/configGroups`
//! - `system`: `/health` and `/metrics`

pub mod config;
pub mod group;
pub mod labeled_config;
pub mod route;
pub mod system;

use actix_web::HttpRequest;

use confreg_common::{ConfregError, IDEMPOTENCY_KEY_HEADER, Result};
use confreg_config::Versioned;

/// Optional client token for deduplicating creates.
///
/// A header that is present but empty or not valid UTF-8 is rejected.
pub(crate) fn idempotency_key(req: &HttpRequest) -> Result<Option<String>> {
    match req.headers().get(IDEMPOTENCY_KEY_HEADER) {
        None => Ok(None),
        Some(value) => {
            let token = value.to_str().map_err(|_| {
                ConfregError::validation("Idempotency-Key header must be visible ASCII")
            })?;
            Ok(Some(token.trim().to_string()))
        }
    }
}

/// The entity in an update body must name the resource in the path.
pub(crate) fn ensure_path_identity<T: Versioned>(entity: &T, name: &str, version: u32) -> Result<()> {
    if entity.name() != name || entity.version() != version {
        return Err(ConfregError::validation(format!(
            "body identifies {} but path identifies {}/{}",
            entity.describe(),
            name,
            version
        )));
    }
    Ok(())
}
