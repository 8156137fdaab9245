// HTTP mapping for registry errors
// (Cannot impl foreign trait for foreign type due to orphan rules)

use std::fmt::{Display, Formatter};

use actix_web::{HttpResponse, http::StatusCode};

use confreg_common::ConfregError;

use crate::model::response as common;

#[derive(Debug)]
pub struct AppError {
    inner: ConfregError,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

impl From<ConfregError> for AppError {
    fn from(value: ConfregError) -> Self {
        AppError { inner: value }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError {
            inner: ConfregError::StorageFault(value),
        }
    }
}

impl AppError {
    pub fn inner(&self) -> &ConfregError {
        &self.inner
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl actix_web::error::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match &self.inner {
            ConfregError::NotFound(_) => StatusCode::NOT_FOUND,
            ConfregError::AlreadyExists(_) | ConfregError::Conflict(_) => StatusCode::CONFLICT,
            ConfregError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ConfregError::StorageFault(_) => StatusCode::SERVICE_UNAVAILABLE,
            ConfregError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ConfregError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let code = self.inner.error_code().code;

        if let ConfregError::StorageFault(cause) = &self.inner {
            tracing::error!(error = ?cause, "Storage fault while serving request");
        }

        let mut response = common::Result::<String>::http_response(
            status,
            code,
            self.inner.to_string(),
            String::new(),
        );

        if let ConfregError::RateLimited { retry_after_secs } = &self.inner {
            response.headers_mut().insert(
                actix_web::http::header::RETRY_AFTER,
                actix_web::http::header::HeaderValue::from(*retry_after_secs),
            );
        }

        response
    }
}
