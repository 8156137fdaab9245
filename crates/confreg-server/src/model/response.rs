//! HTTP response types
//!
//! Every API response uses the `{code, message, data}` envelope.

use actix_web::{HttpResponse, HttpResponseBuilder, http::StatusCode};
use serde::{Deserialize, Serialize};

use confreg_common::error::SUCCESS;

/// Generic result wrapper for API responses
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Result<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> Result<T> {
    pub fn new(code: i32, message: String, data: T) -> Self {
        Result::<T> {
            code,
            message,
            data,
        }
    }

    pub fn success(data: T) -> Result<T> {
        Result::<T> {
            code: SUCCESS.code,
            message: SUCCESS.message.to_string(),
            data,
        }
    }
}

impl<T: Serialize> Result<T> {
    pub fn http_success(data: T) -> HttpResponse {
        HttpResponse::Ok().json(Result::success(data))
    }

    pub fn http_created(data: T) -> HttpResponse {
        HttpResponse::Created().json(Result::success(data))
    }

    pub fn http_response(status: StatusCode, code: i32, message: String, data: T) -> HttpResponse {
        HttpResponseBuilder::new(status).json(Result::new(code, message, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let result = Result::success(vec![1, 2]);
        assert_eq!(result.code, 0);
        assert_eq!(result.message, "success");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_http_created_status() {
        let response = Result::http_created("ok");
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
