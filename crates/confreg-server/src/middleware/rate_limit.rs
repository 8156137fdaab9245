// Admission control middleware for API protection
// Uses a single fixed-window counter shared by every request

use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    Error, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
};
use parking_lot::Mutex;
use tokio::time::Instant;

use confreg_common::ConfregError;

use crate::error::AppError;

/// Admission controller configuration
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per window
    pub max_events: u32,
    /// Window length, anchored at the first request after a reset
    pub window_duration: Duration,
    /// Whether admission control is enabled
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_events: 100,
            window_duration: Duration::from_secs(60),
            enabled: true,
        }
    }
}

/// Outcome of an admission check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Admitted { remaining: u32 },
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Fixed window state
struct Window {
    count: u32,
    /// Start of the current window; `None` until the first request after a reset
    started_at: Option<Instant>,
}

/// Fixed-window admission controller.
///
/// The window starts at the first call after the previous reset and the
/// counter drops back to zero once `window_duration` has elapsed since then.
/// The reset is applied lazily by the next caller, inside the same critical
/// section as the compare and increment.
pub struct AdmissionController {
    window: Mutex<Window>,
    config: RateLimitConfig,
}

impl AdmissionController {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            window: Mutex::new(Window {
                count: 0,
                started_at: None,
            }),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn admit(&self) -> Admission {
        if !self.config.enabled {
            return Admission::Admitted {
                remaining: self.config.max_events,
            };
        }

        let now = Instant::now();
        let mut window = self.window.lock();

        let started_at = match window.started_at {
            Some(start) if now.duration_since(start) < self.config.window_duration => start,
            _ => {
                window.count = 0;
                window.started_at = Some(now);
                now
            }
        };

        if window.count >= self.config.max_events {
            let retry_after = self
                .config
                .window_duration
                .saturating_sub(now.duration_since(started_at));
            return Admission::Rejected { retry_after };
        }

        window.count += 1;
        Admission::Admitted {
            remaining: self.config.max_events - window.count,
        }
    }
}

/// Admission control middleware factory
pub struct RateLimiter {
    controller: Arc<AdmissionController>,
}

impl RateLimiter {
    pub fn new(controller: Arc<AdmissionController>) -> Self {
        Self { controller }
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        Self::new(Arc::new(AdmissionController::new(config)))
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            controller: self.controller.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    controller: Arc<AdmissionController>,
}

/// Whole seconds a client should wait, never zero
fn retry_after_secs(retry_after: Duration) -> u64 {
    retry_after.as_secs_f64().ceil().max(1.0) as u64
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let max_events = self.controller.config().max_events;

        let remaining = match self.controller.admit() {
            Admission::Admitted { remaining } => remaining,
            Admission::Rejected { retry_after } => {
                let retry_after_secs = retry_after_secs(retry_after);
                tracing::warn!(
                    method = %req.method(),
                    path = %req.path(),
                    retry_after = retry_after_secs,
                    "Request rejected by admission control"
                );
                crate::metrics::record_admission(false);

                // Envelope and Retry-After come from the shared error mapping
                let mut response =
                    AppError::from(ConfregError::RateLimited { retry_after_secs }).error_response();
                let headers = response.headers_mut();
                headers.insert(
                    HeaderName::from_static("x-ratelimit-limit"),
                    HeaderValue::from(max_events),
                );
                headers.insert(
                    HeaderName::from_static("x-ratelimit-remaining"),
                    HeaderValue::from(0u32),
                );

                return Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) });
            }
        };
        crate::metrics::record_admission(true);

        let fut = self.service.call(req);

        Box::pin(async move {
            let mut res = fut.await?;

            let headers = res.headers_mut();
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(max_events),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(remaining),
            );

            Ok(res.map_into_left_body())
        })
    }
}
