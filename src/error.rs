//! Error codes and the JSON error response.
//!
//! DESIGN
//! ======
//! Service errors implement `ErrorCode` so every failure carries a stable
//! machine-readable code next to its human message. Route handlers turn them
//! into `ApiError`, which renders `{code, message, retryable}` plus optional
//! hints (`retry_after`, `limit`). Extractor rejections for malformed bodies
//! and path params convert into the same shape.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::throttle::ThrottleDecision;
use crate::tier::LimitReached;

pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

impl ErrorCode for LimitReached {
    fn error_code(&self) -> &'static str {
        "E_LIMIT_REACHED"
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

/// Error response returned by every API handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody { code, message: message.into(), retryable: false, retry_after: None, limit: None },
        }
    }

    /// Wrap a coded service error.
    #[must_use]
    pub fn from_code(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> Self {
        let mut api = Self::new(status, err.error_code(), err.to_string());
        api.body.retryable = err.retryable();
        api
    }

    /// 429 for a denied throttle check.
    #[must_use]
    pub fn rate_limited(decision: ThrottleDecision) -> Self {
        let mut api = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "E_RATE_LIMITED",
            format!("too many requests, retry in {}s", decision.reset_in_secs),
        );
        api.body.retryable = true;
        api.body.retry_after = Some(decision.reset_in_secs);
        api
    }

    /// 403 for a tier cap.
    #[must_use]
    pub fn limit_reached(err: LimitReached) -> Self {
        let mut api = Self::from_code(StatusCode::FORBIDDEN, &err);
        api.body.limit = Some(err.limit);
        api
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E_UNAUTHORIZED", "authentication required")
    }

    #[must_use]
    pub fn internal() -> Self {
        let mut api = Self::new(StatusCode::INTERNAL_SERVER_ERROR, "E_INTERNAL", "internal error");
        api.body.retryable = true;
        api
    }

    #[cfg(test)]
    pub fn code(&self) -> &'static str {
        self.body.code
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "E_INVALID_INPUT", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "E_INVALID_INPUT", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = self.body.retry_after;
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(secs) = retry_after {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
