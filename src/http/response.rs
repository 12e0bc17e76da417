//! HTTP response building module
//!
//! Builders for the response shapes the handlers produce.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::error::ApiError;

pub type HttpResponse = Response<Full<Bytes>>;

/// Methods answered for any path in a preflight
pub const ALLOWED_METHODS: &str = "GET, HEAD, POST, PUT, DELETE, OPTIONS";

/// Build a pretty-printed JSON response
pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> HttpResponse {
    match serde_json::to_string_pretty(value) {
        Ok(body) => Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .header("Content-Length", body.len())
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|e| {
                log_build_error(status, &e);
                Response::new(Full::new(Bytes::new()))
            }),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response body");
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Build a plain text response
pub fn text(status: StatusCode, content: impl Into<String>) -> HttpResponse {
    let content = content.into();
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Content-Length", content.len())
        .body(Full::new(Bytes::from(content)))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 204 No Content response
pub fn no_content() -> HttpResponse {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error(StatusCode::NO_CONTENT, &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build OPTIONS response (preflight request)
pub fn options(enable_cors: bool) -> HttpResponse {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", ALLOWED_METHODS);

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", ALLOWED_METHODS)
            .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error(StatusCode::NO_CONTENT, &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Build the response for a failed request
pub fn error(err: &ApiError) -> HttpResponse {
    let status = err.status();
    match err {
        ApiError::Internal(detail) => tracing::error!(%detail, "request failed"),
        other => tracing::debug!(status = status.as_u16(), error = %other, "request rejected"),
    }

    let mut response = json(status, &err.body());
    if let ApiError::MethodNotAllowed { allow } = err {
        if let Ok(value) = allow.join(", ").parse() {
            response.headers_mut().insert("Allow", value);
        }
    }
    response
}

/// Build 404 response for a path no route knows
pub fn route_not_found(path: &str) -> HttpResponse {
    json(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": "Route not found", "path": path }),
    )
}

/// Log response build error
fn log_build_error(status: StatusCode, error: &hyper::http::Error) {
    tracing::error!(status = status.as_u16(), %error, "failed to build response");
}
