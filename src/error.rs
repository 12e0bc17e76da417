//! Request error type
//!
//! Every handler and middleware failure is an [`ApiError`]; the router turns
//! it into a status code and a JSON body.

use hyper::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// A single failed field check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Method not allowed")]
    MethodNotAllowed { allow: Vec<String> },

    #[error("Request body too large (max {limit} bytes)")]
    PayloadTooLarge { limit: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body sent to the client. Internal details stay in the log.
    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::Validation(errors) => serde_json::json!({
                "success": false,
                "errors": errors,
            }),
            Self::Internal(_) => serde_json::json!({ "error": "Internal server error" }),
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
