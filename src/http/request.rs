//! Per-request context passed through middlewares and handlers

use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::http::request::Parts;
use hyper::{Method, Version};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use crate::auth::Session;
use crate::error::{ApiError, ApiResult};

/// Everything known about one request.
///
/// `query` is filled by the query-parsing middleware, `params` by the
/// router and `session` by the token middleware.
#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub raw_query: Option<String>,
    pub query: HashMap<String, String>,
    pub params: HashMap<String, String>,
    pub headers: HeaderMap,
    pub version: Version,
    pub body: Bytes,
    /// The body exceeded the configured limit and was not kept
    pub body_overflow: bool,
    pub session: Option<Session>,
    pub peer: Option<SocketAddr>,
    pub start: Instant,
}

impl RequestContext {
    /// Context for `target`, a path with an optional `?query`
    pub fn new(method: Method, target: &str) -> Self {
        let (path, raw_query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };

        Self {
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            raw_query,
            query: HashMap::new(),
            params: HashMap::new(),
            headers: HeaderMap::new(),
            version: Version::HTTP_11,
            body: Bytes::new(),
            body_overflow: false,
            session: None,
            peer: None,
            start: Instant::now(),
        }
    }

    pub fn from_parts(parts: Parts, body: Bytes, peer: Option<SocketAddr>) -> Self {
        let mut ctx = Self::new(parts.method, parts.uri.path());
        ctx.raw_query = parts.uri.query().map(ToString::to_string);
        ctx.headers = parts.headers;
        ctx.version = parts.version;
        ctx.body = body;
        ctx.peer = peer;
        ctx
    }

    #[must_use]
    #[cfg(test)]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    #[cfg(test)]
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    /// Path plus query string, as requested
    pub fn url(&self) -> String {
        match &self.raw_query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// First present value among several accepted spellings of a parameter
    pub fn query_any(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.query(name))
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Declared `Content-Length`, if present and numeric
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.trim().parse().ok()
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    /// Parse the body as arbitrary JSON
    pub fn json_value(&self) -> ApiResult<serde_json::Value> {
        self.json()
    }

    /// Parse the body as `T`
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Err(ApiError::bad_request("Request body is required"));
        }
        serde_json::from_slice(&self.body).map_err(|e| {
            tracing::debug!(path = %self.path, error = %e, "rejected request body");
            ApiError::bad_request("Malformed JSON body")
        })
    }
}
