//! Middleware chain
//!
//! A middleware inspects or amends the [`RequestContext`] and either lets
//! the request continue or answers it on the spot. The global chain runs
//! for every request before routing; routes may carry a chain of their own
//! that runs after path parameters are known.

mod auth;
mod request;

pub use auth::{require_admin, require_json, require_token};
pub use request::{cors_preflight, limit_body, log_request, parse_query};

use crate::config::AppState;
use crate::error::ApiError;
use crate::http::{response, HttpResponse, RequestContext};

/// Outcome of one middleware
#[derive(Debug)]
pub enum Flow {
    Next,
    Halt(HttpResponse),
}

impl Flow {
    /// Stop the chain with the response for `err`
    pub fn fail(err: &ApiError) -> Self {
        Self::Halt(response::error(err))
    }
}

pub type Middleware = fn(&mut RequestContext, &AppState) -> Flow;

/// Ordered, named middlewares
#[derive(Clone, Default)]
pub struct Chain {
    steps: Vec<(&'static str, Middleware)>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &'static str, middleware: Middleware) -> Self {
        self.steps.push((name, middleware));
        self
    }

    /// Chain run for every request, before routing
    pub fn global() -> Self {
        Self::new()
            .with("logger", log_request)
            .with("cors", cors_preflight)
            .with("body-limit", limit_body)
            .with("query-parser", parse_query)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|(name, _)| *name).collect()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run each middleware in order. Returns the response of the first one
    /// that halts, or `None` when all of them passed.
    pub fn run(&self, ctx: &mut RequestContext, state: &AppState) -> Option<HttpResponse> {
        for (name, middleware) in &self.steps {
            if let Flow::Halt(resp) = middleware(ctx, state) {
                tracing::trace!(middleware = name, status = resp.status().as_u16(), "chain halted");
                return Some(resp);
            }
        }
        None
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
