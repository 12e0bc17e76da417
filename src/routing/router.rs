//! Route table and dispatch

use hyper::Method;
use std::collections::HashMap;

use super::pattern::PathPattern;
use crate::config::AppState;
use crate::error::ApiResult;
use crate::http::{HttpResponse, RequestContext};
use crate::middleware::{Chain, Middleware};

pub type Handler = fn(&RequestContext, &AppState) -> ApiResult<HttpResponse>;

#[derive(Debug)]
pub struct Route {
    pub method: Method,
    pub pattern: PathPattern,
    pub middlewares: Chain,
    pub handler: Handler,
}

/// Result of looking a request up in the table
#[derive(Debug)]
pub enum Dispatch<'a> {
    Matched {
        route: &'a Route,
        params: HashMap<String, String>,
    },
    MethodNotAllowed {
        allow: Vec<String>,
    },
    NotFound,
}

/// Ordered route table. The first registered route that matches wins.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        &mut self,
        method: Method,
        pattern: &str,
        middlewares: &[(&'static str, Middleware)],
        handler: Handler,
    ) -> &mut Self {
        let chain = middlewares
            .iter()
            .fold(Chain::new(), |chain, (name, mw)| chain.with(*name, *mw));
        self.routes.push(Route {
            method,
            pattern: PathPattern::parse(pattern),
            middlewares: chain,
            handler,
        });
        self
    }

    pub fn get(&mut self, pattern: &str, handler: Handler) -> &mut Self {
        self.route(Method::GET, pattern, &[], handler)
    }

    #[cfg(test)]
    pub fn post(&mut self, pattern: &str, handler: Handler) -> &mut Self {
        self.route(Method::POST, pattern, &[], handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: Handler) -> &mut Self {
        self.route(Method::DELETE, pattern, &[], handler)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn dispatch(&self, method: &Method, path: &str) -> Dispatch<'_> {
        // HEAD is served by the GET route
        let wanted = if method == Method::HEAD { &Method::GET } else { method };
        let mut allow: Vec<String> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            if route.method == *wanted {
                return Dispatch::Matched { route, params };
            }
            let name = route.method.as_str().to_string();
            if !allow.contains(&name) {
                allow.push(name);
            }
        }

        if allow.is_empty() {
            return Dispatch::NotFound;
        }
        if allow.iter().any(|m| m == "GET") {
            allow.push("HEAD".to_string());
        }
        allow.push("OPTIONS".to_string());
        Dispatch::MethodNotAllowed { allow }
    }
}
