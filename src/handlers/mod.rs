//! Request handler module
//!
//! Entry point for HTTP request processing: collects the body, runs the
//! global middleware chain, dispatches to a route and writes the access log.

mod auth;
mod grades;
mod home;
mod katas;
mod library;
mod products;
mod registro;
mod tasks;
mod users;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Request, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{AppState, Config};
use crate::error::ApiError;
use crate::http::{response, HttpResponse, RequestContext};
use crate::logger::{self, AccessLogEntry};
use crate::middleware::Chain;
use crate::routing::{Dispatch, Router};

/// Shared state plus the request pipeline built from it
pub struct App {
    pub state: AppState,
    chain: Chain,
    router: Router,
}

impl App {
    pub fn new(state: AppState) -> Self {
        let router = build_router(&state.config);
        tracing::debug!(routes = router.len(), "routes registered");
        Self {
            chain: Chain::global(),
            router,
            state,
        }
    }

    /// Produce the response for a fully read request
    pub fn respond(&self, mut ctx: RequestContext) -> HttpResponse {
        let mut resp = self.process(&mut ctx);
        self.finish(&ctx, &mut resp);
        resp
    }

    fn process(&self, ctx: &mut RequestContext) -> HttpResponse {
        if let Some(resp) = self.chain.run(ctx, &self.state) {
            return resp;
        }

        match self.router.dispatch(&ctx.method, &ctx.path) {
            Dispatch::Matched { route, params } => {
                ctx.params = params;
                if let Some(resp) = route.middlewares.run(ctx, &self.state) {
                    return resp;
                }
                (route.handler)(ctx, &self.state).unwrap_or_else(|err| response::error(&err))
            }
            Dispatch::MethodNotAllowed { allow } => {
                response::error(&ApiError::MethodNotAllowed { allow })
            }
            Dispatch::NotFound => response::route_not_found(&ctx.path),
        }
    }

    /// Headers common to every response, HEAD body stripping, access log
    fn finish(&self, ctx: &RequestContext, resp: &mut HttpResponse) {
        let http = &self.state.config.http;
        if let Ok(value) = http.server_name.parse() {
            resp.headers_mut().insert("Server", value);
        }
        if http.enable_cors {
            resp.headers_mut()
                .insert("Access-Control-Allow-Origin", hyper::header::HeaderValue::from_static("*"));
        }

        let body_bytes = resp.body().size_hint().exact().unwrap_or(0);
        if ctx.is_head() {
            *resp.body_mut() = Full::new(Bytes::new());
        }

        if self.state.access_log_enabled() {
            let entry = AccessLogEntry {
                remote_addr: ctx.peer.map_or_else(|| "-".to_string(), |p| p.ip().to_string()),
                time: chrono::Local::now(),
                method: ctx.method.to_string(),
                path: ctx.path.clone(),
                query: ctx.raw_query.clone(),
                http_version: logger::http_version(ctx.version),
                status: resp.status().as_u16(),
                body_bytes: usize::try_from(body_bytes).unwrap_or(usize::MAX),
                referer: ctx.header("referer").map(ToString::to_string),
                user_agent: ctx.header("user-agent").map(ToString::to_string),
                request_time_us: u64::try_from(ctx.start.elapsed().as_micros())
                    .unwrap_or(u64::MAX),
            };
            logger::log_access(&entry, &self.state.config.logging.access_log_format);
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    app: Arc<App>,
    peer: SocketAddr,
) -> Result<HttpResponse, Infallible> {
    let (parts, body) = req.into_parts();
    let limit = usize::try_from(app.state.config.http.max_body_size).unwrap_or(usize::MAX);

    let (bytes, overflow) = match Limited::new(body, limit).collect().await {
        Ok(collected) => (collected.to_bytes(), false),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => (Bytes::new(), true),
        Err(e) => {
            tracing::warn!(%peer, error = %e, "failed to read request body");
            return Ok(response::error(&ApiError::bad_request(
                "Failed to read request body",
            )));
        }
    };

    let mut ctx = RequestContext::from_parts(parts, bytes, Some(peer));
    ctx.body_overflow = overflow;
    Ok(app.respond(ctx))
}

/// Register every route. Specific patterns come before the generic ones
/// they would otherwise be shadowed by.
pub fn build_router(config: &Config) -> Router {
    let mut router = Router::new();
    home::routes(&mut router);
    users::routes(&mut router);
    products::routes(&mut router, config.auth.protect_products);
    tasks::routes(&mut router);
    auth::routes(&mut router);
    katas::routes(&mut router);
    registro::routes(&mut router);
    library::routes(&mut router);
    grades::routes(&mut router);
    router
}

/// Parse a positive integer id
pub(crate) fn parse_id(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok().filter(|id| *id > 0)
}

/// Trimmed, non-empty string field of a JSON object
pub(crate) fn str_field(body: &serde_json::Value, key: &str) -> Option<String> {
    body.get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn ok_json<T: serde::Serialize + ?Sized>(value: &T) -> HttpResponse {
    response::json(StatusCode::OK, value)
}

/// Loose email shape check: `local@domain.tld`, no whitespace
pub(crate) fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use hyper::Method;

    pub fn test_app() -> App {
        App::new(AppState::new(test_config("data")).unwrap())
    }

    pub fn test_app_with(config: Config) -> App {
        App::new(AppState::new(config).unwrap())
    }

    /// Send a request through the whole pipeline, returning status and
    /// the body parsed as JSON (or as a JSON string for text bodies).
    pub async fn call(
        app: &App,
        method: Method,
        target: &str,
        body: Option<serde_json::Value>,
        token: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut ctx = RequestContext::new(method, target);
        if let Some(body) = body {
            ctx = ctx.with_body(body.to_string());
        }
        if let Some(token) = token {
            ctx = ctx.with_header("authorization", &format!("Bearer {token}"));
        }
        let resp = app.respond(ctx);
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let value = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        (status, value)
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(Some("12")), Some(12));
        assert_eq!(parse_id(Some("0")), None);
        assert_eq!(parse_id(Some("-3")), None);
        assert_eq!(parse_id(Some("abc")), None);
        assert_eq!(parse_id(None), None);
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("ana@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ana@@example.com"));
        assert!(!is_valid_email("ana @example.com"));
        assert!(!is_valid_email("ana@example..com"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404_with_path() {
        let app = test_app();
        let (status, body) = call(&app, Method::GET, "/nope/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Route not found");
        assert_eq!(body["path"], "/nope/nope");
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let app = test_app();
        let ctx = RequestContext::new(Method::PATCH, "/users");
        let resp = app.respond(ctx);
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        let allow = resp.headers()["Allow"].to_str().unwrap();
        assert!(allow.contains("GET"));
        assert!(allow.contains("POST"));
    }

    #[tokio::test]
    async fn test_server_header_and_head_body() {
        let app = test_app();
        let resp = app.respond(RequestContext::new(Method::HEAD, "/api"));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["Server"],
            app.state.config.http.server_name.as_str()
        );
        assert!(resp.headers().contains_key("Content-Length"));
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_options_short_circuits_before_routing() {
        let app = test_app();
        let (status, _) = call(&app, Method::OPTIONS, "/does/not/exist", None, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let mut cfg = test_config("data");
        cfg.http.max_body_size = 8;
        let app = test_app_with(cfg);
        let (status, _) = call(
            &app,
            Method::POST,
            "/users",
            Some(serde_json::json!({"name": "Ana Maria", "email": "ana@example.com"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
