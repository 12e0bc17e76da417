// Middlewares applied to every request

use chrono::{SecondsFormat, Utc};
use hyper::Method;

use super::Flow;
use crate::config::AppState;
use crate::error::ApiError;
use crate::http::{self, response, RequestContext};

/// Log `<iso-time> | METHOD url`
pub fn log_request(ctx: &mut RequestContext, _state: &AppState) -> Flow {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    tracing::info!(target: "kata_server::request", "{now} | {} {}", ctx.method, ctx.url());
    Flow::Next
}

/// Answer `OPTIONS` requests directly
pub fn cors_preflight(ctx: &mut RequestContext, state: &AppState) -> Flow {
    if ctx.method == Method::OPTIONS {
        return Flow::Halt(response::options(state.config.http.enable_cors));
    }
    Flow::Next
}

/// Reject bodies above `http.max_body_size`
pub fn limit_body(ctx: &mut RequestContext, state: &AppState) -> Flow {
    let limit = state.config.http.max_body_size;
    let declared = ctx.content_length().unwrap_or(0);
    let received = ctx.body.len() as u64;

    if ctx.body_overflow || declared > limit || received > limit {
        tracing::warn!(
            path = %ctx.path,
            declared,
            received,
            limit,
            "request body too large"
        );
        return Flow::fail(&ApiError::PayloadTooLarge { limit });
    }
    Flow::Next
}

/// Decode the query string into `ctx.query`
pub fn parse_query(ctx: &mut RequestContext, _state: &AppState) -> Flow {
    if let Some(raw) = &ctx.raw_query {
        ctx.query = http::parse_query(raw);
    }
    Flow::Next
}
