// Route-level middlewares: body and credential checks

use super::Flow;
use crate::auth::TokenLookup;
use crate::config::AppState;
use crate::error::ApiError;
use crate::http::RequestContext;

/// Require a non-empty, well-formed JSON body
pub fn require_json(ctx: &mut RequestContext, _state: &AppState) -> Flow {
    match ctx.json_value() {
        Ok(_) => Flow::Next,
        Err(err) => Flow::fail(&err),
    }
}

/// Resolve `Authorization: Bearer <token>` into `ctx.session`
pub fn require_token(ctx: &mut RequestContext, state: &AppState) -> Flow {
    let Some(header) = ctx.header("authorization") else {
        return Flow::fail(&ApiError::Unauthorized("Token not provided".into()));
    };

    let token = match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        _ => "",
    };
    if token.is_empty() {
        return Flow::fail(&ApiError::Unauthorized("Invalid token format".into()));
    }

    match state.sessions.lookup(token) {
        TokenLookup::Valid(session) => {
            ctx.session = Some(session);
            Flow::Next
        }
        TokenLookup::Expired => Flow::fail(&ApiError::Unauthorized("Token expired".into())),
        TokenLookup::Unknown => Flow::fail(&ApiError::Forbidden("Invalid token".into())),
    }
}

/// Require an admin session. Must run after [`require_token`].
pub fn require_admin(ctx: &mut RequestContext, _state: &AppState) -> Flow {
    match &ctx.session {
        Some(session) if session.is_admin() => Flow::Next,
        _ => Flow::fail(&ApiError::Forbidden("Forbidden".into())),
    }
}
