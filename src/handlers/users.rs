//! `/users` resource

use hyper::{Method, StatusCode};

use super::{ok_json, parse_id, str_field};
use crate::config::AppState;
use crate::error::{ApiError, ApiResult};
use crate::http::{response, HttpResponse, RequestContext};
use crate::middleware::{require_json, Middleware};
use crate::models::User;
use crate::routing::Router;

const JSON_BODY: &[(&str, Middleware)] = &[("json", require_json)];

pub fn routes(router: &mut Router) {
    router
        .get("/users", list)
        .route(Method::POST, "/users", JSON_BODY, create)
        .get("/users/:id", show)
        .route(Method::PUT, "/users/:id", JSON_BODY, update)
        .delete("/users/:id", remove);
}

fn user_id(ctx: &RequestContext) -> ApiResult<u64> {
    parse_id(ctx.param("id")).ok_or_else(|| ApiError::bad_request("Invalid user id"))
}

/// `(name, email)` from the request body
fn user_fields(ctx: &RequestContext) -> ApiResult<(String, String)> {
    let body = ctx.json_value()?;
    match (str_field(&body, "name"), str_field(&body, "email")) {
        (Some(name), Some(email)) => Ok((name, email)),
        _ => Err(ApiError::bad_request("Name and email are required")),
    }
}

fn email_taken(users: &[User], email: &str, except: Option<u64>) -> bool {
    users
        .iter()
        .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
}

fn list(_ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    Ok(ok_json(&state.store.users.list()))
}

fn show(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let id = user_id(ctx)?;
    let user = state
        .store
        .users
        .get(id)
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ok_json(&user))
}

fn create(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let (name, email) = user_fields(ctx)?;

    let user = state.store.users.try_insert(|users| {
        if email_taken(users, &email, None) {
            return Err(ApiError::Conflict("Email already in use".into()));
        }
        Ok(User { id: 0, name, email })
    })?;

    tracing::info!(user_id = user.id, "user created");
    Ok(response::json(StatusCode::CREATED, &user))
}

fn update(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let id = user_id(ctx)?;
    if state.store.users.get(id).is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    let (name, email) = user_fields(ctx)?;

    let updated = state.store.users.try_update(id, |users, user| {
        if email_taken(users, &email, Some(id)) {
            return Err(ApiError::Conflict("Email already in use".into()));
        }
        user.name = name;
        user.email = email;
        Ok(())
    })?;

    updated
        .map(|user| ok_json(&user))
        .ok_or_else(|| ApiError::not_found("User not found"))
}

fn remove(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let id = user_id(ctx)?;
    match state.store.users.remove(id)? {
        Some(_) => {
            tracing::info!(user_id = id, "user deleted");
            Ok(response::no_content())
        }
        None => Err(ApiError::not_found("User not found")),
    }
}
