//! `/auth` endpoints: register, login, profile

use chrono::{SecondsFormat, Utc};
use hyper::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{is_valid_email, ok_json, str_field};
use crate::auth::{new_account, verify_password};
use crate::config::AppState;
use crate::error::{ApiError, ApiResult, FieldError};
use crate::http::{response, HttpResponse, RequestContext};
use crate::middleware::{require_json, require_token, Middleware};
use crate::models::Role;
use crate::routing::Router;

const JSON_BODY: &[(&str, Middleware)] = &[("json", require_json)];
const SIGNED_IN: &[(&str, Middleware)] = &[("token", require_token)];

const MIN_PASSWORD_LEN: usize = 6;

pub fn routes(router: &mut Router) {
    router
        .route(Method::POST, "/auth/register", JSON_BODY, register)
        .route(Method::POST, "/auth/login", JSON_BODY, login)
        .route(Method::GET, "/auth/profile", SIGNED_IN, profile);
}

fn registration_errors(name: &str, email: &str, password: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if name.is_empty() || !name.chars().all(char::is_alphanumeric) {
        errors.push(FieldError::new("name", "Name is required and must be alphanumeric"));
    }
    if !is_valid_email(email) {
        errors.push(FieldError::new("email", "Valid email is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 6 characters long",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(FieldError::new(
            "password",
            "Password must contain at least one number",
        ));
    }
    errors
}

fn register(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let body = ctx.json_value()?;
    let name = str_field(&body, "name").unwrap_or_default();
    let email = str_field(&body, "email").unwrap_or_default();
    let password = body
        .get("password")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    let phone = str_field(&body, "phone");

    let errors = registration_errors(&name, &email, password);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let account = state.store.accounts.try_insert(|accounts| {
        if accounts.iter().any(|a| a.email.eq_ignore_ascii_case(&email)) {
            return Err(ApiError::bad_request("User already exists"));
        }
        Ok(new_account(&name, &email, phone, password, Role::Guest))
    })?;

    tracing::info!(account_id = account.id, "account registered");
    Ok(response::json(
        StatusCode::CREATED,
        &json!({
            "name": account.name,
            "email": account.email,
            "phone": account.phone,
        }),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

fn login(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let req: LoginRequest = ctx.json()?;
    let (Some(email), Some(password)) = (
        req.email.filter(|e| !e.trim().is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    let account = state
        .store
        .accounts
        .find(|a| a.email.eq_ignore_ascii_case(email.trim()))
        .filter(|a| verify_password(a, &password))
        .ok_or_else(|| {
            tracing::debug!(email = %email, "login rejected");
            ApiError::Unauthorized("Invalid credentials".into())
        })?;

    let token = state.sessions.issue(&account);
    tracing::info!(account_id = account.id, "login");
    Ok(ok_json(&json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": {
            "id": account.id,
            "name": account.name,
            "email": account.email,
            "role": account.role,
        },
    })))
}

fn profile(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let session = ctx
        .session
        .as_ref()
        .ok_or_else(|| ApiError::Unauthorized("Token not provided".into()))?;

    Ok(ok_json(&json!({
        "success": true,
        "message": "Profile retrieved",
        "data": {
            "id": session.account_id,
            "name": session.name,
            "email": session.email,
            "role": session.role,
            "lastAccess": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        },
    })))
}
