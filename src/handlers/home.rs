//! Landing text, API info and the team data file

use hyper::StatusCode;
use serde_json::json;

use super::ok_json;
use crate::config::AppState;
use crate::error::ApiResult;
use crate::http::{response, HttpResponse, RequestContext};
use crate::routing::Router;

const TEAM_FILE: &str = "equipo.json";

pub fn routes(router: &mut Router) {
    router
        .get("/", welcome)
        .get("/api", api_info)
        .get("/equipo", team);
}

fn welcome(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let name = ctx.query("name").map(str::trim).filter(|n| !n.is_empty());
    let admin = ctx.query("admin") == Some("true");

    let text = match (name, admin) {
        (Some(name), true) => format!("Hola {name}, eres admin"),
        (None, true) => "Hola, admin!".to_string(),
        (Some(name), false) => format!("Hola {name}!"),
        (None, false) => "¡Hola inadaptados!".to_string(),
    };
    Ok(response::text(StatusCode::OK, text))
}

fn api_info(_ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    Ok(ok_json(&json!({
        "nombre": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "mensaje": "Hola desde la API",
        "uptime_secs": state.started_at.elapsed().as_secs(),
    })))
}

/// Serve `<data_dir>/equipo.json` as-is
fn team(_ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let path = state.store.data_dir().join(TEAM_FILE);
    let parsed = std::fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|content| {
            serde_json::from_str::<serde_json::Value>(&content).map_err(|e| e.to_string())
        });

    match parsed {
        Ok(team) => Ok(ok_json(&team)),
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "failed to read team file");
            Ok(response::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "error": "Failed to read team file" }),
            ))
        }
    }
}
