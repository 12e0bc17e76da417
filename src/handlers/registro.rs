//! `POST /registro`: sign-up form validation without storage

use hyper::{Method, StatusCode};
use serde_json::{json, Value};

use super::{is_valid_email, str_field};
use crate::config::AppState;
use crate::error::{ApiError, ApiResult, FieldError};
use crate::http::{response, HttpResponse, RequestContext};
use crate::middleware::{require_json, Middleware};
use crate::routing::Router;

const JSON_BODY: &[(&str, Middleware)] = &[("json", require_json)];

const MIN_NAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;
const AGE_RANGE: std::ops::RangeInclusive<i64> = 18..=99;

pub fn routes(router: &mut Router) {
    router.route(Method::POST, "/registro", JSON_BODY, registro);
}

/// Whole-number age from a JSON number or numeric string
fn age(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn name_errors(nombre: &str, errors: &mut Vec<FieldError>) {
    if nombre.is_empty() {
        errors.push(FieldError::new("nombre", "El nombre es obligatorio"));
        return;
    }
    if nombre.chars().count() < MIN_NAME_LEN {
        errors.push(FieldError::new(
            "nombre",
            "El nombre debe tener al menos 3 caracteres",
        ));
    }
    if !nombre.chars().all(|c| c.is_alphabetic() || c == ' ') {
        errors.push(FieldError::new(
            "nombre",
            "El nombre solo puede contener letras y espacios",
        ));
    }
}

fn password_errors(password: &str, errors: &mut Vec<FieldError>) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "contraseña",
            "La contraseña debe tener al menos 8 caracteres",
        ));
    }
    let upper = password.chars().any(char::is_uppercase);
    let lower = password.chars().any(char::is_lowercase);
    let digit = password.chars().any(|c| c.is_ascii_digit());
    if !(upper && lower && digit) {
        errors.push(FieldError::new(
            "contraseña",
            "La contraseña debe contener al menos una mayúscula, una minúscula y un número",
        ));
    }
}

fn registro(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let body = ctx.json_value()?;
    let nombre = str_field(&body, "nombre").unwrap_or_default();
    let correo = str_field(&body, "correo").unwrap_or_default();
    let edad = age(body.get("edad"));
    let password = body
        .get("contraseña")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut errors = Vec::new();
    name_errors(&nombre, &mut errors);
    if !is_valid_email(&correo) {
        errors.push(FieldError::new("correo", "Debe ser un correo válido"));
    }
    if !edad.is_some_and(|e| AGE_RANGE.contains(&e)) {
        errors.push(FieldError::new(
            "edad",
            "La edad debe ser un número entre 18 y 99",
        ));
    }
    password_errors(password, &mut errors);

    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "registration rejected");
        return Err(ApiError::Validation(errors));
    }

    Ok(response::json(
        StatusCode::CREATED,
        &json!({
            "success": true,
            "mensaje": "Usuario registrado con éxito",
            "data": { "nombre": nombre, "correo": correo, "edad": edad },
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{call, test_app};

    fn fields(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn test_name_rules() {
        let mut errors = Vec::new();
        name_errors("José María", &mut errors);
        assert!(errors.is_empty());

        name_errors("", &mut errors);
        assert_eq!(errors.len(), 1);

        errors.clear();
        name_errors("J2", &mut errors);
        assert_eq!(fields(&errors), vec!["nombre", "nombre"]);
    }

    #[test]
    fn test_password_rules() {
        let mut errors = Vec::new();
        password_errors("Secreto123", &mut errors);
        assert!(errors.is_empty());

        password_errors("secreto123", &mut errors);
        assert_eq!(errors.len(), 1);

        errors.clear();
        password_errors("Ab1", &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_age_parsing() {
        assert_eq!(age(Some(&json!(30))), Some(30));
        assert_eq!(age(Some(&json!("42"))), Some(42));
        assert_eq!(age(Some(&json!(30.5))), None);
        assert_eq!(age(None), None);
    }

    #[tokio::test]
    async fn test_registro_accepts_valid_form() {
        let app = test_app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/registro",
            Some(json!({
                "nombre": "Ana Perez",
                "correo": "ana@example.com",
                "edad": 25,
                "contraseña": "Secreto123",
            })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["mensaje"], "Usuario registrado con éxito");
        assert_eq!(body["data"]["edad"], 25);
    }

    #[tokio::test]
    async fn test_registro_lists_every_error() {
        let app = test_app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/registro",
            Some(json!({"nombre": "A", "correo": "nope", "edad": 12, "contraseña": "abc"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"nombre"));
        assert!(fields.contains(&"correo"));
        assert!(fields.contains(&"edad"));
        assert!(fields.contains(&"contraseña"));
    }
}
