//! Small challenge endpoints
//!
//! Paths and JSON keys keep the names clients already call them by.

use chrono::Datelike;
use hyper::{Method, StatusCode};
use rand::Rng;
use serde_json::{json, Map, Value};

use super::ok_json;
use crate::config::AppState;
use crate::error::{ApiError, ApiResult};
use crate::http::{response, HttpResponse, RequestContext};
use crate::middleware::{require_json, Middleware};
use crate::models::json_number;
use crate::routing::Router;

const JSON_BODY: &[(&str, Middleware)] = &[("json", require_json)];

const ABSOLUTE_ZERO_C: f64 = -273.15;
const ABSOLUTE_ZERO_F: f64 = -459.67;
const ENIGMA_EXTRAS: &[u8] = b"!@#$%^&*";
const PASSWORD_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";
const PASSWORD_LEN: usize = 6;

pub fn routes(router: &mut Router) {
    router
        .get("/suma/:a/:b", suma)
        .get("/saludo/:nombre", saludo)
        .get("/perfil/:usuario", perfil)
        .get("/api/edad", edad)
        .get("/api/buscar", buscar)
        .get("/invertir", invertir)
        .get("/palindromo", palindromo)
        .get("/mayor", mayor)
        .get("/filtrar", filtrar)
        .route(Method::POST, "/contar", JSON_BODY, contar)
        .get("/primo/:n", primo)
        .get("/temperatura", temperatura)
        .get("/enigma", enigma)
        .get("/password", password)
        .get("/generatePassword", generate_password);
}

/// Finite number from user input
fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Comma separated numbers; `None` if any item is not a number
fn parse_list(raw: &str) -> Option<Vec<f64>> {
    raw.split(',').map(parse_number).collect()
}

fn required_query<'a>(ctx: &'a RequestContext, name: &str) -> ApiResult<&'a str> {
    ctx.query(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("El parámetro '{name}' es requerido")))
}

fn numbers_json(values: &[f64]) -> Vec<Value> {
    values.iter().copied().map(json_number).collect()
}

fn suma(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let a = ctx.param("a").and_then(parse_number);
    let b = ctx.param("b").and_then(parse_number);
    match (a, b) {
        (Some(a), Some(b)) if (a + b).is_finite() => {
            Ok(ok_json(&json!({ "resultado": json_number(a + b) })))
        }
        _ => Err(ApiError::bad_request("Parámetros inválidos")),
    }
}

fn saludo(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let nombre = ctx.param("nombre").unwrap_or_default();
    Ok(ok_json(&json!({ "mensaje": format!("Hola {nombre}!") })))
}

fn perfil(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let usuario = ctx.param("usuario").unwrap_or_default();
    let lang = ctx.query("lang").filter(|l| !l.is_empty());
    let mensaje = match lang {
        Some("es") => format!("Bienvenido {usuario}"),
        Some("fr") => format!("Bienvenue {usuario}"),
        _ => format!("Welcome {usuario}"),
    };
    Ok(ok_json(&json!({
        "mensaje": mensaje,
        "language": lang.unwrap_or("default"),
    })))
}

fn edad(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let current = chrono::Local::now().year();
    let anio = ctx
        .query("anioNacimiento")
        .and_then(|v| v.trim().parse::<i32>().ok())
        .filter(|y| (1..current).contains(y))
        .ok_or_else(|| ApiError::bad_request("Año inválido"))?;

    Ok(ok_json(&json!({
        "anioNacimiento": anio,
        "edad": current - anio,
    })))
}

fn buscar(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let (Some(producto), Some(categoria)) = (
        ctx.query("producto").filter(|v| !v.is_empty()),
        ctx.query("categoria").filter(|v| !v.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Faltan parámetros en la ruta"));
    };

    Ok(ok_json(&json!({
        "busqueda": producto,
        "categoria": categoria,
        "mensaje": format!("Buscando {producto} en la categoría {categoria}..."),
    })))
}

pub(crate) fn reverse(text: &str) -> String {
    text.chars().rev().collect()
}

pub(crate) fn is_palindrome(text: &str) -> bool {
    let cleaned: Vec<char> = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    cleaned.iter().eq(cleaned.iter().rev())
}

fn invertir(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let texto = ctx
        .query("texto")
        .ok_or_else(|| ApiError::bad_request("El parámetro 'texto' es requerido"))?;
    if texto.trim().is_empty() {
        return Err(ApiError::bad_request("El texto no puede estar vacío"));
    }
    Ok(ok_json(&json!({
        "original": texto,
        "invertido": reverse(texto),
    })))
}

fn palindromo(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let texto = required_query(ctx, "texto")?;
    let palindromo = is_palindrome(texto);
    Ok(ok_json(&json!({
        "original": texto,
        "palindromo": palindromo,
        "mensaje": if palindromo { "¡Es un palíndromo!" } else { "No es un palíndromo" },
    })))
}

fn mayor(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let numeros = parse_list(required_query(ctx, "numeros")?).ok_or_else(|| {
        ApiError::bad_request("El parámetro 'numeros' debe contener solo números separados por comas")
    })?;
    let mayor = numeros.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(ok_json(&json!({
        "numeros": numbers_json(&numeros),
        "mayor": json_number(mayor),
    })))
}

/// Even and odd values of `numbers`, in order
pub(crate) fn split_parity(numbers: &[i64]) -> (Vec<i64>, Vec<i64>) {
    numbers.iter().partition(|n| *n % 2 == 0)
}

fn filtrar(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let raw = required_query(ctx, "numeros")?;
    let mut numeros = raw
        .split(',')
        .map(|n| n.trim().parse::<i64>().ok())
        .collect::<Option<Vec<i64>>>()
        .ok_or_else(|| {
            ApiError::bad_request("El parámetro 'numeros' debe contener solo enteros separados por comas")
        })?;

    if ctx.query("unique") == Some("true") {
        let mut seen = Vec::with_capacity(numeros.len());
        numeros.retain(|n| {
            if seen.contains(n) {
                false
            } else {
                seen.push(*n);
                true
            }
        });
    }

    let (pares, impares) = split_parity(&numeros);
    let mut out = Map::new();
    out.insert("original".into(), json!(numeros));
    match ctx.query("only") {
        Some("pares") => {
            out.insert("pares".into(), json!(pares));
        }
        Some("impares") => {
            out.insert("impares".into(), json!(impares));
        }
        _ => {
            out.insert("pares".into(), json!(pares));
            out.insert("impares".into(), json!(impares));
        }
    }
    Ok(ok_json(&out))
}

fn contar(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let body = ctx.json_value()?;
    let Value::Object(objeto) = body else {
        return Err(ApiError::bad_request("El cuerpo debe ser un objeto JSON válido."));
    };

    let mut out = Map::new();
    out.insert("propiedades".into(), json!(objeto.len()));
    if ctx.query("detallado") == Some("true") {
        let claves: Vec<&String> = objeto.keys().collect();
        out.insert("detalles".into(), json!(claves));
    }
    Ok(ok_json(&out))
}

pub(crate) fn is_prime(n: u64) -> bool {
    if n <= 1 {
        return false;
    }
    if n == 2 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut i = 3;
    while i <= n / i {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

fn primo(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let n = ctx
        .param("n")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| ApiError::bad_request("El parámetro debe ser un entero no negativo"))?;
    Ok(ok_json(&json!({ "numero": n, "primo": is_prime(n) })))
}

/// Round to one decimal place. Magnitudes this large carry no fraction.
fn round1(value: f64) -> f64 {
    if value.abs() >= 1e15 {
        return value;
    }
    (value * 10.0).round() / 10.0
}

fn temperatura(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let grados = parse_number(required_query(ctx, "grados")?)
        .ok_or_else(|| ApiError::bad_request("El parámetro 'grados' debe ser numérico"))?;

    let (convertido, unidad) = match ctx.query("a").unwrap_or("fahrenheit") {
        "fahrenheit" => {
            if grados < ABSOLUTE_ZERO_C {
                return Err(ApiError::bad_request(
                    "No existen temperaturas por debajo del cero absoluto",
                ));
            }
            (grados * 9.0 / 5.0 + 32.0, "fahrenheit")
        }
        "celsius" => {
            if grados < ABSOLUTE_ZERO_F {
                return Err(ApiError::bad_request(
                    "No existen temperaturas por debajo del cero absoluto",
                ));
            }
            ((grados - 32.0) * 5.0 / 9.0, "celsius")
        }
        _ => {
            return Err(ApiError::bad_request(
                "El parámetro 'a' debe ser 'fahrenheit' o 'celsius'",
            ))
        }
    };
    if !convertido.is_finite() {
        return Err(ApiError::bad_request("El parámetro 'grados' está fuera de rango"));
    }

    Ok(ok_json(&json!({
        "grados": json_number(grados),
        "convertido": json_number(round1(convertido)),
        "unidad": unidad,
    })))
}

/// Reverse, swap vowels for look-alikes, then append two random symbols
pub(crate) fn encode_enigma(message: &str, rng: &mut impl Rng) -> String {
    let mut out: String = message
        .chars()
        .rev()
        .map(|c| match c.to_ascii_lowercase() {
            'a' => '4',
            'e' => '3',
            'i' => '1',
            'o' => '0',
            'u' => '_',
            _ => c,
        })
        .collect();
    for _ in 0..2 {
        out.push(char::from(ENIGMA_EXTRAS[rng.gen_range(0..ENIGMA_EXTRAS.len())]));
    }
    out
}

fn enigma(ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let mensaje = required_query(ctx, "mensaje")?;
    let encoded = encode_enigma(mensaje, &mut rand::thread_rng());
    Ok(response::text(StatusCode::OK, encoded))
}

fn password(_ctx: &RequestContext, _state: &AppState) -> ApiResult<HttpResponse> {
    let mut rng = rand::thread_rng();
    let password: String = (0..PASSWORD_LEN)
        .map(|_| char::from(PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())]))
        .collect();
    Ok(response::text(StatusCode::OK, password))
}

/// `length` random hex characters
pub(crate) fn random_hex(length: usize, rng: &mut impl Rng) -> String {
    let mut bytes = vec![0u8; length.div_ceil(2)];
    rng.fill(bytes.as_mut_slice());
    let mut hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    hex.truncate(length);
    hex
}

fn generate_password(_ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let text = match state.config.generator.password_length.filter(|len| *len > 0) {
        Some(length) => {
            let password = random_hex(length, &mut rand::thread_rng());
            tracing::debug!(length, "password generated");
            format!("Generated password: {password}")
        }
        None => "No password length provided.".to_string(),
    };
    Ok(response::text(StatusCode::OK, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::handlers::tests::{call, test_app, test_app_with};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_helpers() {
        assert_eq!(reverse("JavaScript"), "tpircSavaJ");
        assert!(is_palindrome("Anita lava la tina"));
        assert!(is_palindrome("reconocer"));
        assert!(!is_palindrome("hola"));
        assert_eq!(split_parity(&[-3, -2, 0, 1, 4]), (vec![-2, 0, 4], vec![-3, 1]));
        let primes: Vec<u64> = (0..30).filter(|n| is_prime(*n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert_eq!(parse_list("5, 3,9"), Some(vec![5.0, 3.0, 9.0]));
        assert_eq!(parse_list("5,x"), None);
        assert_eq!(round1(98.6000001), 98.6);
        assert_eq!(round1(1e300), 1e300);
    }

    #[test]
    fn test_enigma_encoding() {
        let mut rng = StdRng::seed_from_u64(7);
        let encoded = encode_enigma("Hola Mundo", &mut rng);
        assert!(encoded.starts_with("0dn_M 4l0H"));
        assert_eq!(encoded.chars().count(), "Hola Mundo".len() + 2);
        let extras: Vec<char> = encoded.chars().rev().take(2).collect();
        assert!(extras.iter().all(|c| "!@#$%^&*".contains(*c)));
    }

    #[test]
    fn test_random_hex_length() {
        let mut rng = StdRng::seed_from_u64(1);
        for len in [1, 7, 16] {
            let hex = random_hex(len, &mut rng);
            assert_eq!(hex.len(), len);
            assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[tokio::test]
    async fn test_suma_saludo_perfil() {
        let app = test_app();
        let (_, body) = call(&app, Method::GET, "/suma/5/3", None, None).await;
        assert_eq!(body, json!({"resultado": 8}));

        let (_, body) = call(&app, Method::GET, "/suma/1.5/2", None, None).await;
        assert_eq!(body["resultado"], 3.5);

        let (status, _) = call(&app, Method::GET, "/suma/a/3", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, Method::GET, "/suma/1e308/1e308", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Parámetros inválidos");

        let (_, body) = call(&app, Method::GET, "/saludo/Ana", None, None).await;
        assert_eq!(body["mensaje"], "Hola Ana!");

        let (_, body) = call(&app, Method::GET, "/perfil/ana?lang=fr", None, None).await;
        assert_eq!(body, json!({"mensaje": "Bienvenue ana", "language": "fr"}));

        let (_, body) = call(&app, Method::GET, "/perfil/ana", None, None).await;
        assert_eq!(body["language"], "default");
    }

    #[tokio::test]
    async fn test_edad_and_buscar() {
        let app = test_app();
        let current = chrono::Local::now().year();

        let (status, body) = call(&app, Method::GET, "/api/edad?anioNacimiento=2000", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["edad"], current - 2000);

        let future = format!("/api/edad?anioNacimiento={current}");
        for target in [
            "/api/edad",
            "/api/edad?anioNacimiento=abc",
            "/api/edad?anioNacimiento=0",
            "/api/edad?anioNacimiento=-5",
            "/api/edad?anioNacimiento=-2147483648",
            future.as_str(),
        ] {
            let (status, _) = call(&app, Method::GET, target, None, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "for {target}");
        }

        let (_, body) = call(&app, Method::GET, "/api/buscar?producto=cafe&categoria=bebidas", None, None).await;
        assert_eq!(body["mensaje"], "Buscando cafe en la categoría bebidas...");
        let (status, _) = call(&app, Method::GET, "/api/buscar?producto=cafe", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_text_endpoints() {
        let app = test_app();
        let (_, body) = call(&app, Method::GET, "/invertir?texto=hola", None, None).await;
        assert_eq!(body["invertido"], "aloh");

        let (status, body) = call(&app, Method::GET, "/invertir?texto=%20", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "El texto no puede estar vacío");

        let (_, body) = call(&app, Method::GET, "/palindromo?texto=Oso", None, None).await;
        assert_eq!(body["palindromo"], true);

        let (status, body) = call(&app, Method::GET, "/enigma?mensaje=hola", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_str().unwrap().starts_with("4l0h"));

        let (_, body) = call(&app, Method::GET, "/password", None, None).await;
        let password = body.as_str().unwrap();
        assert_eq!(password.len(), PASSWORD_LEN);
        assert!(password.bytes().all(|b| PASSWORD_CHARSET.contains(&b)));
    }

    #[tokio::test]
    async fn test_number_endpoints() {
        let app = test_app();
        let (_, body) = call(&app, Method::GET, "/mayor?numeros=5,3,9,1", None, None).await;
        assert_eq!(body, json!({"numeros": [5, 3, 9, 1], "mayor": 9}));

        let (status, _) = call(&app, Method::GET, "/mayor?numeros=5,x", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(&app, Method::GET, "/filtrar?numeros=1,2,2,3,4&unique=true", None, None).await;
        assert_eq!(body, json!({"original": [1, 2, 3, 4], "pares": [2, 4], "impares": [1, 3]}));

        let (_, body) = call(&app, Method::GET, "/filtrar?numeros=1,2,3&only=pares", None, None).await;
        assert_eq!(body, json!({"original": [1, 2, 3], "pares": [2]}));

        let (_, body) = call(&app, Method::GET, "/primo/97", None, None).await;
        assert_eq!(body, json!({"numero": 97, "primo": true}));

        let (_, body) = call(&app, Method::GET, "/temperatura?grados=100", None, None).await;
        assert_eq!(body["convertido"], 212);

        let (_, body) = call(&app, Method::GET, "/temperatura?grados=100&a=celsius", None, None).await;
        assert_eq!(body["convertido"], 37.8);

        let (status, _) = call(&app, Method::GET, "/temperatura?grados=-300", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, Method::GET, "/temperatura?grados=1e308", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "El parámetro 'grados' está fuera de rango");
    }

    #[tokio::test]
    async fn test_contar() {
        let app = test_app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/contar?detallado=true",
            Some(json!({"a": 1, "b": 2})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["propiedades"], 2);
        assert_eq!(body["detalles"], json!(["a", "b"]));

        let (status, _) = call(&app, Method::POST, "/contar", Some(json!([1, 2])), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generate_password() {
        let app = test_app();
        let (_, body) = call(&app, Method::GET, "/generatePassword", None, None).await;
        assert_eq!(body, json!("No password length provided."));

        let mut cfg = test_config("data");
        cfg.generator.password_length = Some(12);
        let app = test_app_with(cfg);
        let (_, body) = call(&app, Method::GET, "/generatePassword", None, None).await;
        let text = body.as_str().unwrap();
        let password = text.strip_prefix("Generated password: ").unwrap();
        assert_eq!(password.len(), 12);
    }
}
