//! `/products` resource
//!
//! Writes can be restricted to admin sessions with `auth.protect_products`.

use hyper::{Method, StatusCode};
use serde_json::Value;

use super::{ok_json, parse_id, str_field};
use crate::config::AppState;
use crate::error::{ApiError, ApiResult};
use crate::http::{response, HttpResponse, RequestContext};
use crate::middleware::{require_admin, require_json, require_token, Middleware};
use crate::models::Product;
use crate::routing::Router;

const OPEN_BODY: &[(&str, Middleware)] = &[("json", require_json)];
const ADMIN_BODY: &[(&str, Middleware)] = &[
    ("token", require_token),
    ("admin", require_admin),
    ("json", require_json),
];
const ADMIN_ONLY: &[(&str, Middleware)] = &[("token", require_token), ("admin", require_admin)];

pub fn routes(router: &mut Router, protect_writes: bool) {
    let (body, guard) = if protect_writes {
        (ADMIN_BODY, ADMIN_ONLY)
    } else {
        (OPEN_BODY, &[][..])
    };

    router
        .get("/products", list)
        .route(Method::POST, "/products", body, create)
        .get("/products/category/:category", by_category)
        .get("/products/:id", show)
        .route(Method::PUT, "/products/:id", body, update)
        .route(Method::DELETE, "/products/:id", guard, remove);
}

/// Validated product fields from a request body
struct ProductInput {
    name: String,
    price: f64,
    description: Option<String>,
    stock: Option<u32>,
    category: Option<String>,
}

impl ProductInput {
    fn from_body(body: &Value) -> ApiResult<Self> {
        let name = str_field(body, "name").ok_or_else(|| ApiError::bad_request("Name is required"))?;

        let price = body
            .get("price")
            .and_then(Value::as_f64)
            .filter(|p| p.is_finite() && *p >= 0.0)
            .ok_or_else(|| ApiError::bad_request("Price must be a non-negative number"))?;

        let stock = match body.get("stock") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                v.as_u64()
                    .and_then(|s| u32::try_from(s).ok())
                    .ok_or_else(|| ApiError::bad_request("Stock must be a non-negative integer"))?,
            ),
        };

        Ok(Self {
            name,
            price,
            description: str_field(body, "description"),
            stock,
            category: str_field(body, "category"),
        })
    }

    fn apply(self, product: &mut Product) {
        product.name = self.name;
        product.price = self.price;
        product.description = self.description;
        product.stock = self.stock;
        product.category = self.category;
    }
}

fn product_id(ctx: &RequestContext) -> ApiResult<u64> {
    parse_id(ctx.param("id")).ok_or_else(|| ApiError::not_found("Product not found"))
}

fn in_category(product: &Product, category: &str) -> bool {
    product
        .category
        .as_deref()
        .is_some_and(|c| c.eq_ignore_ascii_case(category.trim()))
}

fn list(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let products = match ctx.query("category").filter(|c| !c.trim().is_empty()) {
        Some(category) => state.store.products.filter(|p| in_category(p, category)),
        None => state.store.products.list(),
    };
    Ok(ok_json(&products))
}

fn by_category(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let category = ctx.param("category").unwrap_or_default();
    let products = state.store.products.filter(|p| in_category(p, category));
    if products.is_empty() {
        return Err(ApiError::not_found("No products found in this category"));
    }
    Ok(ok_json(&products))
}

fn show(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let id = product_id(ctx)?;
    let product = state
        .store
        .products
        .get(id)
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(ok_json(&product))
}

fn create(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let input = ProductInput::from_body(&ctx.json_value()?)?;

    let mut product = Product {
        id: 0,
        name: String::new(),
        price: 0.0,
        description: None,
        stock: None,
        category: None,
    };
    input.apply(&mut product);
    let product = state.store.products.insert(product)?;

    tracing::info!(product_id = product.id, "product created");
    Ok(response::json(StatusCode::CREATED, &product))
}

fn update(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let id = product_id(ctx)?;
    if state.store.products.get(id).is_none() {
        return Err(ApiError::not_found("Product not found"));
    }
    let input = ProductInput::from_body(&ctx.json_value()?)?;

    state
        .store
        .products
        .update(id, |product| input.apply(product))?
        .map(|product| ok_json(&product))
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

fn remove(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let id = product_id(ctx)?;
    match state.store.products.remove(id)? {
        Some(_) => Ok(response::no_content()),
        None => Err(ApiError::not_found("Product not found")),
    }
}
