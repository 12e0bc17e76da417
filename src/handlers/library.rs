//! Library resources: `/autores`, `/libros` and book reviews
//!
//! Books reference their author by id and are returned with the author
//! embedded. Deleting a book drops its reviews.

use chrono::{NaiveDate, SecondsFormat, Utc};
use hyper::{Method, StatusCode};
use serde_json::Value;

use super::{ok_json, parse_id, str_field};
use crate::config::AppState;
use crate::error::{ApiError, ApiResult, FieldError};
use crate::http::{response, HttpResponse, RequestContext};
use crate::middleware::{require_json, Middleware};
use crate::models::{Author, Book, BookView, Review};
use crate::routing::Router;

const JSON_BODY: &[(&str, Middleware)] = &[("json", require_json)];

const SCORE_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

pub fn routes(router: &mut Router) {
    router
        .get("/autores", list_authors)
        .route(Method::POST, "/autores", JSON_BODY, create_author)
        .get("/libros", list_books)
        .route(Method::POST, "/libros", JSON_BODY, create_book)
        .get("/libros/:id", show_book)
        .route(Method::PUT, "/libros/:id", JSON_BODY, update_book)
        .delete("/libros/:id", remove_book)
        .get("/libros/:id/resenas", list_reviews)
        .route(Method::POST, "/libros/:id/resenas", JSON_BODY, create_review);
}

fn book_not_found() -> ApiError {
    ApiError::not_found("Libro no encontrado")
}

/// Id of an existing book. Malformed ids are 400, unknown ones 404.
fn existing_book(ctx: &RequestContext, state: &AppState) -> ApiResult<Book> {
    let id = parse_id(ctx.param("id")).ok_or_else(|| ApiError::bad_request("ID inválido"))?;
    state.store.books.get(id).ok_or_else(book_not_found)
}

/// Read an optional field. An absent field is an error only when
/// `required`; a present one must parse.
fn field<T>(
    body: &Value,
    key: &str,
    parse: impl FnOnce(&Value) -> Option<T>,
    (missing, invalid): (&str, &str),
    required: bool,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    match body.get(key) {
        None | Some(Value::Null) => {
            if required {
                errors.push(FieldError::new(key, missing));
            }
            None
        }
        Some(value) => {
            let parsed = parse(value);
            if parsed.is_none() {
                errors.push(FieldError::new(key, invalid));
            }
            parsed
        }
    }
}

fn text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn list_authors(_ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    Ok(ok_json(&state.store.authors.list()))
}

fn create_author(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let body = ctx.json_value()?;
    let mut errors = Vec::new();

    let name = str_field(&body, "nombre");
    if name.is_none() {
        errors.push(FieldError::new("nombre", "El nombre es obligatorio"));
    }
    let nationality = str_field(&body, "nacionalidad");
    if nationality.is_none() {
        errors.push(FieldError::new("nacionalidad", "La nacionalidad es obligatoria"));
    }
    let birth_date = field(
        &body,
        "fechaNacimiento",
        |v| {
            v.as_str()
                .filter(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
                .map(ToString::to_string)
        },
        ("", "La fecha de nacimiento debe tener el formato AAAA-MM-DD"),
        false,
        &mut errors,
    );

    let (Some(name), Some(nationality)) = (name, nationality) else {
        return Err(ApiError::Validation(errors));
    };
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let author = state.store.authors.insert(Author {
        id: 0,
        name,
        nationality,
        birth_date,
    })?;
    tracing::info!(author_id = author.id, "author created");
    Ok(response::json(StatusCode::CREATED, &author))
}

fn list_books(_ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let authors = state.store.authors.list();
    let books: Vec<BookView> = state
        .store
        .books
        .list()
        .into_iter()
        .map(|book| BookView::resolve(book, &authors))
        .collect();
    Ok(ok_json(&books))
}

fn show_book(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let book = existing_book(ctx, state)?;
    let reviews = state.store.reviews.filter(|r| r.book_id == book.id);
    let view = BookView::resolve(book, &state.store.authors.list()).with_reviews(reviews);
    Ok(ok_json(&view))
}

/// Book fields from a request body. On create every field is required; on
/// update only the present ones are checked and applied.
struct BookInput {
    title: Option<String>,
    year: Option<i32>,
    genre: Option<String>,
    author_id: Option<u64>,
}

impl BookInput {
    fn from_body(body: &Value, required: bool) -> ApiResult<Self> {
        let mut errors = Vec::new();
        let title = field(
            body,
            "titulo",
            text,
            ("El título es obligatorio", "El título no puede estar vacío"),
            required,
            &mut errors,
        );
        let year = field(
            body,
            "año",
            |v| v.as_i64().and_then(|y| i32::try_from(y).ok()),
            ("El año es obligatorio", "El año debe ser un número entero"),
            required,
            &mut errors,
        );
        let genre = field(
            body,
            "genero",
            text,
            ("El género es obligatorio", "El género no puede estar vacío"),
            required,
            &mut errors,
        );
        let author_id = field(
            body,
            "autorId",
            |v| v.as_u64().filter(|id| *id > 0),
            ("El autor es obligatorio", "El autorId debe ser un ID válido"),
            required,
            &mut errors,
        );

        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }
        Ok(Self {
            title,
            year,
            genre,
            author_id,
        })
    }

    /// Reject an `autorId` that names no author
    fn check_author(&self, state: &AppState) -> ApiResult<()> {
        match self.author_id {
            Some(id) if state.store.authors.get(id).is_none() => {
                Err(ApiError::bad_request("Autor no encontrado"))
            }
            _ => Ok(()),
        }
    }

    fn apply(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(year) = self.year {
            book.year = year;
        }
        if let Some(genre) = self.genre {
            book.genre = genre;
        }
        if let Some(author_id) = self.author_id {
            book.author_id = author_id;
        }
    }
}

fn title_taken(books: &[Book], title: &str, except: u64) -> bool {
    books.iter().any(|b| b.id != except && b.title == title)
}

fn create_book(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let input = BookInput::from_body(&ctx.json_value()?, true)?;
    input.check_author(state)?;

    let book = state.store.books.try_insert(|books| {
        let mut book = Book {
            id: 0,
            title: String::new(),
            year: 0,
            genre: String::new(),
            author_id: 0,
        };
        input.apply(&mut book);
        if title_taken(books, &book.title, 0) {
            return Err(ApiError::bad_request("El título ya existe"));
        }
        Ok(book)
    })?;

    tracing::info!(book_id = book.id, author_id = book.author_id, "book created");
    let view = BookView::resolve(book, &state.store.authors.list());
    Ok(response::json(StatusCode::CREATED, &view))
}

fn update_book(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let id = existing_book(ctx, state)?.id;
    let input = BookInput::from_body(&ctx.json_value()?, false)?;
    input.check_author(state)?;

    let book = state
        .store
        .books
        .try_update(id, |books, book| {
            input.apply(book);
            if title_taken(books, &book.title, id) {
                return Err(ApiError::bad_request("El título ya existe"));
            }
            Ok(())
        })?
        .ok_or_else(book_not_found)?;

    Ok(ok_json(&BookView::resolve(book, &state.store.authors.list())))
}

fn remove_book(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let id = existing_book(ctx, state)?.id;
    if state.store.books.remove(id)?.is_none() {
        return Err(book_not_found());
    }

    let reviews = state.store.reviews.remove_where(|r| r.book_id == id)?;
    tracing::info!(book_id = id, reviews, "book deleted");
    Ok(response::no_content())
}

fn list_reviews(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let book = existing_book(ctx, state)?;
    Ok(ok_json(&state.store.reviews.filter(|r| r.book_id == book.id)))
}

/// Whole-number score, reporting which bound was crossed
fn score(value: &Value, errors: &mut Vec<FieldError>) -> Option<u8> {
    let Some(n) = value.as_i64() else {
        errors.push(FieldError::new("puntuacion", "La puntuación debe ser un número entero"));
        return None;
    };
    if n < *SCORE_RANGE.start() {
        errors.push(FieldError::new("puntuacion", "La puntuación debe ser al menos 1"));
        return None;
    }
    if n > *SCORE_RANGE.end() {
        errors.push(FieldError::new("puntuacion", "La puntuación no puede ser mayor a 5"));
        return None;
    }
    u8::try_from(n).ok()
}

fn create_review(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let book = existing_book(ctx, state)?;
    let body = ctx.json_value()?;

    let mut errors = Vec::new();
    let comment = str_field(&body, "comentario");
    if comment.is_none() {
        errors.push(FieldError::new("comentario", "El comentario es obligatorio"));
    }
    let score = match body.get("puntuacion") {
        None | Some(Value::Null) => {
            errors.push(FieldError::new("puntuacion", "La puntuación es obligatoria"));
            None
        }
        Some(value) => score(value, &mut errors),
    };

    let (Some(comment), Some(score)) = (comment, score) else {
        return Err(ApiError::Validation(errors));
    };

    let review = state.store.reviews.insert(Review {
        id: 0,
        comment,
        score,
        date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        book_id: book.id,
    })?;
    tracing::info!(review_id = review.id, book_id = book.id, "review created");
    Ok(response::json(StatusCode::CREATED, &review))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{call, test_app};
    use crate::handlers::App;
    use serde_json::json;

    fn seed_authors(app: &App) {
        for (name, nationality) in [("Gabriel García Márquez", "Colombiana"), ("Julio Cortázar", "Argentina")] {
            app.state
                .store
                .authors
                .insert(Author {
                    id: 0,
                    name: name.into(),
                    nationality: nationality.into(),
                    birth_date: None,
                })
                .unwrap();
        }
    }

    async fn create(app: &App, body: Value) -> (StatusCode, Value) {
        call(app, Method::POST, "/libros", Some(body), None).await
    }

    fn novel(title: &str, author_id: u64) -> Value {
        json!({"titulo": title, "año": 1967, "genero": "Novela", "autorId": author_id})
    }

    fn error_fields(body: &Value) -> Vec<&str> {
        body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_create_author() {
        let app = test_app();
        let (status, author) = call(
            &app,
            Method::POST,
            "/autores",
            Some(json!({"nombre": " Isabel Allende ", "nacionalidad": "Chilena", "fechaNacimiento": "1942-08-02"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(author["id"], 1);
        assert_eq!(author["nombre"], "Isabel Allende");
        assert_eq!(author["fechaNacimiento"], "1942-08-02");

        let (status, body) = call(
            &app,
            Method::POST,
            "/autores",
            Some(json!({"fechaNacimiento": "02/08/1942"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_fields(&body), vec!["nombre", "nacionalidad", "fechaNacimiento"]);
        assert_eq!(body["errors"][0]["message"], "El nombre es obligatorio");

        let (_, authors) = call(&app, Method::GET, "/autores", None, None).await;
        assert_eq!(authors.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_book_embeds_author() {
        let app = test_app();
        seed_authors(&app);

        let (status, book) = create(&app, novel("Cien años de soledad", 1)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(book["titulo"], "Cien años de soledad");
        assert_eq!(book["autor"]["nombre"], "Gabriel García Márquez");

        let (_, books) = call(&app, Method::GET, "/libros", None, None).await;
        assert_eq!(books[0]["autor"]["nacionalidad"], "Colombiana");
        assert!(books[0].get("reseñas").is_none());
    }

    #[tokio::test]
    async fn test_create_book_rejections() {
        let app = test_app();
        seed_authors(&app);

        let (status, body) = create(&app, json!({"año": "1967"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_fields(&body), vec!["titulo", "año", "genero", "autorId"]);

        let (status, body) = create(&app, novel("Rayuela", 9)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Autor no encontrado");

        create(&app, novel("Rayuela", 2)).await;
        let (status, body) = create(&app, novel("Rayuela ", 1)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "El título ya existe");
        assert_eq!(app.state.store.books.len(), 1);
    }

    #[tokio::test]
    async fn test_show_book_ids() {
        let app = test_app();
        let (status, body) = call(&app, Method::GET, "/libros/abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ID inválido");

        let (status, body) = call(&app, Method::GET, "/libros/4", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Libro no encontrado");
    }

    #[tokio::test]
    async fn test_update_book_is_partial() {
        let app = test_app();
        seed_authors(&app);
        create(&app, novel("Cien años de soledad", 1)).await;
        create(&app, novel("Rayuela", 2)).await;

        // missing book wins over a bad body
        let (status, _) = call(&app, Method::PUT, "/libros/9", Some(json!({"año": "x"})), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, book) = call(&app, Method::PUT, "/libros/1", Some(json!({"año": 1970})), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(book["año"], 1970);
        assert_eq!(book["titulo"], "Cien años de soledad");

        let (status, body) = call(&app, Method::PUT, "/libros/1", Some(json!({"autorId": 7})), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Autor no encontrado");

        let (status, body) =
            call(&app, Method::PUT, "/libros/1", Some(json!({"titulo": "Rayuela"})), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "El título ya existe");

        // keeping its own title is fine
        let (status, book) = call(
            &app,
            Method::PUT,
            "/libros/1",
            Some(json!({"titulo": "Cien años de soledad", "autorId": 2})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(book["autor"]["nombre"], "Julio Cortázar");
    }

    #[tokio::test]
    async fn test_reviews_and_cascade_delete() {
        let app = test_app();
        seed_authors(&app);
        create(&app, novel("Cien años de soledad", 1)).await;
        create(&app, novel("Rayuela", 2)).await;

        let (status, review) = call(
            &app,
            Method::POST,
            "/libros/1/resenas",
            Some(json!({"comentario": "Obra maestra", "puntuacion": 5})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(review["libroId"], 1);
        assert!(review["fecha"].as_str().unwrap().ends_with('Z'));
        call(
            &app,
            Method::POST,
            "/libros/2/resenas",
            Some(json!({"comentario": "Genial", "puntuacion": 4})),
            None,
        )
        .await;

        let (_, book) = call(&app, Method::GET, "/libros/1", None, None).await;
        assert_eq!(book["reseñas"].as_array().unwrap().len(), 1);
        assert_eq!(book["reseñas"][0]["comentario"], "Obra maestra");

        let (status, _) = call(&app, Method::DELETE, "/libros/1", None, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(app.state.store.reviews.len(), 1);

        let (status, _) = call(&app, Method::GET, "/libros/1/resenas", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, remaining) = call(&app, Method::GET, "/libros/2/resenas", None, None).await;
        assert_eq!(remaining[0]["puntuacion"], 4);
    }

    #[tokio::test]
    async fn test_review_score_bounds() {
        let app = test_app();
        seed_authors(&app);
        create(&app, novel("Rayuela", 2)).await;

        for (value, message) in [
            (json!(0), "La puntuación debe ser al menos 1"),
            (json!(6), "La puntuación no puede ser mayor a 5"),
            (json!(4.5), "La puntuación debe ser un número entero"),
        ] {
            let (status, body) = call(
                &app,
                Method::POST,
                "/libros/1/resenas",
                Some(json!({"comentario": "ok", "puntuacion": value})),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["errors"][0]["message"], message);
        }

        let (status, body) =
            call(&app, Method::POST, "/libros/1/resenas", Some(json!({"puntuacion": 3})), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_fields(&body), vec!["comentario"]);
    }
}
