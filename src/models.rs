//! Stored records

use serde::{Deserialize, Serialize, Serializer};

use crate::store::Record;

/// Largest magnitude below which every integral f64 is exact
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// JSON number for `value`, written without a fraction when it has none
#[allow(clippy::cast_possible_truncation)]
pub fn json_number(value: f64) -> serde_json::Value {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    json_number(*value).serialize(serializer)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

impl Record for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    #[serde(serialize_with = "serialize_number")]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Record for Product {
    const COLLECTION: &'static str = "products";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// Task as stored: users are referenced by id and resolved on read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub user_ids: Vec<u64>,
}

impl Record for Task {
    const COLLECTION: &'static str = "tasks";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// Task with its assigned users embedded, as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub users: Vec<User>,
}

impl TaskView {
    /// Resolve `task.user_ids` against `users`, dropping unknown ids
    pub fn resolve(task: Task, users: &[User]) -> Self {
        let users = task
            .user_ids
            .iter()
            .filter_map(|id| users.iter().find(|u| u.id == *id).cloned())
            .collect();
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            completed: task.completed,
            users,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Guest,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

/// Login account. Kept apart from [`User`] so user listings never carry
/// credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password_salt: String,
    pub password_hash: String,
    pub role: Role,
}

impl Record for Account {
    const COLLECTION: &'static str = "accounts";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// Book author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: u64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "nacionalidad")]
    pub nationality: String,
    #[serde(
        rename = "fechaNacimiento",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub birth_date: Option<String>,
}

impl Record for Author {
    const COLLECTION: &'static str = "autores";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// Book as stored: the author is referenced by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "año")]
    pub year: i32,
    #[serde(rename = "genero")]
    pub genre: String,
    #[serde(rename = "autorId")]
    pub author_id: u64,
}

impl Record for Book {
    const COLLECTION: &'static str = "libros";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    #[serde(rename = "comentario")]
    pub comment: String,
    #[serde(rename = "puntuacion")]
    pub score: u8,
    /// RFC 3339 timestamp
    #[serde(rename = "fecha")]
    pub date: String,
    #[serde(rename = "libroId")]
    pub book_id: u64,
}

impl Record for Review {
    const COLLECTION: &'static str = "resenas";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// Book with its author embedded, plus its reviews on the detail route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookView {
    pub id: u64,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "año")]
    pub year: i32,
    #[serde(rename = "genero")]
    pub genre: String,
    #[serde(rename = "autor")]
    pub author: Option<Author>,
    #[serde(rename = "reseñas", skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
}

impl BookView {
    /// Embed the author of `book`. A dangling `author_id` yields `null`.
    pub fn resolve(book: Book, authors: &[Author]) -> Self {
        let author = authors.iter().find(|a| a.id == book.author_id).cloned();
        Self {
            id: book.id,
            title: book.title,
            year: book.year,
            genre: book.genre,
            author,
            reviews: None,
        }
    }

    #[must_use]
    pub fn with_reviews(mut self, reviews: Vec<Review>) -> Self {
        self.reviews = Some(reviews);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: u64,
    pub nombre: String,
}

impl Record for Student {
    const COLLECTION: &'static str = "estudiantes";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    pub nombre: String,
}

impl Record for Course {
    const COLLECTION: &'static str = "cursos";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// One student's grade in one course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: u64,
    pub estudiante_id: u64,
    pub curso_id: u64,
    #[serde(serialize_with = "serialize_number")]
    pub calificacion: f64,
}

impl Record for Grade {
    const COLLECTION: &'static str = "calificaciones";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}
