//! `/calificaciones`: grades joined with their student and course

use hyper::StatusCode;
use serde_json::{json, Value};

use super::ok_json;
use crate::config::AppState;
use crate::error::ApiResult;
use crate::http::{response, HttpResponse, RequestContext};
use crate::models::{json_number, Course, Grade, Student};
use crate::routing::Router;

pub fn routes(router: &mut Router) {
    router
        .get("/calificaciones", list)
        .get("/calificaciones/validar", validate);
}

/// A grade with names resolved
struct Row {
    student: String,
    course: String,
    grade: f64,
}

impl Row {
    fn to_json(&self) -> Value {
        json!({
            "nombre": self.student,
            "curso": self.course,
            "calificacion": json_number(self.grade),
        })
    }
}

/// Resolve every grade, failing on the first dangling reference
fn join(grades: &[Grade], students: &[Student], courses: &[Course]) -> Result<Vec<Row>, String> {
    grades
        .iter()
        .map(|g| {
            let student = students
                .iter()
                .find(|s| s.id == g.estudiante_id)
                .ok_or_else(|| format!("Estudiante con ID {} no encontrado", g.estudiante_id))?;
            let course = courses
                .iter()
                .find(|c| c.id == g.curso_id)
                .ok_or_else(|| format!("Curso con ID {} no encontrado", g.curso_id))?;
            Ok(Row {
                student: student.nombre.clone(),
                course: course.nombre.clone(),
                grade: g.calificacion,
            })
        })
        .collect()
}

/// Row filters from the query string. Name filters are case-insensitive
/// substrings; an unparsable `minima` is ignored.
struct Filters {
    course: Option<String>,
    student: Option<String>,
    minimum: Option<f64>,
}

impl Filters {
    fn from_query(ctx: &RequestContext) -> Self {
        let needle = |name| {
            ctx.query(name)
                .filter(|v| !v.is_empty())
                .map(str::to_lowercase)
        };
        Self {
            course: needle("curso"),
            student: needle("estudiante"),
            minimum: ctx
                .query("minima")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|m| !m.is_nan()),
        }
    }

    fn matches(&self, row: &Row) -> bool {
        let contains = |haystack: &str, needle: &Option<String>| {
            needle
                .as_deref()
                .map_or(true, |n| haystack.to_lowercase().contains(n))
        };
        contains(&row.course, &self.course)
            && contains(&row.student, &self.student)
            && self.minimum.map_or(true, |m| row.grade >= m)
    }
}

fn list(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let store = &state.store;
    let rows = match join(&store.grades.list(), &store.students.list(), &store.courses.list()) {
        Ok(rows) => rows,
        Err(detail) => {
            tracing::error!(%detail, "grade references a missing record");
            return Ok(response::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "error": "Error al procesar las calificaciones", "detalle": detail }),
            ));
        }
    };

    let filters = Filters::from_query(ctx);
    let rows: Vec<Value> = rows
        .iter()
        .filter(|row| filters.matches(row))
        .map(Row::to_json)
        .collect();
    Ok(ok_json(&rows))
}

/// Every grade whose student or course is missing, one message each
fn integrity_errors(grades: &[Grade], students: &[Student], courses: &[Course]) -> Vec<String> {
    let mut errors = Vec::new();
    for g in grades {
        if !students.iter().any(|s| s.id == g.estudiante_id) {
            errors.push(format!(
                "Calificación ID {}: Estudiante {} no existe",
                g.id, g.estudiante_id
            ));
        }
        if !courses.iter().any(|c| c.id == g.curso_id) {
            errors.push(format!(
                "Calificación ID {}: Curso {} no existe",
                g.id, g.curso_id
            ));
        }
    }
    errors
}

fn validate(_ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let store = &state.store;
    let errors = integrity_errors(&store.grades.list(), &store.students.list(), &store.courses.list());

    if !errors.is_empty() {
        tracing::warn!(errors = errors.len(), "grade integrity check failed");
        return Ok(response::json(
            StatusCode::BAD_REQUEST,
            &json!({ "error": "Errores de integridad encontrados", "errores": errors }),
        ));
    }

    Ok(ok_json(&json!({
        "mensaje": "Integridad de datos verificada correctamente",
        "total_calificaciones": store.grades.len(),
        "total_estudiantes": store.students.len(),
        "total_cursos": store.courses.len(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{call, test_app};
    use crate::handlers::App;
    use hyper::Method;

    fn seed(app: &App) {
        let store = &app.state.store;
        for nombre in ["Ana García", "Luis Pérez"] {
            store.students.insert(Student { id: 0, nombre: nombre.into() }).unwrap();
        }
        for nombre in ["Matemáticas", "Historia"] {
            store.courses.insert(Course { id: 0, nombre: nombre.into() }).unwrap();
        }
        for (estudiante_id, curso_id, calificacion) in [(1, 1, 9.5), (1, 2, 7.0), (2, 1, 6.0)] {
            store
                .grades
                .insert(Grade {
                    id: 0,
                    estudiante_id,
                    curso_id,
                    calificacion,
                })
                .unwrap();
        }
    }

    fn names(rows: &Value) -> Vec<(&str, &str)> {
        rows.as_array()
            .unwrap()
            .iter()
            .map(|r| (r["nombre"].as_str().unwrap(), r["curso"].as_str().unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn test_list_joins_names() {
        let app = test_app();
        seed(&app);

        let (status, rows) = call(&app, Method::GET, "/calificaciones", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows.as_array().unwrap().len(), 3);
        assert_eq!(
            rows[0],
            json!({"nombre": "Ana García", "curso": "Matemáticas", "calificacion": 9.5})
        );
        assert_eq!(rows[1]["calificacion"], 7);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let app = test_app();
        seed(&app);

        let (_, rows) = call(&app, Method::GET, "/calificaciones?curso=MATE", None, None).await;
        assert_eq!(names(&rows), vec![("Ana García", "Matemáticas"), ("Luis Pérez", "Matemáticas")]);

        let (_, rows) = call(&app, Method::GET, "/calificaciones?estudiante=ana&minima=8", None, None).await;
        assert_eq!(names(&rows), vec![("Ana García", "Matemáticas")]);

        // an unparsable minimum does not filter
        let (_, rows) = call(&app, Method::GET, "/calificaciones?minima=alto", None, None).await;
        assert_eq!(rows.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_dangling_references() {
        let app = test_app();
        seed(&app);

        let (status, body) = call(&app, Method::GET, "/calificaciones/validar", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mensaje"], "Integridad de datos verificada correctamente");
        assert_eq!(body["total_calificaciones"], 3);
        assert_eq!(body["total_estudiantes"], 2);
        assert_eq!(body["total_cursos"], 2);

        app.state
            .store
            .grades
            .insert(Grade {
                id: 0,
                estudiante_id: 8,
                curso_id: 9,
                calificacion: 5.0,
            })
            .unwrap();

        let (status, body) = call(&app, Method::GET, "/calificaciones", None, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Error al procesar las calificaciones");
        assert_eq!(body["detalle"], "Estudiante con ID 8 no encontrado");

        let (status, body) = call(&app, Method::GET, "/calificaciones/validar", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Errores de integridad encontrados");
        assert_eq!(
            body["errores"],
            json!([
                "Calificación ID 4: Estudiante 8 no existe",
                "Calificación ID 4: Curso 9 no existe",
            ])
        );
    }
}
