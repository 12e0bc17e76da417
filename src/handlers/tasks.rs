//! `/tasks` resource, also served under `/task`
//!
//! Tasks store user ids; responses embed the matching users.

use hyper::{Method, StatusCode};
use serde_json::Value;

use super::{ok_json, parse_id, str_field};
use crate::config::AppState;
use crate::error::{ApiError, ApiResult};
use crate::http::{response, HttpResponse, RequestContext};
use crate::middleware::{require_json, Middleware};
use crate::models::{Task, TaskView};
use crate::routing::Router;

const JSON_BODY: &[(&str, Middleware)] = &[("json", require_json)];

pub fn routes(router: &mut Router) {
    for base in ["/tasks", "/task"] {
        router
            .get(base, list)
            .route(Method::POST, base, JSON_BODY, create)
            .get(&format!("{base}/user/:userId"), by_user)
            .get(&format!("{base}/:id"), show)
            .route(Method::PUT, &format!("{base}/:id"), JSON_BODY, update)
            .delete(&format!("{base}/:id"), remove);
    }
}

fn task_not_found() -> ApiError {
    ApiError::not_found("Task not found")
}

fn views(state: &AppState, tasks: Vec<Task>) -> Vec<TaskView> {
    let users = state.store.users.list();
    tasks
        .into_iter()
        .map(|task| TaskView::resolve(task, &users))
        .collect()
}

fn view(state: &AppState, task: Task) -> TaskView {
    TaskView::resolve(task, &state.store.users.list())
}

fn list(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let completed = ctx
        .query_any(&["completed", "completada"])
        .map(|v| v == "true");
    let title = ctx
        .query_any(&["title", "titulo"])
        .map(str::to_lowercase);

    let tasks = state.store.tasks.filter(|t| {
        completed.map_or(true, |c| t.completed == c)
            && title
                .as_deref()
                .map_or(true, |needle| t.title.to_lowercase().contains(needle))
    });
    Ok(ok_json(&views(state, tasks)))
}

fn by_user(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let user_id =
        parse_id(ctx.param("userId")).ok_or_else(|| ApiError::bad_request("Invalid user id"))?;
    let tasks = state.store.tasks.filter(|t| t.user_ids.contains(&user_id));
    Ok(ok_json(&views(state, tasks)))
}

fn show(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let task = parse_id(ctx.param("id"))
        .and_then(|id| state.store.tasks.get(id))
        .ok_or_else(task_not_found)?;
    Ok(ok_json(&view(state, task)))
}

/// `userIds` from a create body: absent means none, otherwise an array of
/// positive integers. Ids with no matching user are dropped.
fn assigned_users(body: &Value, state: &AppState) -> ApiResult<Vec<u64>> {
    let raw = match body.get("userIds") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ApiError::bad_request("userIds must be an array of user ids")),
    };

    let mut ids = Vec::with_capacity(raw.len());
    for item in raw {
        let id = item
            .as_u64()
            .ok_or_else(|| ApiError::bad_request("userIds must be an array of user ids"))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    let known = state.store.users.list();
    ids.retain(|id| known.iter().any(|u| u.id == *id));
    Ok(ids)
}

fn create(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let body = ctx.json_value()?;
    let title = str_field(&body, "title").ok_or_else(|| ApiError::bad_request("Title is required"))?;
    let user_ids = assigned_users(&body, state)?;

    let task = state.store.tasks.try_insert(|tasks| {
        if tasks.iter().any(|t| t.title == title) {
            return Err(ApiError::bad_request("Title already exists"));
        }
        Ok(Task {
            id: 0,
            title,
            description: body
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            completed: body.get("completed").and_then(Value::as_bool).unwrap_or(false),
            user_ids,
        })
    })?;

    tracing::info!(task_id = task.id, users = task.user_ids.len(), "task created");
    Ok(response::json(StatusCode::CREATED, &view(state, task)))
}

fn update(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let id = parse_id(ctx.param("id"))
        .filter(|id| state.store.tasks.get(*id).is_some())
        .ok_or_else(task_not_found)?;

    let body = ctx.json_value()?;
    let title = str_field(&body, "title").ok_or_else(|| ApiError::bad_request("Title is required"))?;

    let task = state
        .store
        .tasks
        .update(id, |task| {
            task.title = title;
            if let Some(description) = body
                .get("description")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
            {
                task.description = description.to_string();
            }
            if let Some(completed) = body.get("completed").and_then(Value::as_bool) {
                task.completed = completed;
            }
        })?
        .ok_or_else(task_not_found)?;

    Ok(ok_json(&view(state, task)))
}

fn remove(ctx: &RequestContext, state: &AppState) -> ApiResult<HttpResponse> {
    let id = parse_id(ctx.param("id")).ok_or_else(task_not_found)?;
    match state.store.tasks.remove(id)? {
        Some(_) => Ok(response::no_content()),
        None => Err(task_not_found()),
    }
}

#[cfg(test)]
mod tests {
    use crate::handlers::tests::{call, test_app};
    use crate::handlers::App;
    use hyper::{Method, StatusCode};
    use serde_json::{json, Value};

    async fn seed_users(app: &App) {
        for (name, email) in [("Ana", "ana@example.com"), ("Luis", "luis@example.com")] {
            call(
                app,
                Method::POST,
                "/users",
                Some(json!({"name": name, "email": email})),
                None,
            )
            .await;
        }
    }

    async fn create(app: &App, body: Value) -> (StatusCode, Value) {
        call(app, Method::POST, "/tasks", Some(body), None).await
    }

    #[tokio::test]
    async fn test_create_resolves_users() {
        let app = test_app();
        seed_users(&app).await;

        let (status, task) = create(
            &app,
            json!({"title": "  Write docs ", "userIds": [2, 42, 1]}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["title"], "Write docs");
        assert_eq!(task["completed"], false);
        assert_eq!(task["description"], "");
        let names: Vec<&str> = task["users"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Luis", "Ana"]);
    }

    #[tokio::test]
    async fn test_create_rejections() {
        let app = test_app();

        let (status, body) = create(&app, json!({"title": " "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title is required");

        let (status, _) = create(&app, json!({"title": "A", "userIds": 3})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = create(&app, json!({"title": "A", "userIds": ["x"]})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = create(&app, json!({"title": "A"})).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = create(&app, json!({"title": "A "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title already exists");
    }

    #[tokio::test]
    async fn test_filters_and_alias() {
        let app = test_app();
        seed_users(&app).await;
        create(&app, json!({"title": "Comprar pan", "completed": true, "userIds": [1]})).await;
        create(&app, json!({"title": "Lavar ropa", "userIds": [2]})).await;

        let (_, done) = call(&app, Method::GET, "/task?completada=true", None, None).await;
        assert_eq!(done.as_array().unwrap().len(), 1);
        assert_eq!(done[0]["title"], "Comprar pan");

        let (_, pending) = call(&app, Method::GET, "/tasks?completed=false", None, None).await;
        assert_eq!(pending[0]["title"], "Lavar ropa");

        let (_, found) = call(&app, Method::GET, "/tasks?titulo=PAN", None, None).await;
        assert_eq!(found.as_array().unwrap().len(), 1);

        let (status, mine) = call(&app, Method::GET, "/tasks/user/2", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine[0]["title"], "Lavar ropa");

        let (status, _) = call(&app, Method::GET, "/tasks/user/abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_rules() {
        let app = test_app();
        create(&app, json!({"title": "Deploy", "description": "prod"})).await;

        // missing task wins over a bad body
        let (status, _) = call(&app, Method::PUT, "/tasks/9", Some(json!({})), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::PUT, "/tasks/1", Some(json!({"title": ""})), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, task) = call(
            &app,
            Method::PUT,
            "/tasks/1",
            Some(json!({"title": "Deploy v2", "description": "", "completed": "yes"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["title"], "Deploy v2");
        assert_eq!(task["description"], "prod");
        assert_eq!(task["completed"], false);

        let (_, task) = call(
            &app,
            Method::PUT,
            "/tasks/1",
            Some(json!({"title": "Deploy v2", "completed": true})),
            None,
        )
        .await;
        assert_eq!(task["completed"], true);
    }

    #[tokio::test]
    async fn test_delete() {
        let app = test_app();
        create(&app, json!({"title": "Temp"})).await;
        let (status, _) = call(&app, Method::DELETE, "/task/1", None, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = call(&app, Method::GET, "/tasks/1", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Task not found");
    }
}
