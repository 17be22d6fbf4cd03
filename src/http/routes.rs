//! Todo routes.

use crate::db::TodoStore;
use crate::error::{AppError, AppResult};
use crate::models::{NewTodo, Todo, TodoPatch};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

/// Build the application router over a todo store.
pub fn router(store: TodoStore) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/{id}",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
        .with_state(store)
}

async fn hello() -> Json<Value> {
    Json(json!({ "message": "Hello from todo-service!" }))
}

async fn list_todos(State(store): State<TodoStore>) -> AppResult<Json<Vec<Todo>>> {
    Ok(Json(store.list().await?))
}

async fn get_todo(State(store): State<TodoStore>, Path(id): Path<i64>) -> AppResult<Json<Todo>> {
    Ok(Json(store.get(id).await?))
}

async fn create_todo(
    State(store): State<TodoStore>,
    body: Result<Json<NewTodo>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Todo>)> {
    // Unparseable bodies get the same answer as a body without a title.
    let Json(input) = body.map_err(|_| AppError::invalid_input("Title is required"))?;
    let todo = store.create(input).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn update_todo(
    State(store): State<TodoStore>,
    Path(id): Path<i64>,
    body: Result<Json<TodoPatch>, JsonRejection>,
) -> AppResult<Json<Todo>> {
    let Json(patch) = body.map_err(|e| AppError::invalid_input(e.body_text()))?;
    Ok(Json(store.update(id, patch).await?))
}

async fn delete_todo(State(store): State<TodoStore>, Path(id): Path<i64>) -> AppResult<StatusCode> {
    store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
