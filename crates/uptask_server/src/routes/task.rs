//! Task routes under `/api/task`.

use super::{envelope, message, JsonBody};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::{task_service, AppState};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uptask_core::model::input::{TaskInput, TaskRef};
use uptask_core::model::view::TaskView;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/task", post(create))
        .route("/api/task/status", post(toggle_status))
        .route("/api/task/{id}", get(detail).put(update).delete(remove))
}

async fn detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TaskView>, ApiError> {
    let broadcaster = state.broadcaster.clone();
    let task = state
        .db
        .run(move |conn| task_service(conn, broadcaster).get_task(user.id, &id))
        .await?;
    Ok(Json(task))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(input): JsonBody<TaskInput>,
) -> Result<impl IntoResponse, ApiError> {
    let broadcaster = state.broadcaster.clone();
    let principal = user.principal();
    let task = state
        .db
        .run(move |conn| task_service(conn, broadcaster).create_task(principal, &input))
        .await?;
    Ok(envelope("task created", "task", task))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<TaskInput>,
) -> Result<impl IntoResponse, ApiError> {
    let broadcaster = state.broadcaster.clone();
    let principal = user.principal();
    let task = state
        .db
        .run(move |conn| task_service(conn, broadcaster).update_task(principal, &id, &input))
        .await?;
    Ok(envelope("task updated", "task", task))
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let broadcaster = state.broadcaster.clone();
    let principal = user.principal();
    state
        .db
        .run(move |conn| task_service(conn, broadcaster).delete_task(principal, &id))
        .await?;
    Ok(message("task deleted"))
}

async fn toggle_status(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(input): JsonBody<TaskRef>,
) -> Result<impl IntoResponse, ApiError> {
    let broadcaster = state.broadcaster.clone();
    let principal = user.principal();
    let task = state
        .db
        .run(move |conn| task_service(conn, broadcaster).toggle_status(principal, &input))
        .await?;
    Ok(envelope("task updated", "task", task))
}
