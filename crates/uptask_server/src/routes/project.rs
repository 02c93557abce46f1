//! Project and partner routes under `/api/project`.

use super::{envelope, message, JsonBody};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::{project_service, AppState};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uptask_core::model::input::{PartnerInput, PartnerRef, ProjectInput};
use uptask_core::model::view::{ProjectDetail, ProjectSummary};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/project", get(list).post(create))
        .route("/api/project/partner", post(add_partner))
        .route("/api/project/partner/{id}", post(remove_partner))
        .route("/api/project/{id}", get(detail).put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    let broadcaster = state.broadcaster.clone();
    let projects = state
        .db
        .run(move |conn| project_service(conn, broadcaster).list_projects(user.id))
        .await?;
    Ok(Json(projects))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(input): JsonBody<ProjectInput>,
) -> Result<impl IntoResponse, ApiError> {
    let broadcaster = state.broadcaster.clone();
    let project = state
        .db
        .run(move |conn| project_service(conn, broadcaster).create_project(user.id, &input))
        .await?;
    Ok(envelope("project created", "project", project))
}

async fn detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ProjectDetail>, ApiError> {
    let broadcaster = state.broadcaster.clone();
    let project = state
        .db
        .run(move |conn| project_service(conn, broadcaster).get_project(user.id, &id))
        .await?;
    Ok(Json(project))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<ProjectInput>,
) -> Result<impl IntoResponse, ApiError> {
    let broadcaster = state.broadcaster.clone();
    let project = state
        .db
        .run(move |conn| project_service(conn, broadcaster).update_project(user.id, &id, &input))
        .await?;
    Ok(envelope("project updated", "project", project))
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let broadcaster = state.broadcaster.clone();
    state
        .db
        .run(move |conn| project_service(conn, broadcaster).delete_project(user.id, &id))
        .await?;
    Ok(message("project deleted"))
}

async fn add_partner(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(input): JsonBody<PartnerInput>,
) -> Result<impl IntoResponse, ApiError> {
    let broadcaster = state.broadcaster.clone();
    let partner = state
        .db
        .run(move |conn| project_service(conn, broadcaster).add_partner(user.id, &input))
        .await?;
    Ok(envelope("partner added", "partner", partner))
}

async fn remove_partner(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project): Path<String>,
    JsonBody(partner): JsonBody<PartnerRef>,
) -> Result<impl IntoResponse, ApiError> {
    let broadcaster = state.broadcaster.clone();
    state
        .db
        .run(move |conn| project_service(conn, broadcaster).remove_partner(user.id, &project, &partner))
        .await?;
    Ok(message("partner removed"))
}
