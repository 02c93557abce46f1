//! Account routes under `/api/user`.

use super::{envelope, message, JsonBody};
use crate::auth::{clear_session_cookie, session_cookie, AuthUser};
use crate::error::ApiError;
use crate::state::{account_service, AppState};
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use uptask_core::model::input::{LoginInput, RecoverInput, RestoreInput, SignupInput, TokenInput};
use uptask_core::model::view::UserSummary;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/user/signup", post(signup))
        .route("/api/user/login", post(login))
        .route("/api/user/logout", get(logout))
        .route("/api/user/confirm", post(confirm))
        .route("/api/user/recover", post(recover))
        .route("/api/user/check-token", post(check_token))
        .route("/api/user/restore", post(restore))
        .route("/api/user/auth", get(profile))
}

async fn signup(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<SignupInput>,
) -> Result<impl IntoResponse, ApiError> {
    let mailer = Arc::clone(&state.mailer);
    let user = state
        .db
        .run(move |conn| account_service(conn, mailer).signup(&input))
        .await?;
    Ok(envelope("account created, check your email", "user", user))
}

async fn confirm(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<TokenInput>,
) -> Result<impl IntoResponse, ApiError> {
    let mailer = Arc::clone(&state.mailer);
    state
        .db
        .run(move |conn| account_service(conn, mailer).confirm(&input))
        .await?;
    Ok(message("account confirmed"))
}

async fn login(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let mailer = Arc::clone(&state.mailer);
    let user: UserSummary = state
        .db
        .run(move |conn| account_service(conn, mailer).login(&input))
        .await?;
    let token = state.sessions.issue(user.id)?;
    let cookie = session_cookie(&token, state.sessions.ttl(), state.secure_cookies);
    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({ "message": "logged in", "user": user, "token": token })),
    ))
}

async fn logout(State(state): State<AppState>, _user: AuthUser) -> impl IntoResponse {
    (
        [(SET_COOKIE, clear_session_cookie(state.secure_cookies))],
        message("logged out"),
    )
}

async fn recover(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RecoverInput>,
) -> Result<impl IntoResponse, ApiError> {
    let mailer = Arc::clone(&state.mailer);
    state
        .db
        .run(move |conn| account_service(conn, mailer).recover(&input))
        .await?;
    Ok(message("we sent you an email with instructions"))
}

async fn check_token(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<TokenInput>,
) -> Result<impl IntoResponse, ApiError> {
    let mailer = Arc::clone(&state.mailer);
    state
        .db
        .run(move |conn| account_service(conn, mailer).check_token(&input))
        .await?;
    Ok(message("valid token, choose a new password"))
}

async fn restore(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RestoreInput>,
) -> Result<impl IntoResponse, ApiError> {
    let mailer = Arc::clone(&state.mailer);
    state
        .db
        .run(move |conn| account_service(conn, mailer).restore(&input))
        .await?;
    Ok(message("password updated"))
}

async fn profile(State(state): State<AppState>, user: AuthUser) -> Result<Json<UserSummary>, ApiError> {
    let mailer = Arc::clone(&state.mailer);
    let profile = state
        .db
        .run(move |conn| account_service(conn, mailer).profile(user.id))
        .await?;
    Ok(Json(profile))
}
